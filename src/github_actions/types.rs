//! GitHub Actions workflow model

use crate::yaml::YamlValue;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Workflow {
    pub name: Option<String>,
    /// Event names from `on:` (string, list or mapping keys)
    pub triggers: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub permissions: Option<YamlValue>,
    pub concurrency: Option<String>,
    pub jobs: BTreeMap<String, Job>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Job {
    pub name: Option<String>,
    pub runs_on: Vec<String>,
    pub needs: Vec<String>,
    pub condition: Option<String>,
    pub env: BTreeMap<String, String>,
    pub strategy: Option<Strategy>,
    pub container: Option<Container>,
    pub services: BTreeMap<String, Container>,
    pub steps: Vec<Step>,
    pub timeout_minutes: Option<u32>,
    pub permissions: Option<YamlValue>,
    pub environment: Option<String>,
    /// Reusable workflow called by this job (`uses: org/repo/.github/workflows/x.yml@v1`)
    pub uses: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Strategy {
    pub matrix: Option<YamlValue>,
    pub fail_fast: Option<bool>,
    pub max_parallel: Option<u32>,
}

impl Strategy {
    /// Number of matrix combinations: the product of list-valued axes plus
    /// `include` entries, minus `exclude` entries
    pub fn matrix_size(&self) -> Option<usize> {
        let matrix = self.matrix.as_ref()?.as_mapping().ok()?;

        let mut product: Option<usize> = None;
        let mut included = 0;
        let mut excluded = 0;
        for (axis, values) in matrix {
            match axis.as_str() {
                "include" => included = values.items().len(),
                "exclude" => excluded = values.items().len(),
                _ => {
                    let len = values.as_sequence().map(|v| v.len()).unwrap_or(1);
                    product = Some(product.unwrap_or(1) * len);
                }
            }
        }
        Some((product.unwrap_or(0) + included).saturating_sub(excluded))
    }
}

/// A job container or a service container
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Container {
    pub image: String,
    pub env: BTreeMap<String, String>,
    pub ports: Vec<String>,
    pub volumes: Vec<String>,
    pub options: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Step {
    pub name: Option<String>,
    pub id: Option<String>,
    pub condition: Option<String>,
    pub uses: Option<String>,
    pub run: Option<String>,
    pub shell: Option<String>,
    pub with: BTreeMap<String, YamlValue>,
    pub env: BTreeMap<String, String>,
    pub working_directory: Option<String>,
    pub continue_on_error: bool,
    pub timeout_minutes: Option<u32>,
}
