//! CircleCI configuration model

use crate::yaml::YamlValue;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CircleCiConfig {
    pub version: Option<String>,
    pub jobs: BTreeMap<String, Job>,
    pub workflows: BTreeMap<String, Workflow>,
    pub executors: BTreeMap<String, Executor>,
    pub commands: BTreeMap<String, ReusableCommand>,
    /// Orb alias to orb reference (`node: circleci/node@5.0`)
    pub orbs: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Job {
    pub description: Option<String>,
    pub docker: Vec<DockerImage>,
    pub machine: bool,
    pub macos: bool,
    pub executor: Option<ExecutorRef>,
    pub steps: Vec<Step>,
    pub environment: BTreeMap<String, String>,
    pub working_directory: Option<String>,
    pub parallelism: Option<u32>,
    pub resource_class: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DockerImage {
    pub image: String,
    pub name: Option<String>,
    pub entrypoint: Vec<String>,
    pub command: Vec<String>,
    pub user: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub has_auth: bool,
}

/// A job's `executor:` entry, either a bare name or `{name: ..., params}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutorRef {
    pub name: String,
    pub parameters: BTreeMap<String, YamlValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Executor {
    pub docker: Vec<DockerImage>,
    pub machine: bool,
    pub macos: bool,
    pub environment: BTreeMap<String, String>,
    pub working_directory: Option<String>,
    pub resource_class: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// `run:` with its command text
    Run(RunStep),
    /// Any other step: a bare name (`checkout`) or an object such as
    /// `save_cache`, an orb command or a reusable command invocation
    Invoke {
        name: String,
        parameters: BTreeMap<String, YamlValue>,
    },
}

impl Step {
    pub fn name(&self) -> &str {
        match self {
            Step::Run(run) => run.name.as_deref().unwrap_or("run"),
            Step::Invoke { name, .. } => name,
        }
    }

    pub fn command(&self) -> Option<&str> {
        match self {
            Step::Run(run) => Some(&run.command),
            Step::Invoke { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunStep {
    pub name: Option<String>,
    pub command: String,
    pub shell: Option<String>,
    pub working_directory: Option<String>,
    pub environment: BTreeMap<String, String>,
    pub background: bool,
    pub when: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Workflow {
    pub jobs: Vec<WorkflowJob>,
    pub triggers: Vec<YamlValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowJob {
    /// The job (or orb job) this entry runs
    pub job: String,
    /// Optional `name:` override used by other entries' `requires`
    pub alias: Option<String>,
    pub requires: Vec<String>,
    pub context: Vec<String>,
    pub filters: Option<YamlValue>,
    pub approval: bool,
}

impl WorkflowJob {
    /// Name other workflow entries use to refer to this one
    pub fn reference_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.job)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReusableCommand {
    pub description: Option<String>,
    pub parameters: BTreeMap<String, CommandParameter>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CommandParameter {
    pub param_type: Option<String>,
    pub description: Option<String>,
    pub default: Option<YamlValue>,
}
