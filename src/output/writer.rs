//! Persists analysis reports to the output directory

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::AnalyzerConfig;
use crate::discovery::AnalysisRun;

/// Writes `<output_dir>/<tool>/<file>.json` per report plus `summary.json`
pub struct ReportWriter<'a> {
    config: &'a AnalyzerConfig,
}

impl<'a> ReportWriter<'a> {
    pub fn new(config: &'a AnalyzerConfig) -> Self {
        Self { config }
    }

    /// Returns every path written, summary last
    pub fn write(&self, run: &AnalysisRun) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(run.reports.len() + 1);

        for analysis in &run.reports {
            let path = self.config.report_path(
                analysis.tool.tool_type.as_str(),
                &analysis.tool.config_path,
            );
            write_json(&path, &analysis.report)?;
            debug!(path = %path.display(), "Wrote report");
            written.push(path);
        }

        let summary_path = self.config.summary_path();
        write_json(&summary_path, &run.summary)?;
        written.push(summary_path);

        info!(
            output_dir = %self.config.output_dir.display(),
            files = written.len(),
            "Reports written"
        );
        Ok(written)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{
        BuildTool, RunSummary, ToolAnalysis, ToolOutcome, ToolReport, ToolStatus, ToolType,
    };
    use crate::docker::{analyze_dockerfile, parse_dockerfile};
    use chrono::Utc;
    use tempfile::TempDir;

    #[test]
    fn test_writes_reports_and_summary() {
        let temp = TempDir::new().unwrap();
        let config = AnalyzerConfig {
            output_dir: temp.path().join("reports"),
            ..Default::default()
        };

        let tool = BuildTool::new(ToolType::Dockerfile, "services/api/Dockerfile");
        let dockerfile =
            parse_dockerfile("services/api/Dockerfile", "FROM alpine:3.19\nCMD [\"sh\"]\n").unwrap();
        let run = AnalysisRun {
            summary: RunSummary {
                root_path: temp.path().to_path_buf(),
                generated_at: Utc::now(),
                duration_ms: 3,
                tools: vec![ToolOutcome {
                    tool: tool.clone(),
                    status: ToolStatus::Succeeded { recovery: None },
                    cycles: 0,
                    dangling_references: 0,
                }],
                docker: None,
            },
            reports: vec![ToolAnalysis {
                tool,
                report: ToolReport::Dockerfile(Box::new(analyze_dockerfile(
                    "services/api/Dockerfile",
                    &dockerfile,
                ))),
            }],
        };

        let written = ReportWriter::new(&config).write(&run).unwrap();

        let report = temp
            .path()
            .join("reports/dockerfile/services_api_Dockerfile.json");
        assert_eq!(written, vec![report.clone(), config.summary_path()]);

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report).unwrap()).unwrap();
        assert_eq!(value["tool"], "dockerfile");
        assert_eq!(value["analysis"]["base_images"][0], "alpine:3.19");

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(config.summary_path()).unwrap()).unwrap();
        assert_eq!(summary["tools"][0]["status"], "succeeded");
    }
}
