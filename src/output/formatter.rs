//! Output formatting for analysis runs
//!
//! Runs, scan results and single-command classifications can be rendered as
//! JSON, YAML or human-readable text. JSON and YAML are straight serde dumps
//! of the analysis types; the human format is a condensed terminal summary.
//!
//! # Example
//!
//! ```
//! use pipeline_analyzer::classify::classify;
//! use pipeline_analyzer::output::{OutputFormat, OutputFormatter};
//!
//! let formatter = OutputFormatter::new(OutputFormat::Human);
//! let text = formatter.format_classification(&classify("npm ci")).unwrap();
//! assert!(text.contains("package-management"));
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt::Write as _;

use crate::classify::CommandClassification;
use crate::discovery::{AnalysisRun, Repository, ToolOutcome, ToolReport, ToolStatus};
use crate::graph::GraphAnalysis;

const RULE_WIDTH: usize = 42;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON format (machine-readable)
    Json,
    /// YAML format (version-control friendly)
    Yaml,
    /// Human-readable formatted text
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_run(&self, run: &AnalysisRun) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_json(run, "analysis run"),
            OutputFormat::Yaml => to_yaml(run, "analysis run"),
            OutputFormat::Human => Ok(human_run(run)),
        }
    }

    pub fn format_repository(&self, repository: &Repository) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_json(repository, "scan result"),
            OutputFormat::Yaml => to_yaml(repository, "scan result"),
            OutputFormat::Human => Ok(human_repository(repository)),
        }
    }

    pub fn format_classification(&self, classification: &CommandClassification) -> Result<String> {
        match self.format {
            OutputFormat::Json => to_json(classification, "classification"),
            OutputFormat::Yaml => to_yaml(classification, "classification"),
            OutputFormat::Human => Ok(human_classification(classification)),
        }
    }
}

fn to_json<T: Serialize>(value: &T, what: &str) -> Result<String> {
    serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {} to JSON", what))
}

fn to_yaml<T: Serialize>(value: &T, what: &str) -> Result<String> {
    serde_yaml::to_string(value).with_context(|| format!("Failed to serialize {} to YAML", what))
}

fn rule() -> String {
    "\u{2501}".repeat(RULE_WIDTH)
}

fn status_symbol(outcome: &ToolOutcome) -> &'static str {
    match outcome.status {
        ToolStatus::Succeeded { recovery: None } => "\u{2713}",
        ToolStatus::Succeeded { recovery: Some(_) } => "!",
        ToolStatus::Failed { .. } => "\u{2717}",
        ToolStatus::Skipped => "-",
    }
}

fn human_run(run: &AnalysisRun) -> String {
    let summary = &run.summary;
    let mut out = String::new();

    let _ = writeln!(out, "Pipeline Analysis: {}", summary.root_path.display());
    let _ = writeln!(out, "{}\n", rule());

    let _ = writeln!(out, "Tools ({}):", summary.tools.len());
    for outcome in &summary.tools {
        let _ = writeln!(
            out,
            "  {} {:<16} {}",
            status_symbol(outcome),
            outcome.tool.display_name,
            outcome.tool.config_path
        );
        let _ = writeln!(out, "      {}", outcome.reason());
    }

    if !run.reports.is_empty() {
        out.push_str("\nReports:\n");
        for analysis in &run.reports {
            let _ = writeln!(
                out,
                "\u{251C}\u{2500} {}: {}",
                analysis.tool.config_path,
                report_headline(&analysis.report)
            );
            if let Some(graph) = analysis.report.graph() {
                graph_lines(&mut out, graph);
            }
            ranking_lines(&mut out, &analysis.report);
            let dangling = analysis.report.dangling_reference_count();
            if dangling > 0 {
                let _ = writeln!(out, "\u{2502}  Dangling references: {}", dangling);
            }
        }
    }

    if let Some(docker) = &summary.docker {
        let d = &docker.summary;
        out.push_str("\nDocker:\n");
        let _ = writeln!(
            out,
            "  Dockerfiles: {} ({} multi-stage)",
            d.total_dockerfiles, d.multi_stage_builds
        );
        if d.has_compose {
            let _ = writeln!(
                out,
                "  Compose files: {} ({} services)",
                d.total_compose_files, d.service_count
            );
        }
        let _ = writeln!(
            out,
            "  Issues: {} security, {} optimization",
            d.security_issues, d.optimization_issues
        );
        let _ = writeln!(out, "  Score: {}/100", d.overall_score);
        if docker.usage.total_references > 0 {
            let _ = writeln!(
                out,
                "  Referenced from pipelines: {} times",
                docker.usage.total_references
            );
        }
        for recommendation in &d.recommendations {
            let _ = writeln!(out, "  - {}", recommendation);
        }
    }

    let _ = writeln!(
        out,
        "\n{} succeeded, {} failed, {} skipped in {}ms",
        summary.succeeded(),
        summary.failed(),
        summary.skipped(),
        summary.duration_ms
    );
    out
}

fn report_headline(report: &ToolReport) -> String {
    match report {
        ToolReport::CircleCi(a) => format!(
            "{} jobs, {} workflows, {} commands",
            a.total_jobs, a.total_workflows, a.total_commands
        ),
        ToolReport::GithubActions(a) => format!(
            "{} jobs, {} steps, {} commands",
            a.total_jobs, a.total_steps, a.total_commands
        ),
        ToolReport::GoTask(r) => {
            let mut line = format!(
                "{} tasks, {} includes, {} commands",
                r.analysis.total_tasks, r.analysis.total_includes, r.analysis.total_commands
            );
            if !r.unresolved_includes.is_empty() {
                let _ = write!(line, " (unresolved: {})", r.unresolved_includes.join(", "));
            }
            line
        }
        ToolReport::Dockerfile(a) => format!(
            "{} stages, {} security issues, {} optimization issues",
            a.stages.len(),
            a.security.security_issue_count(),
            a.security.optimization_issue_count()
        ),
        ToolReport::DockerCompose(a) => format!(
            "{} services, complexity {}",
            a.service_count, a.complexity_score
        ),
    }
}

fn graph_lines(out: &mut String, graph: &GraphAnalysis) {
    if graph.node_count == 0 {
        return;
    }
    if !graph.critical_path.tasks.is_empty() {
        let _ = writeln!(
            out,
            "\u{2502}  Critical path ({}): {}",
            graph.critical_path.length,
            graph.critical_path.tasks.join(" -> ")
        );
    }
    for cycle in &graph.cycles {
        let _ = writeln!(out, "\u{2502}  Cycle: {}", cycle.join(" -> "));
    }
}

const RANKING_LIMIT: usize = 3;

fn ranking_lines(out: &mut String, report: &ToolReport) {
    let rankings = match report {
        ToolReport::CircleCi(a) => vec![
            ("Most used jobs", a.most_used_jobs(RANKING_LIMIT)),
            ("Most used tools", a.most_used_patterns(RANKING_LIMIT)),
        ],
        ToolReport::GoTask(r) => vec![("Most used tasks", r.analysis.most_used_tasks(RANKING_LIMIT))],
        _ => Vec::new(),
    };
    for (label, ranked) in rankings {
        let entries: Vec<String> = ranked
            .iter()
            .filter(|(_, count)| *count > 0)
            .map(|(name, count)| format!("{} ({})", name, count))
            .collect();
        if !entries.is_empty() {
            let _ = writeln!(out, "\u{2502}  {}: {}", label, entries.join(", "));
        }
    }
}

fn human_repository(repository: &Repository) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Repository: {}", repository.root_path.display());
    let _ = writeln!(out, "{}\n", rule());

    if repository.build_tools.is_empty() {
        out.push_str("No build configuration found\n");
    } else {
        for tool in &repository.build_tools {
            let marker = if tool.tool_type.is_analyzable() {
                "\u{2713}"
            } else {
                "-"
            };
            let _ = writeln!(
                out,
                "  {} {:<16} {}",
                marker, tool.display_name, tool.config_path
            );
        }
    }

    let _ = writeln!(
        out,
        "\n{} files found in {}ms{}",
        repository.build_tools.len(),
        repository.scan_time_ms,
        if repository.git_repo {
            " (git repository)"
        } else {
            ""
        }
    );
    out
}

fn human_classification(c: &CommandClassification) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Command: {}", c.command);
    let _ = writeln!(out, "{}\n", rule());
    let _ = writeln!(out, "Category:    {}", c.category);
    if let Some(pattern) = &c.pattern {
        let _ = writeln!(out, "Pattern:     {}", pattern);
    }
    if !c.tools.is_empty() {
        let _ = writeln!(out, "Tools:       {}", c.tools.join(", "));
    }
    let _ = writeln!(out, "Complexity:  {}", c.complexity);
    let _ = writeln!(out, "Risk:        {}", c.risk);
    if !c.suggestions.is_empty() {
        out.push_str("\nSuggestions:\n");
        for suggestion in &c.suggestions {
            let _ = writeln!(out, "  - {}", suggestion);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use crate::discovery::{BuildTool, RunSummary, ToolType};
    use chrono::Utc;
    use std::path::PathBuf;

    fn sample_run() -> AnalysisRun {
        let ok = BuildTool::new(ToolType::GoTask, "Taskfile.yml");
        let broken = BuildTool::new(ToolType::CircleCi, ".circleci/config.yml");
        let skipped = BuildTool::new(ToolType::Makefile, "Makefile");
        AnalysisRun {
            summary: RunSummary {
                root_path: PathBuf::from("/repo"),
                generated_at: Utc::now(),
                duration_ms: 12,
                tools: vec![
                    ToolOutcome {
                        tool: broken,
                        status: ToolStatus::Failed {
                            reason: "unsupported version".to_string(),
                        },
                        cycles: 0,
                        dangling_references: 0,
                    },
                    ToolOutcome {
                        tool: ok,
                        status: ToolStatus::Succeeded { recovery: None },
                        cycles: 0,
                        dangling_references: 0,
                    },
                    ToolOutcome {
                        tool: skipped,
                        status: ToolStatus::Skipped,
                        cycles: 0,
                        dangling_references: 0,
                    },
                ],
                docker: None,
            },
            reports: Vec::new(),
        }
    }

    #[test]
    fn test_human_run_lists_every_tool() {
        let text = OutputFormatter::new(OutputFormat::Human)
            .format_run(&sample_run())
            .unwrap();

        assert!(text.contains(".circleci/config.yml"));
        assert!(text.contains("unsupported version"));
        assert!(text.contains("Taskfile.yml"));
        assert!(text.contains("not analyzed"));
        assert!(text.contains("1 succeeded, 1 failed, 1 skipped"));
    }

    #[test]
    fn test_json_run_is_tagged() {
        let text = OutputFormatter::new(OutputFormat::Json)
            .format_run(&sample_run())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        let tools = value["summary"]["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 3);
        assert_eq!(tools[0]["status"], "failed");
        assert_eq!(tools[0]["reason"], "unsupported version");
        assert_eq!(tools[0]["tool_type"], "circleci");
        assert_eq!(tools[2]["status"], "skipped");
    }

    #[test]
    fn test_yaml_classification() {
        let text = OutputFormatter::new(OutputFormat::Yaml)
            .format_classification(&classify("docker run --rm node:latest"))
            .unwrap();

        assert!(text.contains("category: containerization"));
    }

    #[test]
    fn test_human_classification_shows_risk() {
        let text = OutputFormatter::new(OutputFormat::Human)
            .format_classification(&classify("rm -rf /"))
            .unwrap();

        assert!(text.contains("Risk:        high"));
    }

    #[test]
    fn test_human_empty_repository() {
        let repository = Repository {
            root_path: PathBuf::from("/empty"),
            git_repo: false,
            build_tools: Vec::new(),
            scan_time_ms: 0,
        };
        let text = OutputFormatter::new(OutputFormat::Human)
            .format_repository(&repository)
            .unwrap();

        assert!(text.contains("No build configuration found"));
    }
}
