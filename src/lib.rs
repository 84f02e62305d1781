//! pipeline-analyzer - static analysis of CI and build pipeline configuration
//!
//! The crate reads CircleCI, GitHub Actions, go-task, Dockerfile and Docker
//! Compose files, types them, and reports how their jobs, tasks and services
//! depend on each other together with the shell commands they run.
//!
//! # Core Concepts
//!
//! - **Decoding**: every YAML format is first loaded into a schema-free
//!   [`yaml::YamlValue`] tree and then typed by a format parser
//! - **Analysis**: each format analyzer builds usage maps, a
//!   [`graph::DependencyGraph`] (cycles, critical path, levels) and a list of
//!   dangling references
//! - **Classification**: [`classify::classify`] maps any shell command to a
//!   category, risk level and suggestions
//! - **Runs**: [`discovery::Scanner`] finds configuration files and
//!   [`discovery::AnalysisRunner`] analyzes them one by one, recording failures
//!   instead of stopping
//!
//! # Example Usage
//!
//! ```
//! use pipeline_analyzer::gotask;
//!
//! let text = "version: '3'\ntasks:\n  build:\n    deps: [lint]\n    cmds: [go build ./...]\n  lint:\n    cmds: [golangci-lint run]\n";
//! let outcome = gotask::parse("Taskfile.yml", text).unwrap();
//! let analysis = gotask::analyze(&outcome.config);
//!
//! assert_eq!(analysis.graph.critical_path.tasks, vec!["lint", "build"]);
//! ```
//!
//! # Project Structure
//!
//! - [`yaml`]: generic decoder and typed accessors
//! - [`circleci`], [`github_actions`], [`gotask`], [`docker`]: format parsers and analyzers
//! - [`classify`]: shell command classifier
//! - [`graph`]: dependency graph algorithms
//! - [`discovery`]: repository scanner and run orchestration
//! - [`output`]: report formatting and persistence

pub mod circleci;
pub mod classify;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod docker;
pub mod error;
pub mod fs;
pub mod github_actions;
pub mod gotask;
pub mod graph;
pub mod output;
pub mod progress;
pub mod util;
pub mod yaml;

pub use classify::{classify, Category, CommandClassification, RiskLevel};
pub use config::{AnalyzerConfig, ConfigError};
pub use discovery::{AnalysisRun, AnalysisRunner, AnalyzeError, Repository, RunSummary, Scanner};
pub use error::{DecodeError, ParseOutcome, RecoveryReport, ReferenceAnomaly, SchemaViolation};
pub use graph::{DependencyGraph, GraphAnalysis};
pub use util::{init_logging, LoggingConfig};
pub use yaml::YamlValue;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_pipeline_analyzer() {
        assert_eq!(NAME, "pipeline-analyzer");
    }
}
