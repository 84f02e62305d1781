//! GitHub Actions `.github/workflows/*.yml` support

mod analyzer;
mod parser;
mod types;

pub use analyzer::{analyze, analyze_job, format_estimate, GithubActionsAnalysis, JobAnalysis};
pub use parser::{docker_images, from_value, parse, run_commands, runner_label, validate};
pub use types::*;
