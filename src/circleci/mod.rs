//! CircleCI `.circleci/config.yml` support

mod analyzer;
mod parser;
mod types;

pub use analyzer::{
    analyze, analyze_job, analyze_workflow, job_commands, CircleCiAnalysis, JobAnalysis,
    ReusableCommandUsage, WorkflowAnalysis,
};
pub use parser::{from_value, is_builtin_step, parse, validate};
pub use types::*;
