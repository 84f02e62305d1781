//! go-task `Taskfile.yml` support

mod analyzer;
mod parser;
mod types;

pub use analyzer::{
    analyze, analyze_task, detect_task_type, OptimizationTip, PerformanceMetrics, Severity,
    TaskAnalysis, TaskType, TaskfileAnalysis, TipKind, VariableKind, VariableUsage,
};
pub use parser::{
    find_taskfile, locate_included_taskfile, parse, validate, KNOWN_VERSIONS, TASKFILE_NAMES,
};
pub use types::*;
