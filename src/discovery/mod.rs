//! Repository discovery and per-file analysis runs

mod runner;
mod scanner;

pub use runner::{
    AnalysisRun, AnalysisRunner, AnalyzeError, AnalyzedTool, DockerOverview, RunSummary,
    TaskfileReport, ToolAnalysis, ToolOutcome, ToolReport, ToolStatus,
};
pub use scanner::{BuildTool, Repository, Scanner, ToolType};
