pub mod commands;
pub mod handlers;

pub use commands::{AnalyzeArgs, ClassifyArgs, CliArgs, Commands, OutputFormatArg, ScanArgs};
pub use handlers::{handle_analyze, handle_classify, handle_scan};
