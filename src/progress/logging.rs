//! Logging-based progress handler

use super::{ProgressEvent, ProgressHandler};
use tracing::{debug, info, warn};

/// Handler that logs progress events using tracing
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingHandler;

impl ProgressHandler for LoggingHandler {
    fn on_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::ScanStarted { repo_path } => {
                info!(repo = %repo_path, "Scanning repository");
            }
            ProgressEvent::ToolsDiscovered { count, scan_time } => {
                info!(
                    tools = count,
                    scan_time_ms = scan_time.as_millis(),
                    "Scan complete"
                );
            }
            ProgressEvent::ToolStarted {
                tool,
                path,
                index,
                total,
            } => {
                info!(
                    tool = %tool,
                    path = %path,
                    progress = format!("{}/{}", index, total),
                    "Analyzing configuration"
                );
            }
            ProgressEvent::ToolCompleted {
                tool,
                path,
                duration,
            } => {
                debug!(
                    tool = %tool,
                    path = %path,
                    duration_ms = duration.as_millis(),
                    "Analysis complete"
                );
            }
            ProgressEvent::ToolFailed { tool, path, error } => {
                warn!(tool = %tool, path = %path, error = %error, "Analysis failed");
            }
            ProgressEvent::PartialRecovery {
                path,
                strict_error,
                dropped,
            } => {
                warn!(
                    path = %path,
                    strict_error = %strict_error,
                    dropped = %dropped.join(", "),
                    "Recovered partially from invalid configuration"
                );
            }
            ProgressEvent::GraphAnomaly { path, cycles } => {
                let rendered: Vec<String> = cycles.iter().map(|c| c.join(" -> ")).collect();
                warn!(path = %path, cycles = %rendered.join("; "), "Dependency cycles found");
            }
            ProgressEvent::DanglingReferences { path, count } => {
                warn!(path = %path, count, "Unresolved references found");
            }
            ProgressEvent::Completed {
                succeeded,
                failed,
                total_time,
            } => {
                if *failed > 0 {
                    warn!(
                        succeeded,
                        failed,
                        total_time_ms = total_time.as_millis(),
                        "Run complete with failures"
                    );
                } else {
                    info!(
                        succeeded,
                        total_time_ms = total_time.as_millis(),
                        "Run complete"
                    );
                }
            }
        }
    }
}
