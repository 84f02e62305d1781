//! Progress handler trait and events

use std::time::Duration;

/// Events emitted while a repository is scanned and analyzed
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Scan started
    ScanStarted { repo_path: String },

    /// Scanner finished
    ToolsDiscovered { count: usize, scan_time: Duration },

    ToolStarted {
        tool: String,
        path: String,
        index: usize,
        total: usize,
    },

    ToolCompleted {
        tool: String,
        path: String,
        duration: Duration,
    },

    /// The file could not be read, decoded or validated
    ToolFailed {
        tool: String,
        path: String,
        error: String,
    },

    /// The strict decoder failed and a permissive pass salvaged the file
    PartialRecovery {
        path: String,
        strict_error: String,
        dropped: Vec<String>,
    },

    /// Dependency cycles found in a configuration
    GraphAnomaly { path: String, cycles: Vec<Vec<String>> },

    DanglingReferences { path: String, count: usize },

    Completed {
        succeeded: usize,
        failed: usize,
        total_time: Duration,
    },
}

/// Trait for handling progress events during a run
#[cfg_attr(test, mockall::automock)]
pub trait ProgressHandler: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

/// No-op handler that ignores all events
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpHandler;

impl ProgressHandler for NoOpHandler {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noop_handler() {
        NoOpHandler.on_progress(&ProgressEvent::ScanStarted {
            repo_path: "/repo".to_string(),
        });
    }

    #[test]
    fn test_mock_handler_receives_events() {
        let mut handler = MockProgressHandler::new();
        handler
            .expect_on_progress()
            .withf(|event| matches!(event, ProgressEvent::ToolFailed { tool, .. } if tool == "gotask"))
            .times(1)
            .return_const(());
        handler.expect_on_progress().return_const(());

        handler.on_progress(&ProgressEvent::ScanStarted {
            repo_path: "/repo".to_string(),
        });
        handler.on_progress(&ProgressEvent::ToolFailed {
            tool: "gotask".to_string(),
            path: "Taskfile.yml".to_string(),
            error: "no tasks defined".to_string(),
        });
    }

    #[test]
    fn test_event_debug() {
        let event = ProgressEvent::DanglingReferences {
            path: "Taskfile.yml".to_string(),
            count: 2,
        };
        let debug_str = format!("{:?}", event);
        assert!(debug_str.contains("DanglingReferences"));
        assert!(debug_str.contains("count: 2"));
    }
}
