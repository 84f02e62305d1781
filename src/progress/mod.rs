//! Progress reporting for analysis runs

mod handler;
mod logging;

#[cfg(test)]
pub use handler::MockProgressHandler;
pub use handler::{NoOpHandler, ProgressEvent, ProgressHandler};
pub use logging::LoggingHandler;
