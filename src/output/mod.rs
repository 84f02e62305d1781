//! Report formatting and persistence

mod formatter;
mod writer;

pub use formatter::{OutputFormat, OutputFormatter};
pub use writer::ReportWriter;
