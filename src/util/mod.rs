//! Utility modules for pipeline-analyzer

pub mod logging;

pub use logging::{adjust_level, config_from_env, init_logging, parse_level, LoggingConfig};
