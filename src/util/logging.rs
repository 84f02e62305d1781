//! Structured logging setup for pipeline-analyzer
//!
//! Initialization and configuration for structured logging using the
//! `tracing` ecosystem. Console output is pretty-printed by default or JSON on
//! request, and a plain-text copy can be written to a log directory.
//! `RUST_LOG` takes precedence over the configured level.
//!
//! # Example
//!
//! ```no_run
//! use pipeline_analyzer::util::{init_logging, LoggingConfig};
//! use tracing::{info, Level};
//!
//! init_logging(LoggingConfig::with_level(Level::DEBUG)).expect("log directory is writable");
//! info!(repo = "myrepo", "Analyzing repository");
//! ```

use std::env;
use std::fs::{self, File};
use std::io;
use std::path::PathBuf;
use std::sync::{Mutex, Once};
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Ensures logging is only initialized once
static INIT: Once = Once::new();

const LOG_FILE_NAME: &str = "pipeline-analyzer.log";

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum log level to display
    pub level: Level,

    /// Use JSON output format on the console
    pub use_json: bool,

    /// Include the module target (e.g., pipeline_analyzer::discovery) in logs
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,

    /// Also write logs to `<log_dir>/pipeline-analyzer.log`
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: false,
            include_location: false,
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn with_level(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Debug level with targets and source locations
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            include_target: true,
            include_location: true,
            ..Default::default()
        }
    }
}

/// Parses a log level from a string, case-insensitively
///
/// Unknown values fall back to `Level::INFO`.
///
/// ```
/// use pipeline_analyzer::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("invalid"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Level selected by the `-v`/`-q` counters relative to a base level
pub fn adjust_level(base: Level, verbose: u8, quiet: u8) -> Level {
    const ORDER: [Level; 5] = [
        Level::ERROR,
        Level::WARN,
        Level::INFO,
        Level::DEBUG,
        Level::TRACE,
    ];
    let position = ORDER.iter().position(|l| *l == base).unwrap_or(2) as i32;
    let adjusted = (position + i32::from(verbose) - i32::from(quiet)).clamp(0, 4);
    ORDER[adjusted as usize]
}

/// Installs the global subscriber; later calls are ignored
///
/// # Errors
///
/// Fails when the log directory or log file cannot be created.
pub fn init_logging(config: LoggingConfig) -> io::Result<()> {
    let log_file = match &config.log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            Some(File::create(dir.join(LOG_FILE_NAME))?)
        }
        None => None,
    };

    INIT.call_once(move || {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("pipeline_analyzer={}", config.level))
        });

        let file_layer = log_file.map(|file| {
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file))
        });

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(
                    fmt::layer()
                        .json()
                        .with_writer(io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .with(
                    fmt::layer()
                        .with_writer(io::stderr)
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location),
                )
                .init();
        }
    });

    Ok(())
}

/// Reads `PIPELINE_ANALYZER_LOG_LEVEL` and `PIPELINE_ANALYZER_LOG_JSON`
pub fn config_from_env() -> LoggingConfig {
    let level = env::var("PIPELINE_ANALYZER_LOG_LEVEL")
        .map(|v| parse_level(&v))
        .unwrap_or(Level::INFO);

    let use_json = env::var("PIPELINE_ANALYZER_LOG_JSON")
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    LoggingConfig {
        level,
        use_json,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("Debug"), Level::DEBUG);
        assert_eq!(parse_level("WARN"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level(""), Level::INFO);
    }

    #[test]
    fn test_adjust_level() {
        assert_eq!(adjust_level(Level::INFO, 0, 0), Level::INFO);
        assert_eq!(adjust_level(Level::INFO, 1, 0), Level::DEBUG);
        assert_eq!(adjust_level(Level::INFO, 5, 0), Level::TRACE);
        assert_eq!(adjust_level(Level::INFO, 0, 1), Level::WARN);
        assert_eq!(adjust_level(Level::WARN, 0, 4), Level::ERROR);
    }

    #[test]
    fn test_development_config() {
        let config = LoggingConfig::development();
        assert_eq!(config.level, Level::DEBUG);
        assert!(config.include_location);
        assert!(config.log_dir.is_none());
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        env::set_var("PIPELINE_ANALYZER_LOG_LEVEL", "trace");
        env::set_var("PIPELINE_ANALYZER_LOG_JSON", "true");
        let config = config_from_env();
        env::remove_var("PIPELINE_ANALYZER_LOG_LEVEL");
        env::remove_var("PIPELINE_ANALYZER_LOG_JSON");

        assert_eq!(config.level, Level::TRACE);
        assert!(config.use_json);
    }

    #[test]
    fn test_init_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("logs");
        let config = LoggingConfig {
            log_dir: Some(log_dir.clone()),
            ..Default::default()
        };

        init_logging(config).unwrap();
        assert!(log_dir.join(LOG_FILE_NAME).is_file());
    }
}
