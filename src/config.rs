//! Configuration management for pipeline-analyzer
//!
//! Settings are loaded from environment variables with sensible defaults and
//! may be overridden by command-line flags afterwards.
//!
//! # Environment Variables
//!
//! - `PIPELINE_ANALYZER_LOG_LEVEL`: Logging level - default: "info"
//! - `PIPELINE_ANALYZER_OUTPUT_DIR`: Report directory - default: "pipeline-analysis"
//! - `PIPELINE_ANALYZER_MAX_FILE_SIZE`: Largest configuration file read, in bytes - default: "5242880" (5MB)
//! - `PIPELINE_ANALYZER_MAX_SCAN_DEPTH`: Directory depth searched for configuration files - default: "8"
//! - `PIPELINE_ANALYZER_WRITE_REPORTS`: Persist reports to the output directory (true|false) - default: "false"
//!
//! # Example
//!
//! ```no_run
//! use pipeline_analyzer::AnalyzerConfig;
//!
//! let config = AnalyzerConfig::from_env().expect("invalid configuration");
//! config.validate().expect("invalid configuration");
//! println!("{}", config);
//! ```

use std::env;
use std::fmt;
use std::fmt::Write as _;
use std::path::PathBuf;
use thiserror::Error;

const ENV_PREFIX: &str = "PIPELINE_ANALYZER_";

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_OUTPUT_DIR: &str = "pipeline-analysis";
const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
const DEFAULT_MAX_SCAN_DEPTH: usize = 8;
const DEFAULT_WRITE_REPORTS: bool = false;

const MAX_FILE_SIZE_LIMIT: u64 = 100 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    #[error("Failed to parse {field}: {error}")]
    ParseError { field: String, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Directory receiving per-tool reports and the run summary
    pub output_dir: PathBuf,

    /// Files larger than this are reported as failures instead of parsed
    pub max_file_size: u64,

    pub max_scan_depth: usize,

    pub write_reports: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_scan_depth: DEFAULT_MAX_SCAN_DEPTH,
            write_reports: DEFAULT_WRITE_REPORTS,
        }
    }
}

impl AnalyzerConfig {
    /// Loads `PIPELINE_ANALYZER_*` variables on top of the defaults
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` when a numeric or boolean variable
    /// holds a value that does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            log_level: var("LOG_LEVEL")
                .map(|v| v.to_lowercase())
                .unwrap_or(defaults.log_level),
            output_dir: var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_file_size: parsed("MAX_FILE_SIZE")?.unwrap_or(defaults.max_file_size),
            max_scan_depth: parsed("MAX_SCAN_DEPTH")?.unwrap_or(defaults.max_scan_depth),
            write_reports: parsed("WRITE_REPORTS")?.unwrap_or(defaults.write_reports),
        })
    }

    /// # Errors
    ///
    /// Returns `ConfigError::ValidationFailed` for a zero or oversized file
    /// limit, a zero scan depth or an unknown log level.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_file_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max file size must be at least 1 byte".to_string(),
            ));
        }
        if self.max_file_size > MAX_FILE_SIZE_LIMIT {
            return Err(ConfigError::ValidationFailed(
                "Max file size cannot exceed 100MB".to_string(),
            ));
        }
        if self.max_scan_depth == 0 {
            return Err(ConfigError::ValidationFailed(
                "Max scan depth must be at least 1".to_string(),
            ));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    /// Report location for one analyzed file: `<output_dir>/<tool>/<name>.json`
    ///
    /// Path separators become `_`. A literal `_`, `%` and characters that are
    /// not portable in file names are percent-encoded, so distinct relative
    /// paths never share a report file.
    pub fn report_path(&self, tool: &str, name: &str) -> PathBuf {
        let mut safe_name = String::with_capacity(name.len());
        for c in name.trim_start_matches("./").chars() {
            match c {
                '/' | '\\' => safe_name.push('_'),
                '_' | '%' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | ' ' => {
                    let _ = write!(safe_name, "%{:02X}", c as u32);
                }
                other => safe_name.push(other),
            }
        }
        self.output_dir.join(tool).join(format!("{}.json", safe_name))
    }

    pub fn summary_path(&self) -> PathBuf {
        self.output_dir.join("summary.json")
    }
}

fn var(name: &str) -> Option<String> {
    env::var(format!("{}{}", ENV_PREFIX, name))
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn parsed<T>(name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    var(name)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::ParseError {
                field: format!("{}{}", ENV_PREFIX, name),
                error: e.to_string(),
            })
        })
        .transpose()
}

impl fmt::Display for AnalyzerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Analyzer Configuration:")?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        writeln!(f, "  Output Dir: {}", self.output_dir.display())?;
        writeln!(f, "  Max File Size: {} bytes", self.max_file_size)?;
        writeln!(f, "  Max Scan Depth: {}", self.max_scan_depth)?;
        writeln!(f, "  Write Reports: {}", self.write_reports)?;
        Ok(())
    }
}
