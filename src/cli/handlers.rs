//! Command handlers; each returns the process exit code

use anyhow::{Context, Result};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info};

use super::commands::{AnalyzeArgs, ClassifyArgs, ScanArgs};
use crate::classify::classify;
use crate::config::AnalyzerConfig;
use crate::discovery::{AnalysisRunner, Scanner};
use crate::fs::RealFileSystem;
use crate::output::{OutputFormatter, ReportWriter};
use crate::progress::LoggingHandler;

/// Every tool analyzed
pub const EXIT_SUCCESS: i32 = 0;
/// The run completed but at least one file failed to analyze
pub const EXIT_TOOL_FAILURES: i32 = 1;
/// Bad arguments, configuration or repository path
pub const EXIT_ERROR: i32 = 2;

pub fn handle_analyze(args: &AnalyzeArgs) -> i32 {
    match run_analyze(args) {
        Ok(code) => code,
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    }
}

pub fn handle_scan(args: &ScanArgs) -> i32 {
    match run_scan(args) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            error!("Scan failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    }
}

pub fn handle_classify(args: &ClassifyArgs) -> i32 {
    let classification = classify(&args.command);
    match OutputFormatter::new(args.format.into()).format_classification(&classification) {
        Ok(text) => {
            println!("{}", text.trim_end());
            EXIT_SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    }
}

/// Environment configuration with the command-line overrides applied
pub fn resolve_config(args: &AnalyzeArgs) -> Result<AnalyzerConfig> {
    let mut config = AnalyzerConfig::from_env().context("Invalid environment configuration")?;
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }
    if args.write_reports {
        config.write_reports = true;
    }
    if let Some(depth) = args.max_depth {
        config.max_scan_depth = depth;
    }
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn repository_path(path: &Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p.clone()),
        None => env::current_dir().context("Failed to determine current directory"),
    }
}

fn run_analyze(args: &AnalyzeArgs) -> Result<i32> {
    let config = resolve_config(args)?;
    debug!("{}", config);

    let root = repository_path(&args.repository_path)?;
    let runner = AnalysisRunner::new(
        Arc::new(RealFileSystem),
        Arc::new(LoggingHandler),
        config.clone(),
    );
    let run = runner.scan_and_run(&root)?;

    if config.write_reports {
        let written = ReportWriter::new(&config).write(&run)?;
        info!(count = written.len(), "Reports saved");
    }

    let text = OutputFormatter::new(args.format.into()).format_run(&run)?;
    println!("{}", text.trim_end());

    Ok(if run.summary.failed() > 0 {
        EXIT_TOOL_FAILURES
    } else {
        EXIT_SUCCESS
    })
}

fn run_scan(args: &ScanArgs) -> Result<()> {
    let root = repository_path(&args.repository_path)?;
    let mut scanner = Scanner::new(root)?;
    if let Some(depth) = args.max_depth {
        scanner = scanner.with_max_depth(depth);
    }
    let repository = scanner.scan()?;
    debug!(tools = repository.build_tools.len(), "Printing scan result");

    let text = OutputFormatter::new(args.format.into()).format_repository(&repository)?;
    println!("{}", text.trim_end());
    Ok(())
}
