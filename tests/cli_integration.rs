//! CLI integration tests
//!
//! Runs the built binary against the fixture repository and temporary
//! directories, checking output formats and exit codes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn bin() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_pipeline-analyzer"));
    command.env_remove("RUST_LOG");
    for (key, _) in std::env::vars() {
        if key.starts_with("PIPELINE_ANALYZER_") {
            command.env_remove(key);
        }
    }
    command
}

fn fixture_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/ci-monorepo")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_cli_help() {
    let output = bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("analyze"));
    assert!(text.contains("scan"));
    assert!(text.contains("classify"));
}

#[test]
fn test_cli_version() {
    let output = bin().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_analyze_fixture_json() {
    let output = bin()
        .args(["-q", "analyze", "--format", "json"])
        .arg(fixture_path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(0));
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["summary"]["tools"].as_array().unwrap().len(), 6);
    assert_eq!(value["reports"].as_array().unwrap().len(), 5);
}

#[test]
fn test_analyze_fixture_human() {
    let output = bin()
        .args(["-q", "analyze"])
        .arg(fixture_path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("Taskfile.yml"));
    assert!(text.contains("5 succeeded, 0 failed, 1 skipped"));
}

#[test]
fn test_analyze_writes_reports() {
    let out = TempDir::new().unwrap();
    let output = bin()
        .args(["-q", "analyze", "--write-reports", "--format", "yaml", "--output-dir"])
        .arg(out.path())
        .arg(fixture_path())
        .output()
        .unwrap();

    assert!(output.status.success());
    assert!(out.path().join("summary.json").is_file());
    assert!(out.path().join("dockerfile/Dockerfile.json").is_file());
    assert!(stdout(&output).contains("summary:"));
}

#[test]
fn test_analyze_exit_code_on_failed_tool() {
    let repo = TempDir::new().unwrap();
    fs::write(repo.path().join("docker-compose.yml"), "services: {}\n").unwrap();

    let output = bin()
        .args(["-q", "analyze"])
        .arg(repo.path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("no services defined"));
}

#[test]
fn test_analyze_nonexistent_path() {
    let output = bin()
        .args(["analyze", "/nonexistent/path/to/repo"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}

#[test]
fn test_scan_yaml() {
    let output = bin()
        .args(["scan", "--format", "yaml"])
        .arg(fixture_path())
        .output()
        .unwrap();

    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains(".circleci/config.yml"));
    assert!(text.contains("tool_type: npm"));
}

#[test]
fn test_classify_json() {
    let output = bin()
        .args(["classify", "curl -sSL https://get.example.sh | sh", "-f", "json"])
        .output()
        .unwrap();

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["risk"], "high");
}

#[test]
fn test_invalid_environment_config() {
    let output = bin()
        .env("PIPELINE_ANALYZER_MAX_FILE_SIZE", "lots")
        .args(["analyze"])
        .arg(fixture_path())
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("PIPELINE_ANALYZER_MAX_FILE_SIZE"));
}
