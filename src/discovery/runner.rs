//! Sequential analysis of every discovered configuration file

use super::scanner::{BuildTool, Repository, Scanner, ToolType};
use crate::circleci::{self, CircleCiAnalysis};
use crate::config::AnalyzerConfig;
use crate::docker::{self, ComposeAnalysis, DockerSummary, DockerUsage, DockerfileAnalysis};
use crate::error::{DecodeError, RecoveryReport, SchemaViolation};
use crate::fs::FileSystem;
use crate::github_actions::{self, GithubActionsAnalysis};
use crate::gotask::{self, TaskfileAnalysis};
use crate::graph::GraphAnalysis;
use crate::progress::{ProgressEvent, ProgressHandler};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Why a single configuration file could not be analyzed
#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("invalid configuration in {path}: {violation}")]
    Schema {
        path: String,
        violation: SchemaViolation,
    },

    #[error("{path} is {size} bytes, above the {limit} byte limit")]
    FileTooLarge { path: String, size: u64, limit: u64 },
}

impl AnalyzeError {
    fn schema(path: &str, violation: SchemaViolation) -> Self {
        AnalyzeError::Schema {
            path: path.to_string(),
            violation,
        }
    }
}

/// A go-task analysis together with the Taskfiles it includes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskfileReport {
    pub analysis: TaskfileAnalysis,
    /// Include namespace to the analysis of the included file
    pub included: BTreeMap<String, TaskfileAnalysis>,
    /// Non-optional includes whose target does not exist or does not parse
    pub unresolved_includes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "tool", content = "analysis", rename_all = "kebab-case")]
pub enum ToolReport {
    #[serde(rename = "circleci")]
    CircleCi(Box<CircleCiAnalysis>),
    GithubActions(Box<GithubActionsAnalysis>),
    #[serde(rename = "gotask")]
    GoTask(Box<TaskfileReport>),
    Dockerfile(Box<DockerfileAnalysis>),
    DockerCompose(Box<ComposeAnalysis>),
}

impl ToolReport {
    pub fn graph(&self) -> Option<&GraphAnalysis> {
        match self {
            ToolReport::CircleCi(a) => Some(&a.graph),
            ToolReport::GithubActions(a) => Some(&a.graph),
            ToolReport::GoTask(r) => Some(&r.analysis.graph),
            ToolReport::Dockerfile(_) => None,
            ToolReport::DockerCompose(a) => Some(&a.graph),
        }
    }

    pub fn dangling_reference_count(&self) -> usize {
        match self {
            ToolReport::CircleCi(a) => a.dangling_references.len(),
            ToolReport::GithubActions(a) => a.dangling_references.len(),
            ToolReport::GoTask(r) => r.analysis.dangling_references.len(),
            ToolReport::Dockerfile(_) => 0,
            ToolReport::DockerCompose(a) => a.dangling_references.len(),
        }
    }
}

/// Result of analyzing one file
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyzedTool {
    pub report: ToolReport,
    pub recovery: Option<RecoveryReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolStatus {
    Succeeded { recovery: Option<RecoveryReport> },
    Failed { reason: String },
    /// Recognised but without a parser
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutcome {
    #[serde(flatten)]
    pub tool: BuildTool,
    #[serde(flatten)]
    pub status: ToolStatus,
    pub cycles: usize,
    pub dangling_references: usize,
}

impl ToolOutcome {
    /// One-line result for terminal output
    pub fn reason(&self) -> String {
        match &self.status {
            ToolStatus::Succeeded { recovery: Some(report) } => format!("ok, {}", report),
            ToolStatus::Succeeded { recovery: None } => "ok".to_string(),
            ToolStatus::Failed { reason } => reason.clone(),
            ToolStatus::Skipped => "not analyzed".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DockerOverview {
    pub summary: DockerSummary,
    pub usage: DockerUsage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub root_path: PathBuf,
    pub generated_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub tools: Vec<ToolOutcome>,
    pub docker: Option<DockerOverview>,
}

impl RunSummary {
    pub fn succeeded(&self) -> usize {
        self.count(|s| matches!(s, ToolStatus::Succeeded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, ToolStatus::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| matches!(s, ToolStatus::Skipped))
    }

    fn count(&self, predicate: impl Fn(&ToolStatus) -> bool) -> usize {
        self.tools.iter().filter(|t| predicate(&t.status)).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolAnalysis {
    pub tool: BuildTool,
    pub report: ToolReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRun {
    pub summary: RunSummary,
    pub reports: Vec<ToolAnalysis>,
}

/// Text of a CI or task-runner file, kept for the docker usage scan
struct ScannedText {
    tool: ToolType,
    path: String,
    text: String,
}

pub struct AnalysisRunner {
    fs: Arc<dyn FileSystem>,
    progress: Arc<dyn ProgressHandler>,
    config: AnalyzerConfig,
}

impl AnalysisRunner {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        progress: Arc<dyn ProgressHandler>,
        config: AnalyzerConfig,
    ) -> Self {
        Self {
            fs,
            progress,
            config,
        }
    }

    /// Scans `root` on disk, then analyzes everything found
    pub fn scan_and_run(&self, root: &Path) -> anyhow::Result<AnalysisRun> {
        self.progress.on_progress(&ProgressEvent::ScanStarted {
            repo_path: root.display().to_string(),
        });
        let scan_start = Instant::now();
        let repository = Scanner::new(root.to_path_buf())?
            .with_max_depth(self.config.max_scan_depth)
            .scan()?;
        self.progress.on_progress(&ProgressEvent::ToolsDiscovered {
            count: repository.build_tools.len(),
            scan_time: scan_start.elapsed(),
        });

        Ok(self.run(&repository))
    }

    /// Analyzes every tool in order; a failing file never stops the run
    pub fn run(&self, repository: &Repository) -> AnalysisRun {
        let start = Instant::now();
        let root = repository.root_path.as_path();
        let total = repository.build_tools.len();

        let mut outcomes = Vec::with_capacity(total);
        let mut reports = Vec::new();
        let mut texts = Vec::new();

        for (index, tool) in repository.build_tools.iter().enumerate() {
            if !tool.tool_type.is_analyzable() {
                debug!(tool = %tool.tool_type, path = %tool.config_path, "Skipping tool without analyzer");
                outcomes.push(ToolOutcome {
                    tool: tool.clone(),
                    status: ToolStatus::Skipped,
                    cycles: 0,
                    dangling_references: 0,
                });
                continue;
            }

            self.progress.on_progress(&ProgressEvent::ToolStarted {
                tool: tool.tool_type.to_string(),
                path: tool.config_path.clone(),
                index: index + 1,
                total,
            });
            let tool_start = Instant::now();

            match self.analyze_file(root, tool, &mut texts) {
                Ok(analyzed) => {
                    let outcome = self.report_success(tool, &analyzed);
                    self.progress.on_progress(&ProgressEvent::ToolCompleted {
                        tool: tool.tool_type.to_string(),
                        path: tool.config_path.clone(),
                        duration: tool_start.elapsed(),
                    });
                    outcomes.push(outcome);
                    reports.push(ToolAnalysis {
                        tool: tool.clone(),
                        report: analyzed.report,
                    });
                }
                Err(err) => {
                    self.progress.on_progress(&ProgressEvent::ToolFailed {
                        tool: tool.tool_type.to_string(),
                        path: tool.config_path.clone(),
                        error: err.to_string(),
                    });
                    outcomes.push(ToolOutcome {
                        tool: tool.clone(),
                        status: ToolStatus::Failed {
                            reason: err.to_string(),
                        },
                        cycles: 0,
                        dangling_references: 0,
                    });
                }
            }
        }

        let docker = docker_overview(repository, &reports, &texts);
        let summary = RunSummary {
            root_path: repository.root_path.clone(),
            generated_at: Utc::now(),
            duration_ms: start.elapsed().as_millis() as u64,
            tools: outcomes,
            docker,
        };

        self.progress.on_progress(&ProgressEvent::Completed {
            succeeded: summary.succeeded(),
            failed: summary.failed(),
            total_time: start.elapsed(),
        });
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            skipped = summary.skipped(),
            "Analysis run finished"
        );

        AnalysisRun { summary, reports }
    }

    fn report_success(&self, tool: &BuildTool, analyzed: &AnalyzedTool) -> ToolOutcome {
        if let Some(recovery) = &analyzed.recovery {
            self.progress.on_progress(&ProgressEvent::PartialRecovery {
                path: tool.config_path.clone(),
                strict_error: recovery.strict_error.clone(),
                dropped: recovery.dropped.clone(),
            });
        }

        let cycles = analyzed
            .report
            .graph()
            .map(|g| g.cycles.clone())
            .unwrap_or_default();
        if !cycles.is_empty() {
            self.progress.on_progress(&ProgressEvent::GraphAnomaly {
                path: tool.config_path.clone(),
                cycles: cycles.clone(),
            });
        }

        let dangling = analyzed.report.dangling_reference_count();
        if dangling > 0 {
            self.progress.on_progress(&ProgressEvent::DanglingReferences {
                path: tool.config_path.clone(),
                count: dangling,
            });
        }

        ToolOutcome {
            tool: tool.clone(),
            status: ToolStatus::Succeeded {
                recovery: analyzed.recovery.clone(),
            },
            cycles: cycles.len(),
            dangling_references: dangling,
        }
    }

    /// Reads the file within the size limit
    pub fn read(&self, root: &Path, rel_path: &str) -> Result<String, AnalyzeError> {
        self.read_path(&self.fs.join(root, rel_path), rel_path)
    }

    fn read_path(&self, path: &Path, display: &str) -> Result<String, AnalyzeError> {
        let io_error = |e: anyhow::Error| AnalyzeError::Io {
            path: display.to_string(),
            message: format!("{:#}", e),
        };

        let metadata = self.fs.metadata(path).map_err(io_error)?;
        if metadata.len() > self.config.max_file_size {
            return Err(AnalyzeError::FileTooLarge {
                path: display.to_string(),
                size: metadata.len(),
                limit: self.config.max_file_size,
            });
        }
        self.fs.read_to_string(path).map_err(io_error)
    }

    /// Reads and parses an included Taskfile under the same size limit as
    /// top-level files
    fn load_include(&self, path: &Path) -> Result<gotask::Taskfile, AnalyzeError> {
        let display = path.to_string_lossy();
        let text = self.read_path(path, &display)?;
        Ok(gotask::parse(&display, &text)?.config)
    }

    /// Parses, validates and analyzes one configuration file
    pub fn analyze_tool(&self, root: &Path, tool: &BuildTool) -> Result<AnalyzedTool, AnalyzeError> {
        self.analyze_file(root, tool, &mut Vec::new())
    }

    fn analyze_file(
        &self,
        root: &Path,
        tool: &BuildTool,
        texts: &mut Vec<ScannedText>,
    ) -> Result<AnalyzedTool, AnalyzeError> {
        let path = tool.config_path.as_str();
        let text = self.read(root, path)?;

        let analyzed = match tool.tool_type {
            ToolType::CircleCi => {
                let config = circleci::parse(path, &text)?;
                circleci::validate(&config).map_err(|v| AnalyzeError::schema(path, v))?;
                clean(ToolReport::CircleCi(Box::new(circleci::analyze(&config))))
            }
            ToolType::GithubActions => {
                let workflow = github_actions::parse(path, &text)?;
                github_actions::validate(&workflow).map_err(|v| AnalyzeError::schema(path, v))?;
                clean(ToolReport::GithubActions(Box::new(github_actions::analyze(
                    &workflow,
                ))))
            }
            ToolType::GoTask => {
                let outcome = gotask::parse(path, &text)?;
                gotask::validate(&outcome.config).map_err(|v| AnalyzeError::schema(path, v))?;
                let base_dir = self
                    .fs
                    .join(root, path)
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                let report = self.taskfile_report(&outcome.config, &base_dir);
                AnalyzedTool {
                    report: ToolReport::GoTask(Box::new(report)),
                    recovery: outcome.recovery,
                }
            }
            ToolType::Dockerfile => {
                let dockerfile = docker::parse_dockerfile(path, &text)?;
                docker::validate_dockerfile(&dockerfile)
                    .map_err(|v| AnalyzeError::schema(path, v))?;
                clean(ToolReport::Dockerfile(Box::new(docker::analyze_dockerfile(
                    path,
                    &dockerfile,
                ))))
            }
            ToolType::DockerCompose => {
                let compose = docker::parse_compose(path, &text)?;
                docker::validate_compose(&compose).map_err(|v| AnalyzeError::schema(path, v))?;
                clean(ToolReport::DockerCompose(Box::new(docker::analyze_compose(
                    path, &compose,
                ))))
            }
            other => {
                return Err(AnalyzeError::Io {
                    path: path.to_string(),
                    message: format!("no analyzer for {}", other),
                })
            }
        };

        if matches!(
            tool.tool_type,
            ToolType::CircleCi | ToolType::GithubActions | ToolType::GoTask
        ) {
            texts.push(ScannedText {
                tool: tool.tool_type,
                path: path.to_string(),
                text,
            });
        }

        Ok(analyzed)
    }

    fn taskfile_report(&self, taskfile: &gotask::Taskfile, base_dir: &Path) -> TaskfileReport {
        let mut report = TaskfileReport {
            analysis: gotask::analyze(taskfile),
            included: BTreeMap::new(),
            unresolved_includes: Vec::new(),
        };

        for (namespace, include) in &taskfile.includes {
            let Some(path) = gotask::locate_included_taskfile(self.fs.as_ref(), include, base_dir)
            else {
                if !include.optional {
                    warn!(include = %namespace, taskfile = %include.taskfile, "Included Taskfile not found");
                    report.unresolved_includes.push(namespace.clone());
                }
                continue;
            };
            match self.load_include(&path) {
                Ok(included) => {
                    report
                        .included
                        .insert(namespace.clone(), gotask::analyze(&included));
                }
                Err(err) => {
                    warn!(include = %namespace, error = %err, "Included Taskfile could not be loaded");
                    report.unresolved_includes.push(namespace.clone());
                }
            }
        }
        report
    }
}

fn clean(report: ToolReport) -> AnalyzedTool {
    AnalyzedTool {
        report,
        recovery: None,
    }
}

fn docker_overview(
    repository: &Repository,
    reports: &[ToolAnalysis],
    texts: &[ScannedText],
) -> Option<DockerOverview> {
    let has_docker = repository
        .build_tools
        .iter()
        .any(|t| matches!(t.tool_type, ToolType::Dockerfile | ToolType::DockerCompose));
    if !has_docker {
        return None;
    }

    let mut dockerfiles = Vec::new();
    let mut compose = Vec::new();
    for analysis in reports {
        match &analysis.report {
            ToolReport::Dockerfile(d) => dockerfiles.push((**d).clone()),
            ToolReport::DockerCompose(c) => compose.push((**c).clone()),
            _ => {}
        }
    }

    let dockerfile_paths: Vec<String> = repository
        .tools_of(ToolType::Dockerfile)
        .map(|t| t.config_path.clone())
        .collect();
    let mut usage = DockerUsage::default();
    for scanned in texts {
        let location = match scanned.tool {
            ToolType::CircleCi => "job",
            ToolType::GithubActions => "step",
            _ => "task",
        };
        usage.scan(
            scanned.tool.as_str(),
            location,
            &scanned.path,
            &scanned.text,
            &dockerfile_paths,
        );
    }

    Some(DockerOverview {
        summary: docker::summarize(&dockerfiles, &compose),
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::MockFileSystem;
    use crate::progress::{MockProgressHandler, NoOpHandler};

    const CIRCLECI: &str = r#"
version: 2.1
jobs:
  build:
    docker:
      - image: cimg/go:1.22
    steps:
      - checkout
      - run: docker build -f Dockerfile -t app .
  test:
    docker:
      - image: cimg/go:1.22
    steps:
      - run: go test ./...
workflows:
  main:
    jobs:
      - build
      - test:
          requires: [biuld]
"#;

    const TASKFILE: &str = r#"
version: '3'
includes:
  docs: ./docs
  missing: ./missing
tasks:
  a:
    deps: [b]
    cmds: [echo a]
  b:
    deps: [a]
    cmds: [echo b]
"#;

    fn repository(root: &str, tools: &[(ToolType, &str)]) -> Repository {
        Repository {
            root_path: PathBuf::from(root),
            git_repo: false,
            build_tools: tools
                .iter()
                .map(|(tool_type, path)| BuildTool::new(*tool_type, *path))
                .collect(),
            scan_time_ms: 0,
        }
    }

    fn runner(fs: MockFileSystem, progress: Arc<dyn ProgressHandler>) -> AnalysisRunner {
        AnalysisRunner::new(Arc::new(fs), progress, AnalyzerConfig::default())
    }

    #[test]
    fn test_run_continues_after_failures() {
        let fs = MockFileSystem::with_root(PathBuf::from("/repo"));
        fs.add_file(".circleci/config.yml", CIRCLECI);
        fs.add_file("Taskfile.yml", "version: '3'\n");
        fs.add_file("Dockerfile", "FROM golang:1.22\nRUN go build ./...\n");

        let repo = repository(
            "/repo",
            &[
                (ToolType::CircleCi, ".circleci/config.yml"),
                (ToolType::GoTask, "Taskfile.yml"),
                (ToolType::GithubActions, ".github/workflows/gone.yml"),
                (ToolType::Dockerfile, "Dockerfile"),
                (ToolType::Npm, "package.json"),
            ],
        );
        let run = runner(fs, Arc::new(NoOpHandler)).run(&repo);

        assert_eq!(run.summary.tools.len(), 5);
        assert_eq!(run.summary.succeeded(), 2);
        assert_eq!(run.summary.failed(), 2);
        assert_eq!(run.summary.skipped(), 1);
        assert_eq!(run.reports.len(), 2);

        let taskfile = &run.summary.tools[1];
        assert_eq!(taskfile.reason(), "invalid configuration in Taskfile.yml: no tasks defined");
        let circleci = &run.summary.tools[0];
        assert_eq!(circleci.dangling_references, 1);

        let docker = run.summary.docker.as_ref().unwrap();
        assert_eq!(docker.summary.total_dockerfiles, 1);
        assert_eq!(docker.usage.command_references.len(), 1);
        assert_eq!(docker.usage.dockerfile_references.len(), 1);
    }

    #[test]
    fn test_file_size_limit() {
        let fs = MockFileSystem::with_root(PathBuf::from("/repo"));
        fs.add_file("Dockerfile", &"RUN echo padding\n".repeat(100));
        let runner = AnalysisRunner::new(
            Arc::new(fs),
            Arc::new(NoOpHandler),
            AnalyzerConfig {
                max_file_size: 64,
                ..Default::default()
            },
        );

        let err = runner
            .analyze_tool(Path::new("/repo"), &BuildTool::new(ToolType::Dockerfile, "Dockerfile"))
            .unwrap_err();
        assert!(matches!(err, AnalyzeError::FileTooLarge { limit: 64, .. }));
    }

    #[test]
    fn test_oversized_include_is_unresolved() {
        let fs = MockFileSystem::with_root(PathBuf::from("/repo"));
        fs.add_file(
            "Taskfile.yml",
            "version: '3'\nincludes:\n  big: ./big\ntasks:\n  a: echo a\n",
        );
        let mut big = String::from("version: '3'\ntasks:\n");
        for i in 0..50 {
            big.push_str(&format!("  t{}: echo {}\n", i, i));
        }
        fs.add_file("big/Taskfile.yml", &big);

        let runner = AnalysisRunner::new(
            Arc::new(fs),
            Arc::new(NoOpHandler),
            AnalyzerConfig {
                max_file_size: 256,
                ..Default::default()
            },
        );
        let analyzed = runner
            .analyze_tool(Path::new("/repo"), &BuildTool::new(ToolType::GoTask, "Taskfile.yml"))
            .unwrap();

        let ToolReport::GoTask(report) = analyzed.report else {
            panic!("expected a go-task report");
        };
        assert!(report.included.is_empty());
        assert_eq!(report.unresolved_includes, vec!["big"]);
    }

    #[test]
    fn test_decode_and_schema_errors() {
        let fs = MockFileSystem::with_root(PathBuf::from("/repo"));
        fs.add_file("docker-compose.yml", "services: [unclosed");
        fs.add_file("compose.yaml", "version: '3'\n");
        let runner = runner(fs, Arc::new(NoOpHandler));
        let root = Path::new("/repo");

        let decode = runner
            .analyze_tool(root, &BuildTool::new(ToolType::DockerCompose, "docker-compose.yml"))
            .unwrap_err();
        assert!(matches!(decode, AnalyzeError::Decode(_)));

        let schema = runner
            .analyze_tool(root, &BuildTool::new(ToolType::DockerCompose, "compose.yaml"))
            .unwrap_err();
        assert!(matches!(
            schema,
            AnalyzeError::Schema {
                violation: SchemaViolation::NoServices,
                ..
            }
        ));
    }

    #[test]
    fn test_taskfile_includes_and_cycles_are_reported() {
        let fs = MockFileSystem::with_root(PathBuf::from("/repo"));
        fs.add_file("Taskfile.yml", TASKFILE);
        fs.add_file("docs/Taskfile.yml", "version: '3'\ntasks:\n  serve: mkdocs serve\n");

        let mut progress = MockProgressHandler::new();
        progress
            .expect_on_progress()
            .withf(|event| {
                matches!(event, ProgressEvent::GraphAnomaly { cycles, .. } if cycles.len() == 1)
            })
            .times(1)
            .return_const(());
        progress.expect_on_progress().return_const(());

        let repo = repository("/repo", &[(ToolType::GoTask, "Taskfile.yml")]);
        let run = runner(fs, Arc::new(progress)).run(&repo);

        assert_eq!(run.summary.tools[0].cycles, 1);
        assert!(run.summary.docker.is_none());
        let ToolReport::GoTask(report) = &run.reports[0].report else {
            panic!("expected a go-task report");
        };
        assert_eq!(report.included["docs"].total_tasks, 1);
        assert_eq!(report.unresolved_includes, vec!["missing"]);
    }

    #[test]
    fn test_partial_recovery_is_a_success() {
        let fs = MockFileSystem::with_root(PathBuf::from("/repo"));
        fs.add_file(
            "Taskfile.yml",
            "version: '3'\ntasks:\n  build:\n    desc: [not, a, string]\n    cmds: [go build]\n",
        );

        let mut progress = MockProgressHandler::new();
        progress
            .expect_on_progress()
            .withf(|event| matches!(event, ProgressEvent::PartialRecovery { .. }))
            .times(1)
            .return_const(());
        progress.expect_on_progress().return_const(());

        let repo = repository("/repo", &[(ToolType::GoTask, "Taskfile.yml")]);
        let run = runner(fs, Arc::new(progress)).run(&repo);

        let outcome = &run.summary.tools[0];
        assert!(matches!(
            &outcome.status,
            ToolStatus::Succeeded { recovery: Some(r) } if r.dropped == vec!["tasks.build.desc"]
        ));
        assert!(outcome.reason().starts_with("ok, recovered from:"));
    }
}
