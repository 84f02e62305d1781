use crate::docker::{is_compose_name, is_dockerfile_name};
use crate::gotask::TASKFILE_NAMES;
use anyhow::{Context, Result};
use ignore::WalkBuilder;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

const EXCLUDED_DIRS: &[&str] = &[".git", "node_modules", "vendor", "target", ".venv", "dist"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolType {
    #[serde(rename = "circleci")]
    CircleCi,
    #[serde(rename = "gotask")]
    GoTask,
    GithubActions,
    Dockerfile,
    DockerCompose,
    Npm,
    Composer,
    Cargo,
    Maven,
    Gradle,
    Makefile,
    Python,
    Terraform,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::CircleCi => "circleci",
            ToolType::GoTask => "gotask",
            ToolType::GithubActions => "github-actions",
            ToolType::Dockerfile => "dockerfile",
            ToolType::DockerCompose => "docker-compose",
            ToolType::Npm => "npm",
            ToolType::Composer => "composer",
            ToolType::Cargo => "cargo",
            ToolType::Maven => "maven",
            ToolType::Gradle => "gradle",
            ToolType::Makefile => "makefile",
            ToolType::Python => "python",
            ToolType::Terraform => "terraform",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ToolType::CircleCi => "CircleCI",
            ToolType::GoTask => "Go Task",
            ToolType::GithubActions => "GitHub Actions",
            ToolType::Dockerfile => "Dockerfile",
            ToolType::DockerCompose => "Docker Compose",
            ToolType::Npm => "npm",
            ToolType::Composer => "Composer",
            ToolType::Cargo => "Cargo",
            ToolType::Maven => "Maven",
            ToolType::Gradle => "Gradle",
            ToolType::Makefile => "Makefile",
            ToolType::Python => "Python",
            ToolType::Terraform => "Terraform",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ToolType::CircleCi => "CircleCI continuous integration",
            ToolType::GoTask => "Go Task runner",
            ToolType::GithubActions => "GitHub Actions workflows",
            ToolType::Dockerfile => "Docker image build",
            ToolType::DockerCompose => "Docker Compose services",
            ToolType::Npm => "Node.js package manager",
            ToolType::Composer => "PHP dependency manager",
            ToolType::Cargo => "Rust package manager",
            ToolType::Maven => "Java build tool",
            ToolType::Gradle => "Java/Kotlin build tool",
            ToolType::Makefile => "GNU Make build system",
            ToolType::Python => "Python package management",
            ToolType::Terraform => "Infrastructure as code",
        }
    }

    /// Whether the runner has a parser for this tool; others are listed only
    pub fn is_analyzable(&self) -> bool {
        matches!(
            self,
            ToolType::CircleCi
                | ToolType::GoTask
                | ToolType::GithubActions
                | ToolType::Dockerfile
                | ToolType::DockerCompose
        )
    }

    /// Classifies a repository-relative path (`/`-separated)
    pub fn detect(rel_path: &str) -> Option<ToolType> {
        let (dir, file) = match rel_path.rsplit_once('/') {
            Some((dir, file)) => (dir, file),
            None => ("", rel_path),
        };
        let is_yaml = file.ends_with(".yml") || file.ends_with(".yaml");

        if dir == ".circleci" && (file == "config.yml" || file == "config.yaml") {
            return Some(ToolType::CircleCi);
        }
        if dir == ".github/workflows" && is_yaml {
            return Some(ToolType::GithubActions);
        }
        if is_dockerfile_name(file) {
            return Some(ToolType::Dockerfile);
        }
        if is_compose_name(file) {
            return Some(ToolType::DockerCompose);
        }
        if !dir.is_empty() {
            return None;
        }

        match file {
            name if TASKFILE_NAMES.contains(&name) => Some(ToolType::GoTask),
            "package.json" => Some(ToolType::Npm),
            "composer.json" => Some(ToolType::Composer),
            "Cargo.toml" => Some(ToolType::Cargo),
            "pom.xml" => Some(ToolType::Maven),
            "build.gradle" | "build.gradle.kts" => Some(ToolType::Gradle),
            "Makefile" | "makefile" | "GNUmakefile" => Some(ToolType::Makefile),
            "requirements.txt" | "pyproject.toml" | "setup.py" | "Pipfile" => {
                Some(ToolType::Python)
            }
            name if name.ends_with(".tf") => Some(ToolType::Terraform),
            _ => None,
        }
    }
}

impl fmt::Display for ToolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One discovered configuration file
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct BuildTool {
    pub tool_type: ToolType,
    pub display_name: String,
    /// Relative to the repository root, `/`-separated
    pub config_path: String,
    pub description: String,
}

impl BuildTool {
    pub fn new(tool_type: ToolType, config_path: impl Into<String>) -> Self {
        Self {
            tool_type,
            display_name: tool_type.display_name().to_string(),
            config_path: config_path.into(),
            description: tool_type.description().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Repository {
    pub root_path: PathBuf,
    pub git_repo: bool,
    pub build_tools: Vec<BuildTool>,
    pub scan_time_ms: u64,
}

impl Repository {
    pub fn tools_of(&self, tool_type: ToolType) -> impl Iterator<Item = &BuildTool> {
        self.build_tools
            .iter()
            .filter(move |t| t.tool_type == tool_type)
    }
}

pub struct Scanner {
    root_path: PathBuf,
    max_depth: usize,
}

impl Scanner {
    pub fn new(root_path: PathBuf) -> Result<Self> {
        if !root_path.exists() {
            return Err(anyhow::anyhow!(
                "Repository path does not exist: {:?}",
                root_path
            ));
        }
        if !root_path.is_dir() {
            return Err(anyhow::anyhow!(
                "Repository path is not a directory: {:?}",
                root_path
            ));
        }

        let root_path = root_path
            .canonicalize()
            .context("Failed to canonicalize repository path")?;

        Ok(Self {
            root_path,
            max_depth: 8,
        })
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    /// Walks the repository (honouring `.gitignore`) and lists every
    /// recognised configuration file, deduplicated and sorted by tool then path
    pub fn scan(&self) -> Result<Repository> {
        let start = Instant::now();
        info!(
            repo = %self.root_path.display(),
            max_depth = self.max_depth,
            "Starting repository scan"
        );

        let mut found = BTreeSet::new();
        let walker = WalkBuilder::new(&self.root_path)
            .max_depth(Some(self.max_depth))
            .hidden(false)
            .git_ignore(true)
            .require_git(false)
            .filter_entry(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .map_or(true, |name| !EXCLUDED_DIRS.contains(&name))
            })
            .build();

        for result in walker {
            let entry = match result {
                Ok(e) => e,
                Err(err) => {
                    warn!(error = %err, "Failed to read directory entry");
                    continue;
                }
            };
            if !entry.file_type().map_or(false, |t| t.is_file()) {
                continue;
            }

            let Some(rel_path) = self.relative(entry.path()) else {
                continue;
            };
            if let Some(tool_type) = ToolType::detect(&rel_path) {
                debug!(tool = %tool_type, path = %rel_path, "Found configuration");
                found.insert(BuildTool::new(tool_type, rel_path));
            }
        }

        let build_tools: Vec<BuildTool> = found.into_iter().collect();
        let scan_time_ms = start.elapsed().as_millis() as u64;
        info!(tools = build_tools.len(), scan_time_ms, "Repository scan completed");

        Ok(Repository {
            git_repo: self.root_path.join(".git").exists(),
            root_path: self.root_path.clone(),
            build_tools,
            scan_time_ms,
        })
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root_path).ok()?;
        let parts: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        Some(parts.join("/"))
    }
}
