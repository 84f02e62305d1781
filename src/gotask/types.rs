//! go-task `Taskfile.yml` model

use crate::yaml::YamlValue;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Taskfile {
    pub version: Option<String>,
    pub output: Option<String>,
    pub method: Option<String>,
    pub includes: BTreeMap<String, Include>,
    pub vars: BTreeMap<String, YamlValue>,
    pub env: BTreeMap<String, YamlValue>,
    pub tasks: BTreeMap<String, Task>,
    pub silent: bool,
    pub dotenv: Vec<String>,
    pub run: Option<String>,
    pub interval: Option<String>,
    pub set: Vec<String>,
    pub shopt: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Include {
    pub taskfile: String,
    pub dir: Option<String>,
    pub optional: bool,
    pub flatten: bool,
    pub internal: bool,
    pub aliases: Vec<String>,
    pub excludes: Vec<String>,
    pub vars: BTreeMap<String, YamlValue>,
    pub checksum: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Task {
    pub desc: Option<String>,
    pub summary: Option<String>,
    pub prompt: Vec<String>,
    pub aliases: Vec<String>,
    pub cmds: Vec<TaskCommand>,
    /// Single-command shorthand (`cmd:`)
    pub cmd: Option<String>,
    pub deps: Vec<TaskDependency>,
    pub sources: Vec<String>,
    pub generates: Vec<String>,
    pub status: Vec<String>,
    pub preconditions: Vec<Precondition>,
    /// Variables that must be set (`requires: {vars: [...]}`)
    pub requires: Vec<String>,
    pub watch: bool,
    pub platforms: Vec<String>,
    pub silent: bool,
    pub internal: bool,
    pub vars: BTreeMap<String, YamlValue>,
    pub env: BTreeMap<String, YamlValue>,
    pub run: Option<String>,
    pub ignore_error: bool,
    pub dir: Option<String>,
    pub method: Option<String>,
    pub label: Option<String>,
}

impl Task {
    /// Shell commands in execution order: `cmd` first, then every shell entry
    /// of `cmds`
    pub fn shell_commands(&self) -> Vec<&str> {
        self.cmd
            .as_deref()
            .into_iter()
            .chain(self.cmds.iter().filter_map(|c| match c {
                TaskCommand::Shell { cmd, .. } => Some(cmd.as_str()),
                TaskCommand::Call { .. } => None,
            }))
            .collect()
    }

    /// Tasks invoked from `cmds` (`- task: other`)
    pub fn task_calls(&self) -> Vec<&str> {
        self.cmds
            .iter()
            .filter_map(|c| match c {
                TaskCommand::Call { task, .. } => Some(task.as_str()),
                TaskCommand::Shell { .. } => None,
            })
            .collect()
    }

    pub fn dependency_names(&self) -> Vec<String> {
        self.deps.iter().map(|d| d.task.clone()).collect()
    }

    /// Both `sources` and `generates` are declared, so go-task can skip
    /// up-to-date runs
    pub fn is_cached(&self) -> bool {
        !self.sources.is_empty() && !self.generates.is_empty()
    }

    pub fn complexity(&self) -> usize {
        self.cmds.len()
            + usize::from(self.cmd.is_some())
            + self.deps.len()
            + self.preconditions.len()
            + self.status.len()
            + usize::from(!self.vars.is_empty())
            + usize::from(!self.env.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskCommand {
    Shell {
        cmd: String,
        silent: bool,
        ignore_error: bool,
        platforms: Vec<String>,
        deferred: bool,
    },
    Call {
        task: String,
        vars: BTreeMap<String, YamlValue>,
        deferred: bool,
    },
}

impl TaskCommand {
    pub fn shell(cmd: impl Into<String>) -> Self {
        TaskCommand::Shell {
            cmd: cmd.into(),
            silent: false,
            ignore_error: false,
            platforms: Vec::new(),
            deferred: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskDependency {
    pub task: String,
    pub vars: BTreeMap<String, YamlValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Precondition {
    pub sh: String,
    pub msg: Option<String>,
}
