//! Taskfile decoding
//!
//! Parsing runs in two passes. The strict pass deserializes into typed raw
//! structs and fails on the first field with an unexpected shape. When it
//! fails, the permissive pass walks the generic value tree, keeps every field
//! it can type and records the paths of the ones it had to drop. A recovery
//! report is attached only when at least one field was dropped.

use super::types::*;
use crate::error::{DecodeError, ParseOutcome, RecoveryReport, SchemaViolation};
use crate::fs::FileSystem;
use crate::yaml::{self, YamlValue};
use serde::de::{self, Deserializer};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Versions go-task has shipped schemas for
pub const KNOWN_VERSIONS: &[&str] = &["1", "2", "2.1", "2.2", "2.6", "3"];

/// File names go-task looks for, in lookup order
pub const TASKFILE_NAMES: &[&str] = &["Taskfile.yml", "Taskfile.yaml", "taskfile.yml", "taskfile.yaml"];

pub fn parse(path: &str, text: &str) -> Result<ParseOutcome<Taskfile>, DecodeError> {
    let Some(raw) = yaml::decode_raw(path, text)? else {
        return Ok(ParseOutcome::clean(Taskfile::default()));
    };

    let strict_error = match serde_yaml::from_value::<RawTaskfile>(raw.clone()) {
        Ok(strict) => match strict.into_taskfile() {
            Ok(taskfile) => return Ok(ParseOutcome::clean(taskfile)),
            Err(e) => e,
        },
        Err(e) => e.to_string(),
    };

    let mut recovery = Recovery::default();
    let taskfile = recovery.taskfile(&YamlValue::from(raw));
    if recovery.dropped.is_empty() {
        return Ok(ParseOutcome::clean(taskfile));
    }
    Ok(ParseOutcome {
        config: taskfile,
        recovery: Some(RecoveryReport {
            strict_error,
            dropped: recovery.dropped,
        }),
    })
}

/// Reports the first violation: missing version, no tasks, unknown version
pub fn validate(taskfile: &Taskfile) -> Result<(), SchemaViolation> {
    let version = match taskfile.version.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v,
        _ => return Err(SchemaViolation::MissingVersion),
    };
    if taskfile.tasks.is_empty() {
        return Err(SchemaViolation::NoTasks);
    }
    if !KNOWN_VERSIONS.contains(&version) {
        return Err(SchemaViolation::UnsupportedVersion(version.to_string()));
    }
    Ok(())
}

/// First Taskfile found directly inside `dir`
pub fn find_taskfile(fs: &dyn FileSystem, dir: &Path) -> Option<PathBuf> {
    TASKFILE_NAMES
        .iter()
        .map(|name| fs.join(dir, name))
        .find(|path| fs.is_file(path))
}

/// Locates the Taskfile an include points at, relative to the including
/// file's directory. The include may name a file or a directory holding one.
pub fn locate_included_taskfile(
    fs: &dyn FileSystem,
    include: &Include,
    base_dir: &Path,
) -> Option<PathBuf> {
    let target = fs.join(base_dir, &include.taskfile);
    if fs.is_dir(&target) {
        find_taskfile(fs, &target)
    } else if fs.is_file(&target) {
        Some(target)
    } else {
        None
    }
}

// --- strict pass ---

#[derive(Debug, Deserialize)]
struct RawTaskfile {
    version: Option<YamlValue>,
    output: Option<YamlValue>,
    method: Option<String>,
    #[serde(default)]
    includes: BTreeMap<String, YamlValue>,
    #[serde(default)]
    vars: BTreeMap<String, YamlValue>,
    #[serde(default)]
    env: BTreeMap<String, YamlValue>,
    #[serde(default)]
    tasks: BTreeMap<String, RawTaskEntry>,
    #[serde(default)]
    silent: bool,
    #[serde(default)]
    dotenv: Vec<String>,
    run: Option<String>,
    interval: Option<String>,
    #[serde(default)]
    set: Vec<String>,
    #[serde(default)]
    shopt: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    desc: Option<String>,
    summary: Option<String>,
    prompt: Option<YamlValue>,
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    cmds: Vec<YamlValue>,
    cmd: Option<YamlValue>,
    #[serde(default)]
    deps: Vec<YamlValue>,
    #[serde(default)]
    sources: Vec<YamlValue>,
    #[serde(default)]
    generates: Vec<YamlValue>,
    #[serde(default)]
    status: Vec<String>,
    #[serde(default)]
    preconditions: Vec<YamlValue>,
    requires: Option<RawRequires>,
    #[serde(default)]
    watch: bool,
    #[serde(default)]
    platforms: Vec<String>,
    #[serde(default)]
    silent: bool,
    #[serde(default)]
    internal: bool,
    #[serde(default)]
    vars: BTreeMap<String, YamlValue>,
    #[serde(default)]
    env: BTreeMap<String, YamlValue>,
    run: Option<String>,
    #[serde(default)]
    ignore_error: bool,
    dir: Option<String>,
    method: Option<String>,
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRequires {
    #[serde(default)]
    vars: Vec<YamlValue>,
}

/// A task body: the full mapping form, the short command form, or empty
#[derive(Debug)]
enum RawTaskEntry {
    Full(Box<RawTask>),
    Short(Vec<YamlValue>),
    Empty,
}

impl<'de> Deserialize<'de> for RawTaskEntry {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match serde_yaml::Value::deserialize(deserializer)? {
            serde_yaml::Value::Null => Ok(RawTaskEntry::Empty),
            serde_yaml::Value::String(cmd) => Ok(RawTaskEntry::Short(vec![YamlValue::String(cmd)])),
            value @ serde_yaml::Value::Sequence(_) => serde_yaml::from_value(value)
                .map(RawTaskEntry::Short)
                .map_err(de::Error::custom),
            value @ serde_yaml::Value::Mapping(_) => serde_yaml::from_value(value)
                .map(|task| RawTaskEntry::Full(Box::new(task)))
                .map_err(de::Error::custom),
            other => Err(de::Error::custom(format!(
                "expected a task definition, found {}",
                YamlValue::from(other).shape()
            ))),
        }
    }
}

impl RawTaskfile {
    fn into_taskfile(self) -> Result<Taskfile, String> {
        let version = match self.version {
            None | Some(YamlValue::Null) => None,
            Some(v) => Some(v.scalar_string().map_err(|e| format!("version: {}", e))?),
        };

        let mut includes = BTreeMap::new();
        for (namespace, value) in &self.includes {
            let include = include_from_value(value)
                .ok_or_else(|| unsupported(&format!("includes.{}", namespace), value))?;
            includes.insert(namespace.clone(), include);
        }

        let mut tasks = BTreeMap::new();
        for (name, entry) in self.tasks {
            let path = format!("tasks.{}", name);
            let task = match entry {
                RawTaskEntry::Full(raw) => (*raw).into_task(&path)?,
                RawTaskEntry::Short(items) => Task {
                    cmds: typed_items(&items, &format!("{}.cmds", path), command_from_value)?,
                    ..Default::default()
                },
                RawTaskEntry::Empty => Task::default(),
            };
            tasks.insert(name, task);
        }

        Ok(Taskfile {
            version,
            output: self.output.as_ref().and_then(output_mode),
            method: self.method,
            includes,
            vars: self.vars,
            env: self.env,
            tasks,
            silent: self.silent,
            dotenv: self.dotenv,
            run: self.run,
            interval: self.interval,
            set: self.set,
            shopt: self.shopt,
        })
    }
}

impl RawTask {
    fn into_task(self, path: &str) -> Result<Task, String> {
        let cmd = match self.cmd {
            None | Some(YamlValue::Null) => None,
            Some(v) => Some(
                v.scalar_string()
                    .map_err(|e| format!("{}.cmd: {}", path, e))?,
            ),
        };
        let requires = match self.requires {
            Some(r) => typed_items(&r.vars, &format!("{}.requires.vars", path), required_var)?,
            None => Vec::new(),
        };

        Ok(Task {
            desc: self.desc,
            summary: self.summary,
            prompt: self.prompt.map(|p| p.string_or_list()).unwrap_or_default(),
            aliases: self.aliases,
            cmds: typed_items(&self.cmds, &format!("{}.cmds", path), command_from_value)?,
            cmd,
            deps: typed_items(&self.deps, &format!("{}.deps", path), dependency_from_value)?,
            sources: typed_items(&self.sources, &format!("{}.sources", path), glob_from_value)?,
            generates: typed_items(&self.generates, &format!("{}.generates", path), glob_from_value)?,
            status: self.status,
            preconditions: typed_items(
                &self.preconditions,
                &format!("{}.preconditions", path),
                precondition_from_value,
            )?,
            requires,
            watch: self.watch,
            platforms: self.platforms,
            silent: self.silent,
            internal: self.internal,
            vars: self.vars,
            env: self.env,
            run: self.run,
            ignore_error: self.ignore_error,
            dir: self.dir,
            method: self.method,
            label: self.label,
        })
    }
}

fn typed_items<T>(
    items: &[YamlValue],
    path: &str,
    convert: fn(&YamlValue) -> Option<T>,
) -> Result<Vec<T>, String> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| convert(item).ok_or_else(|| unsupported(&format!("{}[{}]", path, i), item)))
        .collect()
}

fn unsupported(path: &str, value: &YamlValue) -> String {
    format!("{}: unsupported {} value", path, value.shape())
}

// --- shared shape conversions ---

/// `- echo hi`, `- cmd: echo hi`, `- task: other`, `- defer: ...`
fn command_from_value(value: &YamlValue) -> Option<TaskCommand> {
    match value {
        YamlValue::Mapping(_) => {
            if let Some(cmd) = value.get_string("cmd") {
                return Some(TaskCommand::Shell {
                    cmd,
                    silent: value.get_bool("silent").unwrap_or(false),
                    ignore_error: value.get_bool("ignore_error").unwrap_or(false),
                    platforms: value.get_list("platforms"),
                    deferred: false,
                });
            }
            if let Some(task) = value.get_string("task") {
                return Some(TaskCommand::Call {
                    task,
                    vars: yaml_map(value.get("vars")),
                    deferred: false,
                });
            }
            let deferred = command_from_value(value.get("defer")?)?;
            Some(match deferred {
                TaskCommand::Shell {
                    cmd,
                    silent,
                    ignore_error,
                    platforms,
                    ..
                } => TaskCommand::Shell {
                    cmd,
                    silent,
                    ignore_error,
                    platforms,
                    deferred: true,
                },
                TaskCommand::Call { task, vars, .. } => TaskCommand::Call {
                    task,
                    vars,
                    deferred: true,
                },
            })
        }
        YamlValue::Sequence(_) | YamlValue::Null => None,
        scalar => scalar.scalar_string().ok().map(TaskCommand::shell),
    }
}

/// `- build` or `- task: build` with optional `vars`
fn dependency_from_value(value: &YamlValue) -> Option<TaskDependency> {
    match value {
        YamlValue::Mapping(_) => Some(TaskDependency {
            task: value.get_string("task")?,
            vars: yaml_map(value.get("vars")),
        }),
        YamlValue::Sequence(_) | YamlValue::Null => None,
        scalar => scalar.scalar_string().ok().map(|task| TaskDependency {
            task,
            vars: BTreeMap::new(),
        }),
    }
}

fn precondition_from_value(value: &YamlValue) -> Option<Precondition> {
    match value {
        YamlValue::Mapping(_) => Some(Precondition {
            sh: value.get_string("sh")?,
            msg: value.get_string("msg"),
        }),
        YamlValue::String(sh) => Some(Precondition {
            sh: sh.clone(),
            msg: None,
        }),
        _ => None,
    }
}

/// Source/generate globs; `{exclude: glob}` entries are kept as `!glob`
fn glob_from_value(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::Mapping(_) => value.get_string("exclude").map(|g| format!("!{}", g)),
        other => other.scalar_string().ok(),
    }
}

/// `requires.vars` entries are names or `{name, enum}` objects
fn required_var(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::Mapping(_) => value.get_string("name"),
        other => other.scalar_string().ok(),
    }
}

/// `includes` entries are a path or an object with `taskfile`
fn include_from_value(value: &YamlValue) -> Option<Include> {
    match value {
        YamlValue::Mapping(_) => Some(Include {
            taskfile: value.get_string("taskfile")?,
            dir: value.get_string("dir"),
            optional: value.get_bool("optional").unwrap_or(false),
            flatten: value.get_bool("flatten").unwrap_or(false),
            internal: value.get_bool("internal").unwrap_or(false),
            aliases: value.get_list("aliases"),
            excludes: value.get_list("excludes"),
            vars: yaml_map(value.get("vars")),
            checksum: value.get_string("checksum"),
        }),
        YamlValue::String(path) => Some(Include {
            taskfile: path.clone(),
            ..Default::default()
        }),
        _ => None,
    }
}

/// `output: prefixed` or `output: {group: {...}}`
fn output_mode(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::Mapping(map) => map.keys().next().cloned(),
        other => other.scalar_string().ok(),
    }
}

fn yaml_map(value: Option<&YamlValue>) -> BTreeMap<String, YamlValue> {
    value
        .and_then(|v| v.as_mapping().ok())
        .cloned()
        .unwrap_or_default()
}

// --- permissive pass ---

#[derive(Debug, Default)]
struct Recovery {
    dropped: Vec<String>,
}

fn field_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

impl Recovery {
    fn drop_field(&mut self, path: String) {
        self.dropped.push(path);
    }

    fn taskfile(&mut self, root: &YamlValue) -> Taskfile {
        if root.as_mapping().is_err() {
            self.drop_field("(root)".to_string());
            return Taskfile::default();
        }

        let mut includes = BTreeMap::new();
        for (namespace, value) in self.mapping(root, "includes", "") {
            match include_from_value(&value) {
                Some(include) => {
                    includes.insert(namespace, include);
                }
                None => self.drop_field(format!("includes.{}", namespace)),
            }
        }

        let mut tasks = BTreeMap::new();
        for (name, value) in self.mapping(root, "tasks", "") {
            if let Some(task) = self.task(&name, &value) {
                tasks.insert(name, task);
            }
        }

        Taskfile {
            version: self.text(root, "version", ""),
            output: match root.get("output") {
                Some(v) => output_mode(v),
                None => None,
            },
            method: self.text(root, "method", ""),
            includes,
            vars: self.mapping(root, "vars", ""),
            env: self.mapping(root, "env", ""),
            tasks,
            silent: self.flag(root, "silent", ""),
            dotenv: self.list(root, "dotenv", ""),
            run: self.text(root, "run", ""),
            interval: self.text(root, "interval", ""),
            set: self.list(root, "set", ""),
            shopt: self.list(root, "shopt", ""),
        }
    }

    fn task(&mut self, name: &str, value: &YamlValue) -> Option<Task> {
        let path = format!("tasks.{}", name);
        match value {
            YamlValue::Null => Some(Task::default()),
            YamlValue::Sequence(items) => Some(Task {
                cmds: self.items(items, &field_path(&path, "cmds"), command_from_value),
                ..Default::default()
            }),
            YamlValue::Mapping(_) => Some(self.full_task(value, &path)),
            scalar => match scalar.scalar_string() {
                Ok(cmd) => Some(Task {
                    cmds: vec![TaskCommand::shell(cmd)],
                    ..Default::default()
                }),
                Err(_) => {
                    self.drop_field(path);
                    None
                }
            },
        }
    }

    fn full_task(&mut self, node: &YamlValue, path: &str) -> Task {
        let requires = match node.get("requires") {
            None | Some(YamlValue::Null) => Vec::new(),
            Some(r) => match r.get("vars") {
                Some(YamlValue::Sequence(vars)) => {
                    self.items(vars, &field_path(path, "requires.vars"), required_var)
                }
                _ => {
                    self.drop_field(field_path(path, "requires"));
                    Vec::new()
                }
            },
        };

        Task {
            desc: self.text(node, "desc", path),
            summary: self.text(node, "summary", path),
            prompt: self.list(node, "prompt", path),
            aliases: self.list(node, "aliases", path),
            cmds: self.sequence(node, "cmds", path, command_from_value),
            cmd: self.text(node, "cmd", path),
            deps: self.sequence(node, "deps", path, dependency_from_value),
            sources: self.sequence(node, "sources", path, glob_from_value),
            generates: self.sequence(node, "generates", path, glob_from_value),
            status: self.list(node, "status", path),
            preconditions: self.sequence(node, "preconditions", path, precondition_from_value),
            requires,
            watch: self.flag(node, "watch", path),
            platforms: self.list(node, "platforms", path),
            silent: self.flag(node, "silent", path),
            internal: self.flag(node, "internal", path),
            vars: self.mapping(node, "vars", path),
            env: self.mapping(node, "env", path),
            run: self.text(node, "run", path),
            ignore_error: self.flag(node, "ignore_error", path),
            dir: self.text(node, "dir", path),
            method: self.text(node, "method", path),
            label: self.text(node, "label", path),
        }
    }

    fn text(&mut self, node: &YamlValue, key: &str, parent: &str) -> Option<String> {
        match node.get(key)? {
            YamlValue::Null => None,
            YamlValue::Sequence(_) | YamlValue::Mapping(_) => {
                self.drop_field(field_path(parent, key));
                None
            }
            scalar => scalar.scalar_string().ok(),
        }
    }

    fn flag(&mut self, node: &YamlValue, key: &str, parent: &str) -> bool {
        match node.get(key) {
            None | Some(YamlValue::Null) => false,
            Some(YamlValue::Bool(b)) => *b,
            Some(_) => {
                self.drop_field(field_path(parent, key));
                false
            }
        }
    }

    fn list(&mut self, node: &YamlValue, key: &str, parent: &str) -> Vec<String> {
        match node.get(key) {
            None | Some(YamlValue::Null) => Vec::new(),
            Some(YamlValue::Mapping(_)) => {
                self.drop_field(field_path(parent, key));
                Vec::new()
            }
            Some(YamlValue::Sequence(items)) => {
                self.items(items, &field_path(parent, key), |v| v.scalar_string().ok())
            }
            Some(scalar) => scalar.string_or_list(),
        }
    }

    fn mapping(&mut self, node: &YamlValue, key: &str, parent: &str) -> BTreeMap<String, YamlValue> {
        match node.get(key) {
            None | Some(YamlValue::Null) => BTreeMap::new(),
            Some(YamlValue::Mapping(map)) => map.clone(),
            Some(_) => {
                self.drop_field(field_path(parent, key));
                BTreeMap::new()
            }
        }
    }

    /// A list field whose items are converted one by one; a bare scalar is
    /// treated as a one-item list
    fn sequence<T>(
        &mut self,
        node: &YamlValue,
        key: &str,
        parent: &str,
        convert: fn(&YamlValue) -> Option<T>,
    ) -> Vec<T> {
        let path = field_path(parent, key);
        match node.get(key) {
            None | Some(YamlValue::Null) => Vec::new(),
            Some(YamlValue::Sequence(items)) => self.items(items, &path, convert),
            Some(YamlValue::Mapping(_)) => {
                self.drop_field(path);
                Vec::new()
            }
            Some(scalar) => self.items(std::slice::from_ref(scalar), &path, convert),
        }
    }

    fn items<T>(
        &mut self,
        items: &[YamlValue],
        path: &str,
        convert: fn(&YamlValue) -> Option<T>,
    ) -> Vec<T> {
        let mut kept = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            match convert(item) {
                Some(value) => kept.push(value),
                None => self.drop_field(format!("{}[{}]", path, i)),
            }
        }
        kept
    }
}
