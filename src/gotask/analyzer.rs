use super::types::*;
use crate::classify::{self, CommandClassification, PatternIndex, RiskLevel};
use crate::error::{ReferenceAnomaly, ReferenceKind};
use crate::graph::{DependencyGraph, GraphAnalysis};
use crate::yaml::{Number, YamlValue};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Tasks above this complexity without `sources`/`generates` get a caching tip
const CACHING_COMPLEXITY_THRESHOLD: usize = 2;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskfileAnalysis {
    pub version: Option<String>,
    pub total_tasks: usize,
    pub total_includes: usize,
    pub total_commands: usize,
    /// Times each task is named in another task's `deps`
    pub task_usage: BTreeMap<String, usize>,
    /// Times each task is invoked from another task's `cmds`
    pub call_usage: BTreeMap<String, usize>,
    pub task_dependencies: BTreeMap<String, Vec<String>>,
    pub command_patterns: PatternIndex,
    pub command_frequency: BTreeMap<String, usize>,
    /// Global variables by name, task variables as `task.NAME`
    pub variables: BTreeMap<String, VariableUsage>,
    pub environment: BTreeMap<String, VariableUsage>,
    pub includes: BTreeMap<String, Include>,
    pub tasks: BTreeMap<String, TaskAnalysis>,
    pub optimization_tips: Vec<OptimizationTip>,
    pub performance: PerformanceMetrics,
    pub ecosystem: String,
    pub dangling_references: Vec<ReferenceAnomaly>,
    pub graph: GraphAnalysis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableKind {
    /// Dynamic variable evaluated by a shell (`sh:`)
    Shell,
    String,
    Int,
    Float,
    Bool,
    Array,
    Object,
    Nil,
}

impl VariableKind {
    pub fn of(value: &YamlValue) -> Self {
        match value {
            YamlValue::Null => VariableKind::Nil,
            YamlValue::Bool(_) => VariableKind::Bool,
            YamlValue::Number(Number::Int(_)) => VariableKind::Int,
            YamlValue::Number(Number::Float(_)) => VariableKind::Float,
            YamlValue::String(s) if s.trim_start().starts_with("sh:") => VariableKind::Shell,
            YamlValue::String(_) => VariableKind::String,
            YamlValue::Sequence(_) => VariableKind::Array,
            YamlValue::Mapping(map) if map.contains_key("sh") => VariableKind::Shell,
            YamlValue::Mapping(_) => VariableKind::Object,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableUsage {
    pub name: String,
    /// Declaring task, `None` for Taskfile-level declarations
    pub scope: Option<String>,
    pub kind: VariableKind,
    pub value: YamlValue,
    pub used_in_tasks: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Build,
    Test,
    Deploy,
    Clean,
    Lint,
    Install,
    Container,
    Utility,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Caching,
    Dependency,
    Usage,
    Documentation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizationTip {
    pub kind: TipKind,
    pub task: String,
    pub message: String,
    pub severity: Severity,
    pub suggestion: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub tasks_with_sources: usize,
    pub tasks_with_generates: usize,
    pub tasks_with_caching: usize,
    /// Tasks without dependencies
    pub parallelizable_tasks: usize,
    /// Share of tasks not yet cached, in percent
    pub optimization_potential: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskAnalysis {
    pub name: String,
    pub description: Option<String>,
    pub summary: Option<String>,
    pub task_type: TaskType,
    pub commands: Vec<CommandClassification>,
    pub dependencies: Vec<String>,
    pub calls: Vec<String>,
    pub preconditions: Vec<String>,
    pub sources: Vec<String>,
    pub generates: Vec<String>,
    pub platforms: Vec<String>,
    pub aliases: Vec<String>,
    pub usage_count: usize,
    pub internal: bool,
    pub watch: bool,
    pub cached: bool,
    pub complexity: usize,
    pub max_risk: RiskLevel,
    /// Template variables the task reads (`{{.NAME}}`)
    pub variables: Vec<String>,
}

impl TaskfileAnalysis {
    /// Tasks ranked by dependency usage, highest first; equal counts in name order
    pub fn most_used_tasks(&self, limit: usize) -> Vec<(String, usize)> {
        let mut ranked: Vec<(String, usize)> = self
            .task_usage
            .iter()
            .map(|(name, count)| (name.clone(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    pub fn has_circular_dependencies(&self) -> bool {
        self.graph.has_cycles()
    }
}

pub fn analyze(taskfile: &Taskfile) -> TaskfileAnalysis {
    let mut analysis = TaskfileAnalysis {
        version: taskfile.version.clone(),
        total_tasks: taskfile.tasks.len(),
        total_includes: taskfile.includes.len(),
        includes: taskfile.includes.clone(),
        ..Default::default()
    };

    for name in taskfile.tasks.keys() {
        analysis.task_usage.insert(name.clone(), 0);
        analysis.call_usage.insert(name.clone(), 0);
    }

    for (name, task) in &taskfile.tasks {
        let deps = task.dependency_names();
        for dep in &deps {
            *analysis.task_usage.entry(dep.clone()).or_insert(0) += 1;
        }
        if !deps.is_empty() {
            analysis.task_dependencies.insert(name.clone(), deps);
        }
        for call in task.task_calls() {
            *analysis.call_usage.entry(resolve_call(call).to_string()).or_insert(0) += 1;
        }
    }

    find_dangling_references(taskfile, &mut analysis);

    let mut all_commands: Vec<String> = Vec::new();
    for (name, task) in &taskfile.tasks {
        let task_analysis = analyze_task(name, task, analysis.task_usage[name]);
        for classification in &task_analysis.commands {
            analysis.command_patterns.record(name, classification);
            all_commands.push(classification.command.clone());
        }
        analysis.tasks.insert(name.clone(), task_analysis);
    }
    analysis.total_commands = all_commands.len();
    analysis.command_frequency = classify::command_frequency(all_commands.iter().map(String::as_str));
    analysis.ecosystem = classify::detect_ecosystem(all_commands.iter().map(String::as_str));

    analyze_variables(taskfile, &mut analysis);

    let graph = DependencyGraph::from_dependencies(
        taskfile.tasks.keys().map(String::as_str),
        &analysis.task_dependencies,
    );
    analysis.graph = graph.analyze();

    analysis.optimization_tips = optimization_tips(taskfile, &analysis);
    analysis.performance = performance_metrics(taskfile);
    analysis.dangling_references.sort();

    analysis
}

/// Detail view of one task
pub fn analyze_task(name: &str, task: &Task, usage_count: usize) -> TaskAnalysis {
    let commands: Vec<CommandClassification> = task
        .shell_commands()
        .into_iter()
        .flat_map(classify::script_lines)
        .map(|command| classify::classify(&command))
        .collect();
    let max_risk = commands
        .iter()
        .map(|c| c.risk)
        .max()
        .unwrap_or(RiskLevel::Low);

    TaskAnalysis {
        name: name.to_string(),
        description: task.desc.clone(),
        summary: task.summary.clone(),
        task_type: detect_task_type(name, task),
        dependencies: task.dependency_names(),
        calls: task.task_calls().into_iter().map(str::to_string).collect(),
        preconditions: task.preconditions.iter().map(|p| p.sh.clone()).collect(),
        sources: task.sources.clone(),
        generates: task.generates.clone(),
        platforms: task.platforms.clone(),
        aliases: task.aliases.clone(),
        usage_count,
        internal: task.internal,
        watch: task.watch,
        cached: task.is_cached(),
        complexity: task.complexity(),
        max_risk,
        variables: template_references(task).into_iter().collect(),
        commands,
    }
}

/// Classifies a task by its name first, then by the tools its commands run
pub fn detect_task_type(name: &str, task: &Task) -> TaskType {
    let name = name.to_lowercase();
    let by_name: &[(&[&str], TaskType)] = &[
        (&["build"], TaskType::Build),
        (&["test"], TaskType::Test),
        (&["deploy"], TaskType::Deploy),
        (&["clean"], TaskType::Clean),
        (&["lint", "format", "fmt"], TaskType::Lint),
        (&["install", "setup"], TaskType::Install),
    ];
    for (needles, task_type) in by_name {
        if needles.iter().any(|n| name.contains(n)) {
            return *task_type;
        }
    }

    let commands = task.shell_commands().join("\n").to_lowercase();
    if commands.contains("go build") || commands.contains("go run") {
        TaskType::Build
    } else if commands.contains("go test") || commands.contains("npm test") {
        TaskType::Test
    } else if commands.contains("docker") {
        TaskType::Container
    } else if commands.contains("kubectl") || commands.contains("helm") {
        TaskType::Deploy
    } else {
        TaskType::Utility
    }
}

/// `:build` calls the root Taskfile's `build`
fn resolve_call(call: &str) -> &str {
    call.strip_prefix(':').unwrap_or(call)
}

/// Names whose namespace is an include are resolved by the included file.
/// A flattened include can define any name, so nothing is dangling then.
fn find_dangling_references(taskfile: &Taskfile, analysis: &mut TaskfileAnalysis) {
    if taskfile.includes.values().any(|i| i.flatten) {
        return;
    }
    let known: Vec<&str> = taskfile.tasks.keys().map(String::as_str).collect();
    let is_known = |reference: &str| {
        taskfile.tasks.contains_key(reference)
            || reference
                .split_once(':')
                .map_or(false, |(namespace, _)| taskfile.includes.contains_key(namespace))
    };

    for (name, task) in &taskfile.tasks {
        for dep in &task.deps {
            if !is_known(&dep.task) {
                analysis.dangling_references.push(ReferenceAnomaly::new(
                    name,
                    &dep.task,
                    ReferenceKind::Dependency,
                    known.iter().copied(),
                ));
            }
        }
        for call in task.task_calls() {
            let target = resolve_call(call);
            if !is_known(target) {
                analysis.dangling_references.push(ReferenceAnomaly::new(
                    name,
                    target,
                    ReferenceKind::Definition,
                    known.iter().copied(),
                ));
            }
        }
    }
}

fn template_regex() -> &'static Regex {
    static TEMPLATE: OnceLock<Regex> = OnceLock::new();
    TEMPLATE.get_or_init(|| Regex::new(r"\{\{([^}]*)\}\}").expect("valid regex"))
}

fn field_regex() -> &'static Regex {
    static FIELD: OnceLock<Regex> = OnceLock::new();
    FIELD.get_or_init(|| Regex::new(r"\.([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"))
}

fn shell_var_regex() -> &'static Regex {
    static SHELL_VAR: OnceLock<Regex> = OnceLock::new();
    SHELL_VAR.get_or_init(|| Regex::new(r"\$\{?([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"))
}

/// Every piece of text in a task that go-task renders or runs
fn task_text(task: &Task) -> Vec<&str> {
    let mut text: Vec<&str> = task.shell_commands();
    text.extend(task.preconditions.iter().map(|p| p.sh.as_str()));
    text.extend(task.status.iter().map(String::as_str));
    text.extend(task.sources.iter().map(String::as_str));
    text.extend(task.generates.iter().map(String::as_str));
    text.extend(task.dir.as_deref());
    text.extend(task.label.as_deref());
    text
}

/// Variable names referenced from `{{ ... }}` templates
fn template_references(task: &Task) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for text in task_text(task) {
        for template in template_regex().captures_iter(text) {
            for field in field_regex().captures_iter(&template[1]) {
                names.insert(field[1].to_string());
            }
        }
    }
    names
}

/// Environment names referenced as `$NAME` or `${NAME}`
fn shell_references(task: &Task) -> BTreeSet<String> {
    task_text(task)
        .into_iter()
        .flat_map(|text| shell_var_regex().captures_iter(text))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Tasks whose reference set contains `var`
fn readers(var: &str, refs: &BTreeMap<&str, BTreeSet<String>>) -> Vec<String> {
    refs.iter()
        .filter(|(_, names)| names.contains(var))
        .map(|(task, _)| task.to_string())
        .collect()
}

fn analyze_variables(taskfile: &Taskfile, analysis: &mut TaskfileAnalysis) {
    let mut templates: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    let mut shell: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for (name, task) in &taskfile.tasks {
        templates.insert(name.as_str(), template_references(task));
        shell.insert(name.as_str(), shell_references(task));
    }

    for (name, value) in &taskfile.vars {
        analysis.variables.insert(
            name.clone(),
            VariableUsage {
                name: name.clone(),
                scope: None,
                kind: VariableKind::of(value),
                value: value.clone(),
                used_in_tasks: readers(name, &templates),
            },
        );
    }
    for (name, value) in &taskfile.env {
        let mut used = readers(name, &shell);
        for task in readers(name, &templates) {
            if !used.contains(&task) {
                used.push(task);
            }
        }
        used.sort();
        analysis.environment.insert(
            name.clone(),
            VariableUsage {
                name: name.clone(),
                scope: None,
                kind: VariableKind::of(value),
                value: value.clone(),
                used_in_tasks: used,
            },
        );
    }

    for (task_name, task) in &taskfile.tasks {
        let scoped = |name: &str, value: &YamlValue| VariableUsage {
            name: name.to_string(),
            scope: Some(task_name.clone()),
            kind: VariableKind::of(value),
            value: value.clone(),
            used_in_tasks: vec![task_name.clone()],
        };
        for (name, value) in &task.vars {
            analysis
                .variables
                .insert(format!("{}.{}", task_name, name), scoped(name, value));
        }
        for (name, value) in &task.env {
            analysis
                .environment
                .insert(format!("{}.{}", task_name, name), scoped(name, value));
        }
    }
}

fn optimization_tips(taskfile: &Taskfile, analysis: &TaskfileAnalysis) -> Vec<OptimizationTip> {
    let mut tips = Vec::new();

    for (name, task) in &taskfile.tasks {
        if !task.is_cached() && task.complexity() > CACHING_COMPLEXITY_THRESHOLD {
            tips.push(OptimizationTip {
                kind: TipKind::Caching,
                task: name.clone(),
                message: "Task could benefit from caching".to_string(),
                severity: Severity::Medium,
                suggestion: "Add 'sources' and 'generates' fields to enable task result caching"
                    .to_string(),
            });
        }

        let referenced = analysis.task_usage.get(name).copied().unwrap_or(0)
            + analysis.call_usage.get(name).copied().unwrap_or(0);
        if referenced == 0 && name != "default" {
            tips.push(OptimizationTip {
                kind: TipKind::Usage,
                task: name.clone(),
                message: "Task is not referenced by any other task".to_string(),
                severity: Severity::Low,
                suggestion: "Consider if this task is needed or should be marked as internal"
                    .to_string(),
            });
        }

        if task.desc.is_none() && !task.internal {
            tips.push(OptimizationTip {
                kind: TipKind::Documentation,
                task: name.clone(),
                message: "Task has no description".to_string(),
                severity: Severity::Low,
                suggestion: "Add a description to improve task documentation".to_string(),
            });
        }
    }

    for cycle in &analysis.graph.cycles {
        tips.push(OptimizationTip {
            kind: TipKind::Dependency,
            task: cycle.join(" -> "),
            message: "Circular dependency detected".to_string(),
            severity: Severity::High,
            suggestion: "Refactor tasks to break the circular dependency".to_string(),
        });
    }

    tips
}

fn performance_metrics(taskfile: &Taskfile) -> PerformanceMetrics {
    let tasks = &taskfile.tasks;
    let mut metrics = PerformanceMetrics {
        tasks_with_sources: tasks.values().filter(|t| !t.sources.is_empty()).count(),
        tasks_with_generates: tasks.values().filter(|t| !t.generates.is_empty()).count(),
        tasks_with_caching: tasks.values().filter(|t| t.is_cached()).count(),
        parallelizable_tasks: tasks.values().filter(|t| t.deps.is_empty()).count(),
        optimization_potential: 0.0,
    };
    if !tasks.is_empty() {
        let uncached = tasks.len() - metrics.tasks_with_caching;
        metrics.optimization_potential = uncached as f64 / tasks.len() as f64 * 100.0;
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gotask::parse;

    const TASKFILE: &str = r#"
version: '3'
includes:
  docs: ./docs
vars:
  BINARY: app
  GIT_COMMIT:
    sh: git rev-parse --short HEAD
  PLATFORMS: [linux, darwin]
env:
  CGO_ENABLED: 0
tasks:
  default:
    deps: [build]
  build:
    desc: Build the binary
    deps: [generate]
    cmds:
      - go build -ldflags "-X main.commit={{.GIT_COMMIT}}" -o {{.BINARY}} ./cmd
    sources: ["**/*.go"]
    generates: ["{{.BINARY}}"]
  generate:
    cmds:
      - go generate ./...
  test:
    desc: Run tests
    deps: [generate]
    vars:
      FLAGS: -race
    cmds:
      - CGO_ENABLED=1 go test {{.FLAGS}} ./...
      - echo $CGO_ENABLED
      - task: docs:build
  image:
    desc: Build the container image
    cmds:
      - docker build -t app .
"#;

    fn analysis() -> TaskfileAnalysis {
        analyze(&parse("Taskfile.yml", TASKFILE).unwrap().config)
    }

    #[test]
    fn test_usage_and_dependencies() {
        let analysis = analysis();
        assert_eq!(analysis.total_tasks, 5);
        assert_eq!(analysis.task_usage["generate"], 2);
        assert_eq!(analysis.task_usage["build"], 1);
        assert_eq!(analysis.task_usage["image"], 0);
        assert_eq!(analysis.task_dependencies["default"], vec!["build"]);
        assert!(!analysis.task_dependencies.contains_key("image"));
        assert_eq!(analysis.call_usage["docs:build"], 1);
        assert!(analysis.dangling_references.is_empty());
    }

    #[test]
    fn test_graph_section() {
        let analysis = analysis();
        assert!(!analysis.has_circular_dependencies());
        assert_eq!(
            analysis.graph.critical_path.tasks,
            vec!["generate", "build", "default"]
        );
    }

    #[test]
    fn test_variable_kinds_and_usage() {
        let analysis = analysis();
        let binary = &analysis.variables["BINARY"];
        assert_eq!(binary.kind, VariableKind::String);
        assert_eq!(binary.used_in_tasks, vec!["build"]);
        assert_eq!(analysis.variables["GIT_COMMIT"].kind, VariableKind::Shell);
        assert_eq!(analysis.variables["PLATFORMS"].kind, VariableKind::Array);
        assert!(analysis.variables["PLATFORMS"].used_in_tasks.is_empty());

        let flags = &analysis.variables["test.FLAGS"];
        assert_eq!(flags.scope.as_deref(), Some("test"));
        assert_eq!(flags.used_in_tasks, vec!["test"]);

        let cgo = &analysis.environment["CGO_ENABLED"];
        assert_eq!(cgo.kind, VariableKind::Int);
        assert_eq!(cgo.used_in_tasks, vec!["test"]);
    }

    #[test]
    fn test_task_details() {
        let analysis = analysis();
        let build = &analysis.tasks["build"];
        assert_eq!(build.task_type, TaskType::Build);
        assert!(build.cached);
        assert_eq!(build.variables, vec!["BINARY", "GIT_COMMIT"]);

        let image = &analysis.tasks["image"];
        assert_eq!(image.task_type, TaskType::Container);
        assert_eq!(image.commands[0].tools, vec!["docker"]);

        let test = &analysis.tasks["test"];
        assert_eq!(test.calls, vec!["docs:build"]);
        assert_eq!(test.complexity, 5);
        assert_eq!(analysis.tasks["generate"].task_type, TaskType::Utility);
    }

    #[test]
    fn test_optimization_tips() {
        let analysis = analysis();
        let tip = |kind: TipKind, task: &str| {
            analysis
                .optimization_tips
                .iter()
                .any(|t| t.kind == kind && t.task == task)
        };
        assert!(tip(TipKind::Caching, "test"));
        assert!(!tip(TipKind::Caching, "build"));
        assert!(tip(TipKind::Usage, "image"));
        assert!(!tip(TipKind::Usage, "default"));
        assert!(tip(TipKind::Documentation, "generate"));
        assert!(!tip(TipKind::Documentation, "build"));
    }

    #[test]
    fn test_cycle_tip() {
        let text = "version: '3'\ntasks:\n  a:\n    deps: [b]\n  b:\n    deps: [a]\n";
        let analysis = analyze(&parse("Taskfile.yml", text).unwrap().config);
        assert!(analysis.has_circular_dependencies());
        let tip = analysis
            .optimization_tips
            .iter()
            .find(|t| t.kind == TipKind::Dependency)
            .unwrap();
        assert_eq!(tip.task, "a -> b");
        assert_eq!(tip.severity, Severity::High);
    }

    #[test]
    fn test_dangling_dependency() {
        let text = "version: '3'\ntasks:\n  deploy:\n    deps: [biuld]\n  build: go build\n";
        let analysis = analyze(&parse("Taskfile.yml", text).unwrap().config);
        assert_eq!(analysis.dangling_references.len(), 1);
        let anomaly = &analysis.dangling_references[0];
        assert_eq!(anomaly.reference, "biuld");
        assert_eq!(anomaly.suggestion.as_deref(), Some("build"));
        assert_eq!(analysis.task_usage["biuld"], 1);
    }

    #[test]
    fn test_performance_metrics() {
        let metrics = analysis().performance;
        assert_eq!(metrics.tasks_with_sources, 1);
        assert_eq!(metrics.tasks_with_caching, 1);
        assert_eq!(metrics.parallelizable_tasks, 2);
        assert!((metrics.optimization_potential - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let taskfile = parse("Taskfile.yml", TASKFILE).unwrap().config;
        assert_eq!(analyze(&taskfile), analyze(&taskfile));
    }

    #[test]
    fn test_empty_taskfile() {
        let analysis = analyze(&Taskfile::default());
        assert_eq!(analysis.performance.optimization_potential, 0.0);
        assert!(analysis.optimization_tips.is_empty());
        assert_eq!(analysis.ecosystem, "shell");
    }

    #[test]
    fn test_most_used_tasks_ties_in_name_order() {
        let text = "version: '3'\ntasks:\n  zeta:\n    deps: [c, b]\n  alpha:\n    deps: [c]\n  c: echo c\n  b: echo b\n";
        let analysis = analyze(&parse("Taskfile.yml", text).unwrap().config);

        let ranked = analysis.most_used_tasks(4);
        assert_eq!(
            ranked,
            vec![
                ("c".to_string(), 2),
                ("b".to_string(), 1),
                ("alpha".to_string(), 0),
                ("zeta".to_string(), 0),
            ]
        );
    }
}
