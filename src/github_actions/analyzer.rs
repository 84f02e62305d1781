use super::parser::{docker_images, run_commands, runner_label};
use super::types::*;
use crate::classify::{self, Category, PatternIndex};
use crate::error::{ReferenceAnomaly, ReferenceKind};
use crate::graph::{DependencyGraph, GraphAnalysis};
use serde::Serialize;
use std::collections::BTreeMap;

const SECONDS_PER_STEP: u32 = 30;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GithubActionsAnalysis {
    pub workflow_name: Option<String>,
    pub triggers: Vec<String>,
    pub total_jobs: usize,
    pub total_steps: usize,
    pub total_commands: usize,
    pub jobs: BTreeMap<String, JobAnalysis>,
    /// Times each job is named in another job's `needs`
    pub job_usage: BTreeMap<String, usize>,
    pub job_dependencies: BTreeMap<String, Vec<String>>,
    pub action_usage: BTreeMap<String, usize>,
    /// Runner label to the jobs running on it
    pub runner_usage: BTreeMap<String, Vec<String>>,
    /// Service container image to the jobs using it
    pub service_usage: BTreeMap<String, Vec<String>>,
    pub docker_images: BTreeMap<String, Vec<String>>,
    pub command_patterns: PatternIndex,
    /// Tool to the commands invoking it
    pub tool_commands: BTreeMap<String, Vec<String>>,
    pub command_frequency: BTreeMap<String, usize>,
    pub recommendations: Vec<String>,
    pub issues: Vec<String>,
    pub dangling_references: Vec<ReferenceAnomaly>,
    pub graph: GraphAnalysis,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobAnalysis {
    pub name: String,
    pub display_name: Option<String>,
    pub runner: String,
    pub step_count: usize,
    pub run_commands: Vec<String>,
    pub actions_used: Vec<String>,
    pub dependencies: Vec<String>,
    pub caching_enabled: bool,
    pub matrix_combinations: Option<usize>,
    pub estimated_seconds: u32,
    pub estimated_time: String,
    pub recommendations: Vec<String>,
    pub security_issues: Vec<String>,
}

pub fn analyze(workflow: &Workflow) -> GithubActionsAnalysis {
    let mut analysis = GithubActionsAnalysis {
        workflow_name: workflow.name.clone(),
        triggers: workflow.triggers.clone(),
        total_jobs: workflow.jobs.len(),
        docker_images: docker_images(workflow),
        ..Default::default()
    };

    let known_jobs: Vec<&str> = workflow.jobs.keys().map(String::as_str).collect();
    let mut all_commands: Vec<String> = Vec::new();

    for (name, job) in &workflow.jobs {
        analysis.job_usage.entry(name.clone()).or_insert(0);
        analysis.total_steps += job.steps.len();

        if !job.needs.is_empty() {
            analysis.job_dependencies.insert(name.clone(), job.needs.clone());
        }
        for need in &job.needs {
            *analysis.job_usage.entry(need.clone()).or_insert(0) += 1;
            if !workflow.jobs.contains_key(need) {
                analysis.dangling_references.push(ReferenceAnomaly::new(
                    name,
                    need,
                    ReferenceKind::Dependency,
                    known_jobs.iter().copied(),
                ));
            }
        }

        for label in &job.runs_on {
            analysis
                .runner_usage
                .entry(label.clone())
                .or_default()
                .push(name.clone());
        }
        for service in job.services.values() {
            let jobs = analysis.service_usage.entry(service.image.clone()).or_default();
            if !jobs.contains(name) {
                jobs.push(name.clone());
            }
        }

        let job_analysis = analyze_job(name, job);
        for action in &job_analysis.actions_used {
            *analysis.action_usage.entry(action.clone()).or_insert(0) += 1;
        }
        for command in &job_analysis.run_commands {
            let classification = classify::classify(command);
            analysis.command_patterns.record(name, &classification);
            for tool in &classification.tools {
                analysis
                    .tool_commands
                    .entry(tool.clone())
                    .or_default()
                    .push(command.clone());
            }
            all_commands.push(command.clone());
        }
        analysis.jobs.insert(name.clone(), job_analysis);
    }

    analysis.total_commands = all_commands.len();
    analysis.command_frequency = classify::command_frequency(all_commands.iter().map(String::as_str));
    analysis.recommendations = workflow_recommendations(&analysis, &all_commands);
    analysis.issues = workflow_issues(workflow, &analysis);

    let graph = DependencyGraph::from_dependencies(
        workflow.jobs.keys().map(String::as_str),
        &analysis.job_dependencies,
    );
    analysis.graph = graph.analyze();
    analysis.dangling_references.sort();

    analysis
}

/// Detail view of one job
pub fn analyze_job(name: &str, job: &Job) -> JobAnalysis {
    let mut analysis = JobAnalysis {
        name: name.to_string(),
        display_name: job.name.clone(),
        runner: runner_label(job),
        step_count: job.steps.len(),
        dependencies: job.needs.clone(),
        matrix_combinations: job.strategy.as_ref().and_then(Strategy::matrix_size),
        ..Default::default()
    };

    if let Some(uses) = &job.uses {
        analysis.actions_used.push(uses.clone());
    }
    for step in &job.steps {
        if let Some(uses) = &step.uses {
            if uses.contains("cache") {
                analysis.caching_enabled = true;
            }
            analysis.actions_used.push(uses.clone());
        }
        analysis.run_commands.extend(run_commands(step));
    }

    analysis.estimated_seconds = estimate_seconds(&analysis);
    analysis.estimated_time = format_estimate(analysis.estimated_seconds);
    analysis.recommendations = job_recommendations(&analysis);
    analysis.security_issues = security_issues(&analysis);
    analysis
}

fn estimate_seconds(job: &JobAnalysis) -> u32 {
    let mut seconds = job.step_count as u32 * SECONDS_PER_STEP;
    for command in &job.run_commands {
        if command.contains("npm install") || command.contains("npm ci") {
            seconds += 60;
        }
        if command.contains("docker build") {
            seconds += 180;
        }
        if command.contains("test") {
            seconds += 30;
        }
    }
    seconds
}

/// Buckets a duration into `< 1 min`, `~N min` or `> 5 min`
pub fn format_estimate(seconds: u32) -> String {
    if seconds < 60 {
        "< 1 min".to_string()
    } else if seconds < 300 {
        format!("~{} min", seconds / 60)
    } else {
        "> 5 min".to_string()
    }
}

fn job_recommendations(job: &JobAnalysis) -> Vec<String> {
    let mut recommendations = Vec::new();

    if !job.caching_enabled && job.run_commands.len() > 3 {
        recommendations.push("Consider adding caching to improve build times".to_string());
    }

    let script_calls = job
        .run_commands
        .iter()
        .filter(|c| c.contains("npm run") || c.contains("make") || c.contains("scripts/"))
        .count();
    if script_calls > 2 {
        recommendations.push(
            "Multiple script executions - good candidate for go-task consolidation".to_string(),
        );
    }

    recommendations
}

fn is_pinned(action: &str) -> bool {
    if action.starts_with("./") {
        return true;
    }
    match action.rsplit_once('@') {
        Some((_, version)) => !matches!(version, "latest" | "main" | "master" | ""),
        None => action.starts_with("docker://") && action.contains(':'),
    }
}

fn security_issues(job: &JobAnalysis) -> Vec<String> {
    let mut issues = Vec::new();

    for action in &job.actions_used {
        if !is_pinned(action) {
            issues.push(format!("Action '{}' not pinned to specific version", action));
        }
    }

    for command in &job.run_commands {
        let lowered = command.to_lowercase();
        if (lowered.contains("curl") || lowered.contains("wget"))
            && lowered.contains('|')
            && lowered.contains("sh")
        {
            issues.push("Potential security risk: piping a download to a shell".to_string());
        }
    }

    issues
}

fn workflow_recommendations(analysis: &GithubActionsAnalysis, commands: &[String]) -> Vec<String> {
    let mut recommendations = Vec::new();

    if !analysis.tool_commands.is_empty() {
        recommendations.push(
            "Consider creating go-task equivalents for repeated command patterns".to_string(),
        );
    }
    if analysis.tool_commands.get("npm").map_or(0, Vec::len) > 3 {
        recommendations.push(
            "Multiple npm commands detected - consider consolidating into go-task".to_string(),
        );
    }
    if analysis.tool_commands.get("docker").map_or(0, Vec::len) > 2 {
        recommendations.push(
            "Docker commands found - go-task could simplify container management".to_string(),
        );
    }

    let has_tests = analysis
        .command_patterns
        .by_category
        .contains_key(&Category::Testing)
        || commands.iter().any(|c| c.to_lowercase().contains("test"));
    if has_tests {
        recommendations.push(
            "Test commands detected - go-task could provide consistent local/CI testing"
                .to_string(),
        );
    }

    recommendations
}

fn workflow_issues(workflow: &Workflow, analysis: &GithubActionsAnalysis) -> Vec<String> {
    let mut issues = Vec::new();

    if workflow.name.as_deref().map_or(true, str::is_empty) {
        issues.push("Workflow missing name field".to_string());
    }

    let independent = analysis
        .jobs
        .values()
        .filter(|j| j.dependencies.is_empty())
        .count();
    if independent > 3 {
        issues.push(
            "Many independent jobs - consider if some should have dependencies".to_string(),
        );
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::super::parser::parse;
    use super::*;

    const WORKFLOW: &str = r#"
name: Release
on: [push]
jobs:
  build:
    runs-on: ubuntu-latest
    services:
      cache:
        image: redis:7
    steps:
      - uses: actions/checkout@v4
      - uses: actions/setup-node
      - run: |
          npm ci
          npm run build
          npm run lint
          npm run test
          docker build -t app .
  image:
    runs-on: ubuntu-latest
    needs: build
    steps:
      - run: curl -sSL https://get.example.com | sh
      - uses: docker/login-action@master
  deploy:
    runs-on: ubuntu-latest
    needs: [image, buld]
    steps:
      - run: kubectl apply -f k8s/
"#;

    fn analysis() -> GithubActionsAnalysis {
        analyze(&parse("release.yml", WORKFLOW).unwrap())
    }

    #[test]
    fn test_dependencies_and_usage() {
        let a = analysis();
        assert_eq!(a.job_dependencies["image"], vec!["build"]);
        assert!(!a.job_dependencies.contains_key("build"));
        assert_eq!(a.job_usage["build"], 1);
        assert_eq!(a.job_usage["image"], 1);
        assert_eq!(a.job_usage["deploy"], 0);
    }

    #[test]
    fn test_dangling_needs() {
        let a = analysis();
        assert_eq!(a.dangling_references.len(), 1);
        let anomaly = &a.dangling_references[0];
        assert_eq!(anomaly.reference, "buld");
        assert_eq!(anomaly.suggestion.as_deref(), Some("build"));
    }

    #[test]
    fn test_usage_indexes() {
        let a = analysis();
        assert_eq!(a.action_usage["actions/checkout@v4"], 1);
        assert_eq!(a.runner_usage["ubuntu-latest"].len(), 3);
        assert_eq!(a.service_usage["redis:7"], vec!["build"]);
        assert_eq!(a.docker_images["app"], vec!["build"]);
        assert_eq!(a.tool_commands["npm"].len(), 4);
    }

    #[test]
    fn test_job_analysis() {
        let a = analysis();
        let build = &a.jobs["build"];
        assert_eq!(build.step_count, 3);
        assert_eq!(build.run_commands.len(), 5);
        assert!(!build.caching_enabled);
        // 3 steps, npm ci, docker build, npm run test
        assert_eq!(build.estimated_seconds, 90 + 60 + 180 + 30);
        assert_eq!(build.estimated_time, "> 5 min");
        assert!(build
            .recommendations
            .iter()
            .any(|r| r.contains("caching")));
        assert!(build
            .recommendations
            .iter()
            .any(|r| r.contains("go-task consolidation")));
        assert!(build
            .security_issues
            .iter()
            .any(|i| i.contains("actions/setup-node")));
    }

    #[test]
    fn test_security_issues() {
        let a = analysis();
        let image = &a.jobs["image"];
        assert_eq!(image.security_issues.len(), 2);
        assert!(image.security_issues.iter().any(|i| i.contains("shell")));
    }

    #[test]
    fn test_workflow_recommendations() {
        let a = analysis();
        assert!(a.recommendations.iter().any(|r| r.contains("npm commands")));
        assert!(a.recommendations.iter().any(|r| r.contains("Test commands")));
        assert!(a.issues.is_empty());
    }

    #[test]
    fn test_graph_and_critical_path() {
        let a = analysis();
        assert!(!a.graph.has_cycles());
        assert_eq!(a.graph.critical_path.tasks, vec!["build", "image", "deploy"]);
    }

    #[test]
    fn test_format_estimate() {
        assert_eq!(format_estimate(30), "< 1 min");
        assert_eq!(format_estimate(150), "~2 min");
        assert_eq!(format_estimate(300), "> 5 min");
    }

    #[test]
    fn test_pinning_rules() {
        assert!(is_pinned("actions/checkout@v4"));
        assert!(is_pinned("actions/checkout@8ade135a41bc03ea155e62e844d188df1ea18608"));
        assert!(is_pinned("./.github/actions/local"));
        assert!(!is_pinned("actions/checkout"));
        assert!(!is_pinned("actions/checkout@latest"));
        assert!(!is_pinned("docker://alpine"));
    }
}
