//! Behavioural properties that hold across the public API

use pipeline_analyzer::classify::{classify, Category, RiskLevel};
use pipeline_analyzer::docker::{parse_dockerfile, Dockerfile};
use pipeline_analyzer::error::SchemaViolation;
use pipeline_analyzer::graph::DependencyGraph;
use pipeline_analyzer::{circleci, github_actions, gotask};
use std::collections::BTreeMap;
use yare::parameterized;

fn dependency_map(edges: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    edges
        .iter()
        .map(|(name, deps)| {
            (
                name.to_string(),
                deps.iter().map(|d| d.to_string()).collect(),
            )
        })
        .collect()
}

#[test]
fn test_workflow_job_shapes_are_equivalent() {
    let bare = "version: 2.1\njobs:\n  build:\n    docker: [{image: alpine}]\n    steps: [checkout]\nworkflows:\n  main:\n    jobs:\n      - build\n";
    let mapped = "version: 2.1\njobs:\n  build:\n    docker: [{image: alpine}]\n    steps: [checkout]\nworkflows:\n  main:\n    jobs:\n      - build:\n          requires: []\n";

    let bare = circleci::parse(".circleci/config.yml", bare).unwrap();
    let mapped = circleci::parse(".circleci/config.yml", mapped).unwrap();

    let bare_job = &bare.workflows["main"].jobs[0];
    assert_eq!(bare_job.job, "build");
    assert!(bare_job.requires.is_empty());
    assert_eq!(bare_job, &mapped.workflows["main"].jobs[0]);
}

#[test]
fn test_needs_shapes_are_equivalent() {
    let scalar = "on: push\njobs:\n  a:\n    runs-on: ubuntu-latest\n    steps: [{run: make}]\n  b:\n    runs-on: ubuntu-latest\n    needs: a\n    steps: [{run: make}]\n";
    let list = "on: push\njobs:\n  a:\n    runs-on: ubuntu-latest\n    steps: [{run: make}]\n  b:\n    runs-on: ubuntu-latest\n    needs: [a]\n    steps: [{run: make}]\n";

    let scalar = github_actions::parse("ci.yml", scalar).unwrap();
    let list = github_actions::parse("ci.yml", list).unwrap();

    assert_eq!(scalar.jobs["b"].needs, vec!["a"]);
    assert_eq!(scalar.jobs["b"], list.jobs["b"]);
}

#[test]
fn test_cycle_detection_is_complete() {
    let deps = dependency_map(&[("A", &["B"]), ("B", &["C"]), ("C", &["A"]), ("D", &[])]);
    let analysis = DependencyGraph::from_dependencies(std::iter::empty(), &deps).analyze();

    assert_eq!(analysis.cycles.len(), 1);
    let mut members = analysis.cycles[0].clone();
    members.sort();
    assert_eq!(members, vec!["A", "B", "C"]);
    assert!(!analysis.cycles[0].contains(&"D".to_string()));
}

#[test]
fn test_self_loop_is_a_cycle() {
    let deps = dependency_map(&[("A", &["A"])]);
    let analysis = DependencyGraph::from_dependencies(std::iter::empty(), &deps).analyze();

    assert_eq!(analysis.cycles, vec![vec!["A".to_string()]]);
}

#[test]
fn test_critical_path_follows_longest_chain() {
    let deps = dependency_map(&[("A", &[]), ("B", &["A"]), ("C", &["B"]), ("D", &["A"])]);
    let path = DependencyGraph::from_dependencies(std::iter::empty(), &deps)
        .analyze()
        .critical_path;

    assert_eq!(path.length, 3);
    assert_eq!(path.tasks, vec!["A", "B", "C"]);
}

#[test]
fn test_docker_classification_is_deterministic() {
    let first = classify("docker run --rm myimage");
    assert_eq!(first.category, Category::Containerization);
    assert!(first.tools.contains(&"docker".to_string()));
    assert!(!first.suggestions.iter().any(|s| s.contains("--rm")));
    for _ in 0..5 {
        assert_eq!(classify("docker run --rm myimage"), first);
    }

    assert!(classify("docker run myimage:latest")
        .suggestions
        .iter()
        .any(|s| s.contains("latest")));
}

#[parameterized(
    remove_root = { "rm -rf /", RiskLevel::High },
    chmod_file = { "chmod 644 file", RiskLevel::Medium },
    echo = { "echo hello", RiskLevel::Low },
)]
fn test_risk_escalation(command: &str, expected: RiskLevel) {
    assert_eq!(classify(command).risk, expected);
}

#[test]
fn test_dockerfile_stages_and_continuations() {
    let text = "FROM golang:1.22 AS build\nRUN apt-get update && \\\n    apt-get install -y git \\\n    make\nFROM alpine:3.19\nCOPY --from=build /out /out\n";
    let dockerfile: Dockerfile = parse_dockerfile("Dockerfile", text).unwrap();

    assert_eq!(dockerfile.stages.len(), 2);
    let run = &dockerfile.stages[0].instructions[1];
    assert_eq!(run.verb, "RUN");
    assert_eq!(
        run.args,
        vec!["apt-get", "update", "&&", "apt-get", "install", "-y", "git", "make"]
    );
}

#[test]
fn test_analysis_is_idempotent() {
    let text = include_str!("fixtures/ci-monorepo/Taskfile.yml");
    let taskfile = gotask::parse("Taskfile.yml", text).unwrap().config;

    let first = gotask::analyze(&taskfile);
    let second = gotask::analyze(&taskfile);
    assert_eq!(first, second);

    let config = circleci::parse(
        ".circleci/config.yml",
        include_str!("fixtures/ci-monorepo/.circleci/config.yml"),
    )
    .unwrap();
    assert_eq!(circleci::analyze(&config), circleci::analyze(&config));
}

#[parameterized(
    scalar_tasks = { "version: '3'\ntasks: build\n" },
    list_tasks = { "version: '3'\ntasks: [a, b]\n" },
    scalar_deps = { "version: '3'\ntasks:\n  build:\n    deps: 42\n" },
    scalar_root = { "just a string\n" },
    numeric_includes = { "version: '3'\nincludes: 7\ntasks:\n  a:\n    cmds: [echo]\n" },
)]
fn test_malformed_taskfile_never_panics(text: &str) {
    match gotask::parse("Taskfile.yml", text) {
        Ok(outcome) => match gotask::validate(&outcome.config) {
            Ok(()) => assert!(outcome.is_recovered() || !outcome.config.tasks.is_empty()),
            Err(violation) => assert!(matches!(
                violation,
                SchemaViolation::NoTasks
                    | SchemaViolation::MissingVersion
                    | SchemaViolation::UnsupportedVersion(_)
            )),
        },
        Err(err) => assert_eq!(err.path, "Taskfile.yml"),
    }
}
