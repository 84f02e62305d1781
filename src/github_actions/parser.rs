use super::types::*;
use crate::classify;
use crate::docker;
use crate::error::{DecodeError, SchemaViolation};
use crate::yaml::{self, YamlValue};
use std::collections::BTreeMap;

pub fn parse(path: &str, text: &str) -> Result<Workflow, DecodeError> {
    let root = yaml::decode(path, text)?;
    Ok(from_value(&root))
}

pub fn from_value(root: &YamlValue) -> Workflow {
    // YAML 1.1 loaders turn a bare `on` key into boolean true
    let triggers = root
        .get("on")
        .or_else(|| root.get("true"))
        .map(YamlValue::names)
        .unwrap_or_default();

    Workflow {
        name: root.get_string("name"),
        triggers,
        env: root.get_map("env"),
        permissions: root.get("permissions").cloned(),
        concurrency: root.get("concurrency").and_then(|c| match c {
            YamlValue::Mapping(_) => c.get_string("group"),
            other => other.scalar_string().ok(),
        }),
        jobs: root
            .get("jobs")
            .map(|jobs| {
                jobs.entries()
                    .map(|(name, job)| (name.clone(), parse_job(job)))
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// A workflow needs at least one job, and every job needs steps or `uses`
pub fn validate(workflow: &Workflow) -> Result<(), SchemaViolation> {
    if workflow.jobs.is_empty() {
        return Err(SchemaViolation::NoJobs);
    }
    for (name, job) in &workflow.jobs {
        if job.steps.is_empty() && job.uses.is_none() {
            return Err(SchemaViolation::EmptyJob(name.clone()));
        }
    }
    Ok(())
}

fn parse_job(value: &YamlValue) -> Job {
    Job {
        name: value.get_string("name"),
        runs_on: value.get("runs-on").map(parse_runs_on).unwrap_or_default(),
        needs: value.get_list("needs"),
        condition: value.get_string("if"),
        env: value.get_map("env"),
        strategy: value.get("strategy").map(|s| Strategy {
            matrix: s.get("matrix").cloned(),
            fail_fast: s.get_bool("fail-fast"),
            max_parallel: s.get_u32("max-parallel"),
        }),
        container: value.get("container").and_then(parse_container),
        services: value
            .get("services")
            .map(|services| {
                services
                    .entries()
                    .filter_map(|(name, s)| parse_container(s).map(|c| (name.clone(), c)))
                    .collect()
            })
            .unwrap_or_default(),
        steps: value
            .get("steps")
            .map(|steps| steps.items().iter().map(parse_step).collect())
            .unwrap_or_default(),
        timeout_minutes: value.get_u32("timeout-minutes"),
        permissions: value.get("permissions").cloned(),
        environment: value.get("environment").and_then(|e| match e {
            YamlValue::Mapping(_) => e.get_string("name"),
            other => other.scalar_string().ok(),
        }),
        uses: value.get_string("uses"),
    }
}

/// `runs-on` is a label, a list of labels, or `{group, labels}`
fn parse_runs_on(value: &YamlValue) -> Vec<String> {
    match value {
        YamlValue::Mapping(_) => {
            let mut labels = value.get_list("labels");
            if let Some(group) = value.get_string("group") {
                labels.insert(0, group);
            }
            labels
        }
        other => other.string_or_list(),
    }
}

/// `container`/`services` entries are an image string or an object with `image`
fn parse_container(value: &YamlValue) -> Option<Container> {
    match value {
        YamlValue::Mapping(_) => Some(Container {
            image: value.get_string("image")?,
            env: value.get_map("env"),
            ports: value.get_list("ports"),
            volumes: value.get_list("volumes"),
            options: value.get_string("options"),
        }),
        other => other.scalar_string().ok().map(|image| Container {
            image,
            ..Default::default()
        }),
    }
}

fn parse_step(value: &YamlValue) -> Step {
    Step {
        name: value.get_string("name"),
        id: value.get_string("id"),
        condition: value.get_string("if"),
        uses: value.get_string("uses"),
        run: value.get_string("run"),
        shell: value.get_string("shell"),
        with: value
            .get("with")
            .map(|w| w.entries().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default(),
        env: value.get_map("env"),
        working_directory: value.get_string("working-directory"),
        continue_on_error: value.get_bool("continue-on-error").unwrap_or(false),
        timeout_minutes: value.get_u32("timeout-minutes"),
    }
}

/// Individual shell commands of a step's `run` script
pub fn run_commands(step: &Step) -> Vec<String> {
    step.run
        .as_deref()
        .map(classify::script_lines)
        .unwrap_or_default()
}

/// First runner label, `reusable-workflow` for workflow calls, else `unknown`
pub fn runner_label(job: &Job) -> String {
    match job.runs_on.first() {
        Some(label) => label.clone(),
        None if job.uses.is_some() => "reusable-workflow".to_string(),
        None => "unknown".to_string(),
    }
}

/// Docker images used by each job: container, services and docker CLI commands
pub fn docker_images(workflow: &Workflow) -> BTreeMap<String, Vec<String>> {
    let mut images: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut add = |image: &str, job: &str| {
        let jobs = images.entry(image.to_string()).or_default();
        if !jobs.iter().any(|j| j == job) {
            jobs.push(job.to_string());
        }
    };

    for (job_name, job) in &workflow.jobs {
        if let Some(container) = &job.container {
            add(&container.image, job_name);
        }
        for service in job.services.values() {
            add(&service.image, job_name);
        }
        for step in &job.steps {
            if let Some(image) = step.uses.as_deref().and_then(|u| u.strip_prefix("docker://")) {
                add(image, job_name);
            }
            for command in run_commands(step) {
                for image in docker::images_in_command(&command) {
                    add(&image, job_name);
                }
            }
        }
    }
    images
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORKFLOW: &str = r#"
name: CI
on:
  push:
    branches: [main]
  pull_request:
jobs:
  lint:
    runs-on: ubuntu-latest
    steps:
      - uses: actions/checkout@v4
      - run: npm run lint
  test:
    runs-on: [self-hosted, linux]
    needs: lint
    container: node:20
    services:
      db:
        image: postgres:16
        ports: ["5432:5432"]
    strategy:
      fail-fast: false
      matrix:
        node: [18, 20]
        os: [ubuntu, macos]
        include:
          - node: 22
    steps:
      - uses: actions/cache@v4
        with:
          path: ~/.npm
      - name: Test
        run: |
          # install first
          npm ci
          npm test
        continue-on-error: true
  publish:
    needs: [lint, test]
    uses: org/repo/.github/workflows/publish.yml@v1
"#;

    #[test]
    fn test_parse_workflow() {
        let workflow = parse("ci.yml", WORKFLOW).unwrap();
        assert_eq!(workflow.name.as_deref(), Some("CI"));
        assert_eq!(workflow.triggers, vec!["pull_request", "push"]);
        assert_eq!(workflow.jobs.len(), 3);
        assert!(validate(&workflow).is_ok());
    }

    #[test]
    fn test_needs_string_or_list() {
        let workflow = parse("ci.yml", WORKFLOW).unwrap();
        assert_eq!(workflow.jobs["test"].needs, vec!["lint"]);
        assert_eq!(workflow.jobs["publish"].needs, vec!["lint", "test"]);
    }

    #[test]
    fn test_runner_labels() {
        let workflow = parse("ci.yml", WORKFLOW).unwrap();
        assert_eq!(runner_label(&workflow.jobs["lint"]), "ubuntu-latest");
        assert_eq!(runner_label(&workflow.jobs["test"]), "self-hosted");
        assert_eq!(runner_label(&workflow.jobs["publish"]), "reusable-workflow");

        let group = parse(
            "x.yml",
            "jobs:\n  a:\n    runs-on: {group: large, labels: [linux]}\n    steps: [{run: make}]\n",
        )
        .unwrap();
        assert_eq!(group.jobs["a"].runs_on, vec!["large", "linux"]);
    }

    #[test]
    fn test_run_commands_drop_comments() {
        let workflow = parse("ci.yml", WORKFLOW).unwrap();
        let step = &workflow.jobs["test"].steps[1];
        assert_eq!(run_commands(step), vec!["npm ci", "npm test"]);
        assert!(step.continue_on_error);
    }

    #[test]
    fn test_matrix_size() {
        let workflow = parse("ci.yml", WORKFLOW).unwrap();
        let strategy = workflow.jobs["test"].strategy.as_ref().unwrap();
        assert_eq!(strategy.fail_fast, Some(false));
        assert_eq!(strategy.matrix_size(), Some(5));
    }

    #[test]
    fn test_docker_images() {
        let text = r#"
jobs:
  build:
    runs-on: ubuntu-latest
    container: {image: "golang:1.22"}
    steps:
      - run: docker pull redis:7
      - uses: docker://alpine:3.19
"#;
        let workflow = parse("x.yml", text).unwrap();
        let images = docker_images(&workflow);
        assert_eq!(images["golang:1.22"], vec!["build"]);
        assert_eq!(images["redis:7"], vec!["build"]);
        assert_eq!(images["alpine:3.19"], vec!["build"]);

        let full = docker_images(&parse("ci.yml", WORKFLOW).unwrap());
        assert_eq!(full["node:20"], vec!["test"]);
        assert_eq!(full["postgres:16"], vec!["test"]);
    }

    #[test]
    fn test_validate_empty_job() {
        let workflow = parse("x.yml", "jobs:\n  a:\n    runs-on: ubuntu-latest\n").unwrap();
        assert_eq!(
            validate(&workflow),
            Err(SchemaViolation::EmptyJob("a".to_string()))
        );
        let none = parse("x.yml", "name: empty\non: push\n").unwrap();
        assert_eq!(validate(&none), Err(SchemaViolation::NoJobs));
    }
}
