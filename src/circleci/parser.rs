use super::types::*;
use crate::error::{DecodeError, SchemaViolation};
use crate::yaml::{self, YamlValue};
use std::collections::BTreeMap;

/// Step names that never carry a shell command
const BUILTIN_STEPS: &[&str] = &["checkout", "setup_remote_docker"];

pub fn parse(path: &str, text: &str) -> Result<CircleCiConfig, DecodeError> {
    let root = yaml::decode(path, text)?;
    Ok(from_value(&root))
}

/// Builds the model from an already decoded tree; never fails
pub fn from_value(root: &YamlValue) -> CircleCiConfig {
    CircleCiConfig {
        version: root.get_string("version"),
        jobs: root
            .get("jobs")
            .map(|jobs| {
                jobs.entries()
                    .map(|(name, job)| (name.clone(), parse_job(job)))
                    .collect()
            })
            .unwrap_or_default(),
        workflows: root.get("workflows").map(parse_workflows).unwrap_or_default(),
        executors: root
            .get("executors")
            .map(|executors| {
                executors
                    .entries()
                    .map(|(name, e)| (name.clone(), parse_executor(e)))
                    .collect()
            })
            .unwrap_or_default(),
        commands: root
            .get("commands")
            .map(|commands| {
                commands
                    .entries()
                    .map(|(name, c)| (name.clone(), parse_command(c)))
                    .collect()
            })
            .unwrap_or_default(),
        orbs: root
            .get("orbs")
            .map(|orbs| {
                orbs.entries()
                    .map(|(alias, orb)| {
                        let reference = orb
                            .scalar_string()
                            .unwrap_or_else(|_| "inline".to_string());
                        (alias.clone(), reference)
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Reports the first structural problem of a parsed config
pub fn validate(config: &CircleCiConfig) -> Result<(), SchemaViolation> {
    if config
        .version
        .as_deref()
        .map_or(true, |v| v.trim().is_empty())
    {
        return Err(SchemaViolation::MissingVersion);
    }
    if config.jobs.is_empty() {
        return Err(SchemaViolation::NoJobs);
    }
    Ok(())
}

/// Present and not explicitly disabled (`machine: true`, `machine: {image: ...}`)
fn flag_section(value: Option<&YamlValue>) -> bool {
    match value {
        None | Some(YamlValue::Null) => false,
        Some(YamlValue::Bool(enabled)) => *enabled,
        Some(_) => true,
    }
}

fn parse_job(value: &YamlValue) -> Job {
    Job {
        description: value.get_string("description"),
        docker: value.get("docker").map(parse_docker_images).unwrap_or_default(),
        machine: flag_section(value.get("machine")),
        macos: flag_section(value.get("macos")),
        executor: value.get("executor").and_then(parse_executor_ref),
        steps: value.get("steps").map(parse_steps).unwrap_or_default(),
        environment: value.get_map("environment"),
        working_directory: value.get_string("working_directory"),
        parallelism: value.get_u32("parallelism"),
        resource_class: value.get_string("resource_class"),
    }
}

fn parse_docker_images(value: &YamlValue) -> Vec<DockerImage> {
    value
        .items()
        .iter()
        .filter_map(|item| {
            let image = item.get_string("image")?;
            Some(DockerImage {
                image,
                name: item.get_string("name"),
                entrypoint: item.get_list("entrypoint"),
                command: item.get_list("command"),
                user: item.get_string("user"),
                environment: item.get_map("environment"),
                has_auth: item.get("auth").is_some() || item.get("aws_auth").is_some(),
            })
        })
        .collect()
}

fn parse_executor_ref(value: &YamlValue) -> Option<ExecutorRef> {
    match value {
        YamlValue::Mapping(map) => {
            let name = value.get_string("name")?;
            let parameters = map
                .iter()
                .filter(|(k, _)| k.as_str() != "name")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Some(ExecutorRef { name, parameters })
        }
        other => other.scalar_string().ok().map(|name| ExecutorRef {
            name,
            parameters: BTreeMap::new(),
        }),
    }
}

fn parse_executor(value: &YamlValue) -> Executor {
    Executor {
        docker: value.get("docker").map(parse_docker_images).unwrap_or_default(),
        machine: flag_section(value.get("machine")),
        macos: flag_section(value.get("macos")),
        environment: value.get_map("environment"),
        working_directory: value.get_string("working_directory"),
        resource_class: value.get_string("resource_class"),
    }
}

fn parse_command(value: &YamlValue) -> ReusableCommand {
    ReusableCommand {
        description: value.get_string("description"),
        parameters: value
            .get("parameters")
            .map(|params| {
                params
                    .entries()
                    .map(|(name, p)| {
                        (
                            name.clone(),
                            CommandParameter {
                                param_type: p.get_string("type"),
                                description: p.get_string("description"),
                                default: p.get("default").cloned(),
                            },
                        )
                    })
                    .collect()
            })
            .unwrap_or_default(),
        steps: value.get("steps").map(parse_steps).unwrap_or_default(),
    }
}

pub(crate) fn parse_steps(value: &YamlValue) -> Vec<Step> {
    value.items().iter().filter_map(parse_step).collect()
}

fn parse_step(value: &YamlValue) -> Option<Step> {
    match value {
        YamlValue::String(name) => Some(Step::Invoke {
            name: name.clone(),
            parameters: BTreeMap::new(),
        }),
        YamlValue::Mapping(map) => {
            if let Some(run) = map.get("run") {
                if let Some(step) = parse_run(run) {
                    return Some(Step::Run(step));
                }
            }
            let (name, body) = map.iter().next()?;
            Some(Step::Invoke {
                name: name.clone(),
                parameters: body
                    .entries()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            })
        }
        _ => None,
    }
}

/// `run` is either the command string or an object with a `command` key
fn parse_run(value: &YamlValue) -> Option<RunStep> {
    if let Ok(command) = value.as_str() {
        return Some(RunStep {
            command: command.to_string(),
            ..Default::default()
        });
    }
    let command = value.get_string("command")?;
    Some(RunStep {
        name: value.get_string("name"),
        command,
        shell: value.get_string("shell"),
        working_directory: value.get_string("working_directory"),
        environment: value.get_map("environment"),
        background: value.get_bool("background").unwrap_or(false),
        when: value.get_string("when"),
    })
}

fn parse_workflows(value: &YamlValue) -> BTreeMap<String, Workflow> {
    value
        .entries()
        // CircleCI 2.0 nests a `version: 2` scalar next to the workflows
        .filter(|(_, workflow)| workflow.as_mapping().is_ok())
        .map(|(name, workflow)| {
            let jobs = workflow
                .get("jobs")
                .map(|jobs| jobs.items().iter().filter_map(parse_workflow_job).collect())
                .unwrap_or_default();
            let triggers = workflow
                .get("triggers")
                .map(|t| t.items().to_vec())
                .unwrap_or_default();
            (name.clone(), Workflow { jobs, triggers })
        })
        .collect()
}

fn parse_workflow_job(value: &YamlValue) -> Option<WorkflowJob> {
    match value {
        YamlValue::String(job) => Some(WorkflowJob {
            job: job.clone(),
            ..Default::default()
        }),
        YamlValue::Mapping(map) => {
            let (job, body) = map.iter().next()?;
            Some(WorkflowJob {
                job: job.clone(),
                alias: body.get_string("name"),
                requires: body.get_list("requires"),
                context: body.get_list("context"),
                filters: body.get("filters").cloned(),
                approval: body.get_string("type").as_deref() == Some("approval"),
            })
        }
        _ => None,
    }
}

/// Whether a step is a shell command rather than a built-in directive
pub fn is_builtin_step(name: &str) -> bool {
    BUILTIN_STEPS.contains(&name)
}
