use super::parser::is_builtin_step;
use super::types::*;
use crate::classify::{self, CommandClassification, PatternIndex, RiskLevel};
use crate::error::{ReferenceAnomaly, ReferenceKind};
use crate::graph::{DependencyGraph, GraphAnalysis};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CircleCiAnalysis {
    pub total_jobs: usize,
    pub total_workflows: usize,
    pub total_commands: usize,
    /// Workflow entries referencing each job
    pub job_usage: BTreeMap<String, usize>,
    /// Times each job is named in another entry's `requires`
    pub dependents: BTreeMap<String, usize>,
    pub job_dependencies: BTreeMap<String, Vec<String>>,
    pub command_patterns: PatternIndex,
    pub command_frequency: BTreeMap<String, usize>,
    /// Image or executor label to the jobs using it
    pub executor_usage: BTreeMap<String, Vec<String>>,
    pub docker_jobs: usize,
    pub other_executor_jobs: usize,
    pub reusable_commands: BTreeMap<String, ReusableCommandUsage>,
    pub jobs: BTreeMap<String, JobAnalysis>,
    pub workflows: BTreeMap<String, WorkflowAnalysis>,
    pub dangling_references: Vec<ReferenceAnomaly>,
    pub graph: GraphAnalysis,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReusableCommandUsage {
    pub description: Option<String>,
    pub parameters: Vec<String>,
    pub step_count: usize,
    pub usage: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobAnalysis {
    pub name: String,
    pub description: Option<String>,
    pub executor: String,
    pub step_count: usize,
    pub parallelism: Option<u32>,
    pub commands: Vec<CommandClassification>,
    pub dependencies: Vec<String>,
    pub workflows: Vec<String>,
    pub max_risk: RiskLevel,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowAnalysis {
    pub name: String,
    pub jobs: Vec<String>,
    pub has_dependencies: bool,
    pub contexts: Vec<String>,
    pub approval_gates: Vec<String>,
    pub scheduled: bool,
}

impl CircleCiAnalysis {
    /// Jobs ranked by workflow usage, highest first; equal counts in name order
    pub fn most_used_jobs(&self, limit: usize) -> Vec<(String, usize)> {
        let mut ranked: Vec<(String, usize)> = self
            .job_usage
            .iter()
            .map(|(name, count)| (name.clone(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }

    /// Tools behind the job commands, ranked like [`Self::most_used_jobs`]
    pub fn most_used_patterns(&self, limit: usize) -> Vec<(String, usize)> {
        self.command_patterns.most_used_tools(limit)
    }
}

pub fn analyze(config: &CircleCiConfig) -> CircleCiAnalysis {
    let mut analysis = CircleCiAnalysis {
        total_jobs: config.jobs.len(),
        total_workflows: config.workflows.len(),
        ..Default::default()
    };

    for name in config.jobs.keys() {
        analysis.job_usage.insert(name.clone(), 0);
    }

    analyze_workflow_references(config, &mut analysis);

    let mut all_commands: Vec<String> = Vec::new();
    for name in config.jobs.keys() {
        if let Some(job) = analyze_job(config, name) {
            for classification in &job.commands {
                analysis.command_patterns.record(name, classification);
                all_commands.push(classification.command.clone());
            }
            analysis.jobs.insert(name.clone(), job);
        }
    }
    analysis.total_commands = all_commands.len();
    analysis.command_frequency = classify::command_frequency(all_commands.iter().map(String::as_str));

    analyze_executors(config, &mut analysis);
    analyze_reusable_commands(config, &mut analysis);

    for name in config.workflows.keys() {
        if let Some(workflow) = analyze_workflow(config, name) {
            analysis.workflows.insert(name.clone(), workflow);
        }
    }

    let graph = DependencyGraph::from_dependencies(
        config.jobs.keys().map(String::as_str),
        &analysis.job_dependencies,
    );
    analysis.graph = graph.analyze();
    analysis.dangling_references.sort();

    analysis
}

fn is_orb_job(config: &CircleCiConfig, job: &str) -> bool {
    job.split_once('/')
        .map_or(false, |(orb, _)| config.orbs.contains_key(orb))
}

fn analyze_workflow_references(config: &CircleCiConfig, analysis: &mut CircleCiAnalysis) {
    let known_jobs: Vec<&str> = config.jobs.keys().map(String::as_str).collect();

    for (workflow_name, workflow) in &config.workflows {
        let entry_names: BTreeSet<&str> = workflow.jobs.iter().map(|j| j.reference_name()).collect();

        for entry in &workflow.jobs {
            *analysis.job_usage.entry(entry.job.clone()).or_insert(0) += 1;

            let defined = config.jobs.contains_key(&entry.job) || entry.approval;
            if !defined && !is_orb_job(config, &entry.job) {
                analysis.dangling_references.push(ReferenceAnomaly::new(
                    workflow_name,
                    &entry.job,
                    ReferenceKind::WorkflowJob,
                    known_jobs.iter().copied(),
                ));
            }

            if entry.requires.is_empty() {
                continue;
            }

            let deps = analysis
                .job_dependencies
                .entry(entry.reference_name().to_string())
                .or_default();
            for required in &entry.requires {
                if !deps.contains(required) {
                    deps.push(required.clone());
                }
                *analysis.dependents.entry(required.clone()).or_insert(0) += 1;

                if !entry_names.contains(required.as_str()) {
                    analysis.dangling_references.push(ReferenceAnomaly::new(
                        &format!("{}/{}", workflow_name, entry.reference_name()),
                        required,
                        ReferenceKind::Dependency,
                        entry_names.iter().copied(),
                    ));
                }
            }
        }
    }
}

fn analyze_executors(config: &CircleCiConfig, analysis: &mut CircleCiAnalysis) {
    for (job_name, job) in &config.jobs {
        let mut labels: Vec<String> = job.docker.iter().map(|d| d.image.clone()).collect();
        let mut uses_docker = !job.docker.is_empty();

        if let Some(executor_ref) = &job.executor {
            match config.executors.get(&executor_ref.name) {
                Some(executor) => {
                    for image in &executor.docker {
                        labels.push(format!("{} ({})", executor_ref.name, image.image));
                        uses_docker = true;
                    }
                    if executor.machine {
                        labels.push(format!("{} (machine)", executor_ref.name));
                    }
                    if executor.macos {
                        labels.push(format!("{} (macos)", executor_ref.name));
                    }
                }
                None => {
                    if !is_orb_job(config, &executor_ref.name) {
                        analysis.dangling_references.push(ReferenceAnomaly::new(
                            job_name,
                            &executor_ref.name,
                            ReferenceKind::Definition,
                            config.executors.keys().map(String::as_str),
                        ));
                    }
                    labels.push(executor_ref.name.clone());
                }
            }
        }
        if job.machine {
            labels.push("machine".to_string());
        }
        if job.macos {
            labels.push("macos".to_string());
        }

        if uses_docker {
            analysis.docker_jobs += 1;
        } else {
            analysis.other_executor_jobs += 1;
        }

        for label in labels {
            let jobs = analysis.executor_usage.entry(label).or_default();
            if !jobs.contains(job_name) {
                jobs.push(job_name.clone());
            }
        }
    }
}

fn analyze_reusable_commands(config: &CircleCiConfig, analysis: &mut CircleCiAnalysis) {
    for (name, command) in &config.commands {
        analysis.reusable_commands.insert(
            name.clone(),
            ReusableCommandUsage {
                description: command.description.clone(),
                parameters: command.parameters.keys().cloned().collect(),
                step_count: command.steps.len(),
                usage: 0,
            },
        );
    }

    let all_steps = config
        .jobs
        .values()
        .flat_map(|job| job.steps.iter())
        .chain(config.commands.values().flat_map(|c| c.steps.iter()));

    for step in all_steps {
        if let Step::Invoke { name, .. } = step {
            if let Some(usage) = analysis.reusable_commands.get_mut(name) {
                usage.usage += 1;
            }
        }
    }
}

/// Shell commands a job runs, including those of reusable commands it invokes
pub fn job_commands(config: &CircleCiConfig, job: &Job) -> Vec<String> {
    let mut commands = Vec::new();
    collect_step_commands(config, &job.steps, &mut commands, &mut BTreeSet::new());
    commands
}

fn collect_step_commands<'a>(
    config: &'a CircleCiConfig,
    steps: &'a [Step],
    commands: &mut Vec<String>,
    expanding: &mut BTreeSet<&'a str>,
) {
    for step in steps {
        match step {
            Step::Run(run) => commands.extend(classify::script_lines(&run.command)),
            Step::Invoke { name, .. } if is_builtin_step(name) => {}
            Step::Invoke { name, .. } => {
                if let Some(reusable) = config.commands.get(name) {
                    if expanding.insert(name.as_str()) {
                        collect_step_commands(config, &reusable.steps, commands, expanding);
                        expanding.remove(name.as_str());
                    }
                }
            }
        }
    }
}

fn executor_label(config: &CircleCiConfig, job: &Job) -> String {
    if let Some(image) = job.docker.first() {
        return image.image.clone();
    }
    if let Some(executor_ref) = &job.executor {
        return match config
            .executors
            .get(&executor_ref.name)
            .and_then(|e| e.docker.first())
        {
            Some(image) => format!("{} ({})", executor_ref.name, image.image),
            None => executor_ref.name.clone(),
        };
    }
    if job.macos {
        return "macos".to_string();
    }
    if job.machine {
        return "machine".to_string();
    }
    "unknown".to_string()
}

/// Detail view of one job
pub fn analyze_job(config: &CircleCiConfig, name: &str) -> Option<JobAnalysis> {
    let job = config.jobs.get(name)?;
    let commands: Vec<CommandClassification> = job_commands(config, job)
        .iter()
        .map(|c| classify::classify(c))
        .collect();

    let mut dependencies = Vec::new();
    let mut workflows = Vec::new();
    for (workflow_name, workflow) in &config.workflows {
        for entry in workflow.jobs.iter().filter(|e| e.job == name) {
            if !workflows.contains(workflow_name) {
                workflows.push(workflow_name.clone());
            }
            for required in &entry.requires {
                if !dependencies.contains(required) {
                    dependencies.push(required.clone());
                }
            }
        }
    }

    let max_risk = commands
        .iter()
        .map(|c| c.risk)
        .max()
        .unwrap_or(RiskLevel::Low);

    Some(JobAnalysis {
        name: name.to_string(),
        description: job.description.clone(),
        executor: executor_label(config, job),
        step_count: job.steps.len(),
        parallelism: job.parallelism,
        commands,
        dependencies,
        workflows,
        max_risk,
    })
}

/// Detail view of one workflow
pub fn analyze_workflow(config: &CircleCiConfig, name: &str) -> Option<WorkflowAnalysis> {
    let workflow = config.workflows.get(name)?;

    let mut contexts: Vec<String> = workflow
        .jobs
        .iter()
        .flat_map(|j| j.context.iter().cloned())
        .collect();
    contexts.sort();
    contexts.dedup();

    Some(WorkflowAnalysis {
        name: name.to_string(),
        jobs: workflow.jobs.iter().map(|j| j.reference_name().to_string()).collect(),
        has_dependencies: workflow.jobs.iter().any(|j| !j.requires.is_empty()),
        contexts,
        approval_gates: workflow
            .jobs
            .iter()
            .filter(|j| j.approval)
            .map(|j| j.reference_name().to_string())
            .collect(),
        scheduled: !workflow.triggers.is_empty(),
    })
}
