use super::{Category, CommandClassification};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// How often a category or tool appears, and which jobs/tasks use it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatternUsage {
    pub count: usize,
    pub owners: BTreeSet<String>,
}

/// Accumulates classifications per category and per tool
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatternIndex {
    pub by_category: BTreeMap<Category, PatternUsage>,
    pub by_tool: BTreeMap<String, PatternUsage>,
}

impl PatternIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one classified command issued by `owner` (a job or task name)
    pub fn record(&mut self, owner: &str, classification: &CommandClassification) {
        let usage = self.by_category.entry(classification.category).or_default();
        usage.count += 1;
        usage.owners.insert(owner.to_string());

        for tool in &classification.tools {
            let usage = self.by_tool.entry(tool.clone()).or_default();
            usage.count += 1;
            usage.owners.insert(owner.to_string());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.by_category.is_empty()
    }

    /// Tools ranked by descending count; equal counts keep name order
    pub fn most_used_tools(&self, limit: usize) -> Vec<(String, usize)> {
        let mut ranked: Vec<(String, usize)> = self
            .by_tool
            .iter()
            .map(|(tool, usage)| (tool.clone(), usage.count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }
}

/// Counts the leading program of each command
///
/// A leading `sudo` and `KEY=value` environment assignments are skipped, as
/// are fragments that start with a shell operator.
pub fn command_frequency<'a, I>(commands: I) -> BTreeMap<String, usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut frequency = BTreeMap::new();
    for command in commands {
        let program = command
            .split_whitespace()
            .find(|word| *word != "sudo" && !is_env_assignment(word));
        match program {
            Some(word) if !matches!(word, "&&" | "||" | "|" | ";") => {
                *frequency.entry(word.to_string()).or_insert(0) += 1;
            }
            _ => {}
        }
    }
    frequency
}

fn is_env_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

const ECOSYSTEM_MARKERS: &[(&str, &[&str])] = &[
    ("docker", &["docker ", "docker-compose", "dockerfile"]),
    ("go", &["go ", "go.mod", "gofmt", "golangci"]),
    ("java", &["mvn ", "mvnw", "gradle", "java "]),
    ("kubernetes", &["kubectl ", "helm ", "kustomize"]),
    ("nodejs", &["npm ", "yarn ", "node ", "npx ", "pnpm "]),
    ("php", &["php ", "composer ", "phpunit", "artisan"]),
    ("python", &["python", "pip ", "pytest", "poetry "]),
    ("rust", &["cargo ", "rustc", "rustup"]),
];

/// The ecosystem with the most marker hits across all commands, or `shell`
///
/// Ties resolve to the alphabetically first ecosystem.
pub fn detect_ecosystem<'a, I>(commands: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let lowered: Vec<String> = commands.into_iter().map(str::to_lowercase).collect();

    let mut best = ("shell", 0usize);
    for (ecosystem, markers) in ECOSYSTEM_MARKERS {
        let score = lowered
            .iter()
            .map(|cmd| markers.iter().filter(|m| cmd.contains(*m)).count())
            .sum::<usize>();
        if score > best.1 {
            best = (*ecosystem, score);
        }
    }
    best.0.to_string()
}
