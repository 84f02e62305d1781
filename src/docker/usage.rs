//! Docker usage found in other tools' configurations

use regex::Regex;
use serde::Serialize;
use std::sync::OnceLock;

/// Flags of `docker run`/`docker create` that consume the next token
const RUN_VALUE_FLAGS: &[&str] = &[
    "-e",
    "--env",
    "--env-file",
    "-v",
    "--volume",
    "-p",
    "--publish",
    "--name",
    "-w",
    "--workdir",
    "-u",
    "--user",
    "--network",
    "--net",
    "--entrypoint",
    "--mount",
    "-l",
    "--label",
    "--platform",
    "-m",
    "--memory",
    "--restart",
    "-h",
    "--hostname",
    "--add-host",
    "--cpus",
    "--pull",
    "--shm-size",
    "--ulimit",
    "--cap-add",
    "--cap-drop",
    "--device",
    "--gpus",
    "--link",
    "--log-driver",
    "--log-opt",
];

/// Image names a shell command builds, runs or transfers
///
/// `docker build -t app .` yields `app`, `docker run --rm -e K=V redis:7 sh`
/// yields `redis:7`. Compound commands are split on `&&`, `||`, `;` and `|`.
pub fn images_in_command(command: &str) -> Vec<String> {
    let mut images = Vec::new();
    for segment in segments(command) {
        let words: Vec<&str> = segment.split_whitespace().collect();
        let Some(start) = words.iter().position(|w| *w == "docker") else {
            continue;
        };
        let Some((subcommand, rest)) = words[start + 1..].split_first() else {
            continue;
        };
        match *subcommand {
            "build" | "buildx" => images.extend(build_tags(rest)),
            "run" | "create" => images.extend(first_positional(rest, RUN_VALUE_FLAGS)),
            "pull" | "push" => images.extend(first_positional(rest, &["--platform"])),
            _ => {}
        }
    }
    images.dedup();
    images
}

fn segments(command: &str) -> impl Iterator<Item = &str> {
    static SEPARATORS: OnceLock<Regex> = OnceLock::new();
    SEPARATORS
        .get_or_init(|| Regex::new(r"&&|\|\||;|\||\n").expect("valid regex"))
        .split(command)
}

fn build_tags(words: &[&str]) -> Vec<String> {
    let mut tags = Vec::new();
    let mut iter = words.iter();
    while let Some(word) = iter.next() {
        if *word == "-t" || *word == "--tag" {
            if let Some(tag) = iter.next() {
                tags.push(tag.to_string());
            }
        } else if let Some(tag) = word
            .strip_prefix("--tag=")
            .or_else(|| word.strip_prefix("-t="))
        {
            tags.push(tag.to_string());
        }
    }
    tags
}

fn first_positional(words: &[&str], value_flags: &[&str]) -> Option<String> {
    let mut iter = words.iter();
    while let Some(word) = iter.next() {
        if word.starts_with('-') {
            if !word.contains('=') && value_flags.contains(word) {
                iter.next();
            }
            continue;
        }
        return Some(word.trim_matches(|c| c == '"' || c == '\'').to_string());
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DockerReferenceKind {
    DockerfilePath,
    ComposeCommand,
    DockerCommand,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DockerUsageReference {
    /// Tool whose configuration holds the reference, e.g. `circleci`
    pub tool: String,
    pub file: String,
    /// Job, step or task
    pub location: String,
    pub command: String,
    pub kind: DockerReferenceKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DockerUsage {
    pub dockerfile_references: Vec<DockerUsageReference>,
    pub compose_references: Vec<DockerUsageReference>,
    pub command_references: Vec<DockerUsageReference>,
    pub total_references: usize,
}

impl DockerUsage {
    /// Records docker build commands, compose commands and mentions of the
    /// known Dockerfile paths found in one configuration file
    pub fn scan(&mut self, tool: &str, location: &str, file: &str, text: &str, dockerfiles: &[String]) {
        static BUILD: OnceLock<Regex> = OnceLock::new();
        static COMPOSE: OnceLock<Regex> = OnceLock::new();
        let build = BUILD.get_or_init(|| Regex::new(r"docker\s+build\s+[^\n]*").expect("valid regex"));
        let compose = COMPOSE.get_or_init(|| {
            Regex::new(r"docker(?:-compose|\s+compose)\s+[^\n]*").expect("valid regex")
        });

        let reference = |command: &str, kind| DockerUsageReference {
            tool: tool.to_string(),
            file: file.to_string(),
            location: location.to_string(),
            command: command.trim().to_string(),
            kind,
        };

        for found in build.find_iter(text) {
            self.command_references
                .push(reference(found.as_str(), DockerReferenceKind::DockerCommand));
        }
        for found in compose.find_iter(text) {
            self.compose_references
                .push(reference(found.as_str(), DockerReferenceKind::ComposeCommand));
        }
        for dockerfile in dockerfiles {
            if text.contains(dockerfile.as_str()) {
                self.dockerfile_references
                    .push(reference(dockerfile, DockerReferenceKind::DockerfilePath));
            }
        }

        self.total_references = self.dockerfile_references.len()
            + self.compose_references.len()
            + self.command_references.len();
    }
}
