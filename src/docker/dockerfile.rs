//! Dockerfile parsing and single-file analysis

use crate::error::{DecodeError, SchemaViolation};
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::Duration;

const DEFAULT_ESCAPE: char = '\\';

const SECURITY_UPDATE_MARKERS: &[&str] = &[
    "apt-get upgrade",
    "apt upgrade",
    "apk upgrade",
    "yum upgrade",
    "yum update",
    "dnf upgrade",
];

const DEPENDENCY_INSTALL_MARKERS: &[&str] = &[
    "install",
    "pip ",
    "npm ",
    "yarn",
    "composer ",
    "go mod download",
    "bundle",
    "cargo fetch",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Instruction {
    /// Upper-cased instruction keyword
    pub verb: String,
    pub args: Vec<String>,
    /// Leading `--name[=value]` options, keyed without dashes
    pub flags: BTreeMap<String, String>,
    /// Arguments were given as a JSON array
    pub exec_form: bool,
    /// First physical line of the instruction, 1-based
    pub line: usize,
    /// Instruction text with continuations folded
    pub raw: String,
}

impl Instruction {
    fn is(&self, verb: &str) -> bool {
        self.verb == verb
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stage {
    pub index: usize,
    pub base_image: String,
    pub name: Option<String>,
    /// Instructions of the stage, starting with its `FROM`
    pub instructions: Vec<Instruction>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dockerfile {
    pub escape: char,
    /// Parser directives from the top of the file (`syntax`, `escape`, `check`)
    pub directives: BTreeMap<String, String>,
    /// Instructions before the first `FROM`
    pub global: Vec<Instruction>,
    pub stages: Vec<Stage>,
}

impl Default for Dockerfile {
    fn default() -> Self {
        Self {
            escape: DEFAULT_ESCAPE,
            directives: BTreeMap::new(),
            global: Vec::new(),
            stages: Vec::new(),
        }
    }
}

impl Dockerfile {
    pub fn is_multi_stage(&self) -> bool {
        self.stages.len() > 1
    }

    /// Every instruction in file order
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.global
            .iter()
            .chain(self.stages.iter().flat_map(|s| s.instructions.iter()))
    }
}

pub fn parse(path: &str, text: &str) -> Result<Dockerfile, DecodeError> {
    if text.contains('\0') {
        return Err(DecodeError::new(path, "binary content"));
    }

    let mut dockerfile = Dockerfile::default();
    let mut lines = text.lines().enumerate().peekable();

    // Parser directives are only honoured before anything else in the file
    while let Some((_, line)) = lines.peek() {
        match parse_directive(line) {
            Some((key, value)) => {
                if key == "escape" {
                    if let Some(c @ ('\\' | '`')) = value.chars().next() {
                        dockerfile.escape = c;
                    }
                }
                dockerfile.directives.entry(key).or_insert(value);
                lines.next();
            }
            None => break,
        }
    }

    let escape = dockerfile.escape;
    let mut pending: Option<(usize, String)> = None;
    let mut instructions = Vec::new();

    for (index, line) in lines {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let (body, continues) = match trimmed.strip_suffix(escape) {
            Some(body) => (body.trim_end(), true),
            None => (trimmed, false),
        };

        let (start, mut text) = pending.take().unwrap_or((index + 1, String::new()));
        if !text.is_empty() && !body.is_empty() {
            text.push(' ');
        }
        text.push_str(body);

        if continues {
            pending = Some((start, text));
        } else if let Some(instruction) = parse_instruction(&text, start) {
            instructions.push(instruction);
        }
    }
    if let Some((start, text)) = pending {
        if let Some(instruction) = parse_instruction(&text, start) {
            instructions.push(instruction);
        }
    }

    for instruction in instructions {
        if instruction.is("FROM") {
            dockerfile.stages.push(new_stage(dockerfile.stages.len(), instruction));
        } else if let Some(stage) = dockerfile.stages.last_mut() {
            stage.instructions.push(instruction);
        } else {
            dockerfile.global.push(instruction);
        }
    }

    Ok(dockerfile)
}

pub fn validate(dockerfile: &Dockerfile) -> Result<(), SchemaViolation> {
    if dockerfile.stages.is_empty() {
        return Err(SchemaViolation::NoBaseImage);
    }
    Ok(())
}

/// `# key=value` at the top of the file
fn parse_directive(line: &str) -> Option<(String, String)> {
    let rest = line.trim().strip_prefix('#')?;
    let (key, value) = rest.split_once('=')?;
    let key = key.trim().to_lowercase();
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some((key, value.trim().to_string()))
}

fn parse_instruction(text: &str, line: usize) -> Option<Instruction> {
    let text = text.trim();
    let (verb, rest) = match text.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim_start()),
        None => (text, ""),
    };
    if verb.is_empty() {
        return None;
    }

    let (flags, rest) = split_flags(rest);
    let (args, exec_form) = if verb.eq_ignore_ascii_case("HEALTHCHECK") {
        healthcheck_args(rest)
    } else {
        arguments(rest)
    };

    Some(Instruction {
        verb: verb.to_uppercase(),
        args,
        flags,
        exec_form,
        line,
        raw: text.to_string(),
    })
}

fn arguments(rest: &str) -> (Vec<String>, bool) {
    match exec_form_args(rest) {
        Some(args) => (args, true),
        None => (split_words(rest), false),
    }
}

/// `HEALTHCHECK [flags] CMD <command>` where the command may be exec form
fn healthcheck_args(rest: &str) -> (Vec<String>, bool) {
    let is_cmd = rest
        .get(..3)
        .map_or(false, |word| word.eq_ignore_ascii_case("cmd"))
        && rest[3..].starts_with(char::is_whitespace);
    if !is_cmd {
        return arguments(rest);
    }
    let (command, exec_form) = arguments(rest[3..].trim_start());
    let mut args = vec!["CMD".to_string()];
    args.extend(command);
    (args, exec_form)
}

/// Consumes leading `--flag[=value]` tokens
fn split_flags(mut rest: &str) -> (BTreeMap<String, String>, &str) {
    let mut flags = BTreeMap::new();
    while let Some(flag) = rest.strip_prefix("--") {
        let end = flag.find(char::is_whitespace).unwrap_or(flag.len());
        let token = &flag[..end];
        if token.is_empty() {
            break;
        }
        match token.split_once('=') {
            Some((name, value)) => flags.insert(name.to_string(), unquote(value)),
            None => flags.insert(token.to_string(), "true".to_string()),
        };
        rest = flag[end..].trim_start();
    }
    (flags, rest)
}

fn exec_form_args(rest: &str) -> Option<Vec<String>> {
    if !rest.starts_with('[') {
        return None;
    }
    serde_json::from_str::<Vec<String>>(rest).ok()
}

fn unquote(value: &str) -> String {
    let value = value.trim();
    for quote in ['"', '\''] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|v| v.strip_suffix(quote))
        {
            return inner.to_string();
        }
    }
    value.to_string()
}

/// Splits on whitespace outside single or double quotes, dropping the quotes
pub(crate) fn split_words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_word = false;

    for c in text.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '"' || c == '\'' => {
                quote = Some(c);
                in_word = true;
            }
            None if c.is_whitespace() => {
                if in_word {
                    words.push(std::mem::take(&mut current));
                    in_word = false;
                }
            }
            None => {
                current.push(c);
                in_word = true;
            }
        }
    }
    if in_word {
        words.push(current);
    }
    words
}

fn new_stage(index: usize, from: Instruction) -> Stage {
    let base_image = from.args.first().cloned().unwrap_or_default();
    let name = from
        .args
        .iter()
        .position(|a| a.eq_ignore_ascii_case("as"))
        .and_then(|i| from.args.get(i + 1))
        .cloned();
    Stage {
        index,
        base_image,
        name,
        instructions: vec![from],
    }
}

// --- analysis ---

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HealthCheck {
    pub command: Vec<String>,
    /// `HEALTHCHECK NONE` or compose `disable: true`
    pub disabled: bool,
    #[serde(serialize_with = "seconds")]
    pub interval: Option<Duration>,
    #[serde(serialize_with = "seconds")]
    pub timeout: Option<Duration>,
    #[serde(serialize_with = "seconds")]
    pub start_period: Option<Duration>,
    pub retries: Option<u32>,
}

fn seconds<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(d) => serializer.serialize_f64(d.as_secs_f64()),
        None => serializer.serialize_none(),
    }
}

/// Parses Go-style durations such as `30s`, `1m30s` or `500ms`
pub fn parse_duration(text: &str) -> Option<Duration> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let mut total = Duration::ZERO;
    let mut rest = text;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let value: f64 = rest[..digits].parse().ok()?;
        rest = &rest[digits..];
        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let scale = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            _ => return None,
        };
        rest = &rest[unit_len..];
        total += Duration::try_from_secs_f64(value * scale).ok()?;
    }
    Some(total)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SecurityScan {
    pub runs_as_root: bool,
    pub has_security_updates: bool,
    pub uses_latest_tags: bool,
    pub has_health_check: bool,
    pub caching_optimized: bool,
    pub multi_stage: bool,
    pub unpinned_images: Vec<String>,
    pub recommendations: Vec<String>,
    pub issues: Vec<String>,
}

impl SecurityScan {
    pub fn security_issue_count(&self) -> usize {
        [self.runs_as_root, self.uses_latest_tags, !self.has_health_check]
            .iter()
            .filter(|flag| **flag)
            .count()
    }

    pub fn optimization_issue_count(&self) -> usize {
        usize::from(!self.caching_optimized) + usize::from(!self.multi_stage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    pub index: usize,
    pub name: Option<String>,
    pub base_image: String,
    pub instruction_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DockerfileAnalysis {
    pub path: String,
    pub stages: Vec<StageSummary>,
    pub multi_stage: bool,
    pub base_images: Vec<String>,
    pub exposed_ports: Vec<String>,
    pub labels: BTreeMap<String, String>,
    pub args: BTreeMap<String, String>,
    pub env: BTreeMap<String, String>,
    pub workdir: Option<String>,
    /// Effective user of the final stage
    pub user: Option<String>,
    pub entrypoint: Vec<String>,
    pub cmd: Vec<String>,
    pub health_check: Option<HealthCheck>,
    pub volumes: Vec<String>,
    pub instruction_counts: BTreeMap<String, usize>,
    pub security: SecurityScan,
}

pub fn analyze(path: &str, dockerfile: &Dockerfile) -> DockerfileAnalysis {
    let mut analysis = DockerfileAnalysis {
        path: path.to_string(),
        multi_stage: dockerfile.is_multi_stage(),
        ..Default::default()
    };

    for stage in &dockerfile.stages {
        analysis.stages.push(StageSummary {
            index: stage.index,
            name: stage.name.clone(),
            base_image: stage.base_image.clone(),
            instruction_count: stage.instructions.len(),
        });
        if !stage.base_image.is_empty() && !analysis.base_images.contains(&stage.base_image) {
            analysis.base_images.push(stage.base_image.clone());
        }
    }

    for instruction in dockerfile.instructions() {
        *analysis
            .instruction_counts
            .entry(instruction.verb.clone())
            .or_insert(0) += 1;

        match instruction.verb.as_str() {
            "EXPOSE" => analysis.exposed_ports.extend(instruction.args.iter().cloned()),
            "LABEL" => analysis.labels.extend(key_values(&instruction.args)),
            "ARG" => {
                for arg in &instruction.args {
                    let (key, value) = arg.split_once('=').unwrap_or((arg.as_str(), ""));
                    analysis.args.insert(key.to_string(), value.to_string());
                }
            }
            "ENV" => analysis.env.extend(env_pairs(&instruction.args)),
            "WORKDIR" => analysis.workdir = instruction.args.first().cloned(),
            "ENTRYPOINT" => analysis.entrypoint = instruction.args.clone(),
            "CMD" => analysis.cmd = instruction.args.clone(),
            "HEALTHCHECK" => analysis.health_check = Some(health_check(instruction)),
            "VOLUME" => analysis.volumes.extend(instruction.args.iter().cloned()),
            _ => {}
        }
    }

    analysis.user = dockerfile.stages.last().and_then(|stage| {
        stage
            .instructions
            .iter()
            .filter(|i| i.is("USER"))
            .last()
            .and_then(|i| i.args.first().cloned())
    });

    analysis.security = security_scan(dockerfile, &analysis);
    analysis
}

fn key_values(args: &[String]) -> Vec<(String, String)> {
    args.iter()
        .filter_map(|arg| arg.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// `ENV K=V K2=V2`, or the legacy `ENV K some value`
fn env_pairs(args: &[String]) -> Vec<(String, String)> {
    match args.first() {
        Some(first) if !first.contains('=') => {
            vec![(first.clone(), args[1..].join(" "))]
        }
        _ => key_values(args),
    }
}

fn health_check(instruction: &Instruction) -> HealthCheck {
    let disabled = instruction
        .args
        .first()
        .map_or(false, |a| a.eq_ignore_ascii_case("none"));
    let mut command = instruction.args.clone();
    if command.first().map_or(false, |a| a.eq_ignore_ascii_case("cmd")) {
        command.remove(0);
    }
    let flag = |name: &str| instruction.flags.get(name).map(String::as_str);

    HealthCheck {
        command: if disabled { Vec::new() } else { command },
        disabled,
        interval: flag("interval").and_then(parse_duration),
        timeout: flag("timeout").and_then(parse_duration),
        start_period: flag("start-period").and_then(parse_duration),
        retries: flag("retries").and_then(|r| r.parse().ok()),
    }
}

/// `scratch`, earlier stage names and `$ARG` references are not registry images
fn is_unpinned(image: &str, stage_names: &[&str]) -> bool {
    if image == "scratch" || image.contains('$') || stage_names.contains(&image) {
        return false;
    }
    if image.contains('@') {
        return false;
    }
    let name = image.rsplit('/').next().unwrap_or(image);
    match name.split_once(':') {
        Some((_, tag)) => tag == "latest",
        None => true,
    }
}

fn is_source_copy(instruction: &Instruction) -> bool {
    if !(instruction.is("COPY") || instruction.is("ADD")) || instruction.flags.contains_key("from") {
        return false;
    }
    let sources = match instruction.args.split_last() {
        Some((_, sources)) => sources,
        None => return false,
    };
    sources
        .iter()
        .any(|s| matches!(s.as_str(), "." | "./" | "src" | "./src") || s.starts_with("src/"))
}

fn is_dependency_install(instruction: &Instruction) -> bool {
    let text = instruction.raw.to_lowercase();
    instruction.is("RUN") && DEPENDENCY_INSTALL_MARKERS.iter().any(|m| text.contains(m))
}

/// False when a stage copies its sources before installing dependencies
fn caching_optimized(dockerfile: &Dockerfile) -> bool {
    dockerfile.stages.iter().all(|stage| {
        let first_copy = stage.instructions.iter().position(is_source_copy);
        match first_copy {
            Some(copy) => !stage.instructions[copy..].iter().any(is_dependency_install),
            None => true,
        }
    })
}

fn security_scan(dockerfile: &Dockerfile, analysis: &DockerfileAnalysis) -> SecurityScan {
    let stage_names: Vec<&str> = dockerfile
        .stages
        .iter()
        .filter_map(|s| s.name.as_deref())
        .collect();
    let unpinned_images: Vec<String> = analysis
        .base_images
        .iter()
        .filter(|image| is_unpinned(image, &stage_names))
        .cloned()
        .collect();

    let mut scan = SecurityScan {
        runs_as_root: match analysis.user.as_deref() {
            None => true,
            Some(user) => {
                let name = user.split(':').next().unwrap_or(user);
                name == "root" || name == "0"
            }
        },
        has_security_updates: dockerfile.instructions().any(|i| {
            let text = i.raw.to_lowercase();
            i.is("RUN") && SECURITY_UPDATE_MARKERS.iter().any(|m| text.contains(m))
        }),
        uses_latest_tags: !unpinned_images.is_empty(),
        has_health_check: analysis.health_check.as_ref().map_or(false, |h| !h.disabled),
        caching_optimized: caching_optimized(dockerfile),
        multi_stage: analysis.multi_stage,
        unpinned_images,
        ..Default::default()
    };

    if scan.runs_as_root {
        scan.recommendations
            .push("Create and use a non-root user with USER instruction".to_string());
        scan.issues.push("Container runs as root user".to_string());
    }
    if scan.uses_latest_tags {
        scan.recommendations.push(
            "Pin base images to specific versions instead of using 'latest' tag".to_string(),
        );
        scan.issues.push("Uses 'latest' tag for base images".to_string());
    }
    if !scan.has_health_check {
        scan.recommendations
            .push("Add HEALTHCHECK instruction for container health monitoring".to_string());
        scan.issues.push("Missing health check configuration".to_string());
    }
    if dockerfile.stages.len() == 1 {
        scan.recommendations
            .push("Consider using multi-stage builds to reduce final image size".to_string());
    }
    if !scan.caching_optimized {
        scan.recommendations
            .push("Optimize layer caching by copying package files before source code".to_string());
        scan.issues.push("Layer caching not optimized".to_string());
    }

    scan
}
