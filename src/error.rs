//! Error taxonomy shared by every format parser
//!
//! Decode and schema errors are fatal to a single file only. Structural
//! anomalies (cycles, dangling references) are not errors at all: they are
//! reported inside the analysis results.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Malformed input bytes: the decoder could not produce a value tree
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to decode {path}: {message}")]
pub struct DecodeError {
    pub path: String,
    pub message: String,
}

impl DecodeError {
    pub fn new(path: impl Into<String>, error: impl fmt::Display) -> Self {
        Self {
            path: path.into(),
            message: error.to_string(),
        }
    }
}

/// The first structural invariant a decoded configuration violates
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SchemaViolation {
    #[error("missing version field")]
    MissingVersion,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),

    #[error("no jobs defined")]
    NoJobs,

    #[error("no tasks defined")]
    NoTasks,

    #[error("job '{0}' has neither steps nor a reusable workflow")]
    EmptyJob(String),

    #[error("no FROM instruction found")]
    NoBaseImage,

    #[error("no services defined")]
    NoServices,
}

/// What kind of reference could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    /// A workflow entry naming a job that is not defined
    WorkflowJob,
    /// A `requires`, `needs` or `deps` entry naming an unknown job or task
    Dependency,
    /// A compose `depends_on` entry naming an unknown service
    Service,
    /// A reusable command or executor that is not defined
    Definition,
}

/// A dangling reference, reported in analysis output rather than raised
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ReferenceAnomaly {
    /// Where the reference was found, e.g. a workflow or job name
    pub source: String,
    pub reference: String,
    pub kind: ReferenceKind,
    /// Closest known name, when one is similar enough
    pub suggestion: Option<String>,
}

impl ReferenceAnomaly {
    pub fn new<'a, I>(source: &str, reference: &str, kind: ReferenceKind, known: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        Self {
            source: source.to_string(),
            reference: reference.to_string(),
            kind,
            suggestion: closest_match(reference, known),
        }
    }
}

impl fmt::Display for ReferenceAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} references unknown '{}'", self.source, self.reference)?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " (did you mean '{}'?)", suggestion)?;
        }
        Ok(())
    }
}

/// Partial recovery: the strict decoder rejected the file, a permissive pass
/// salvaged it and these fields were dropped
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    pub strict_error: String,
    /// Dotted paths of the fields that could not be typed, e.g. `tasks.build.deps`
    pub dropped: Vec<String>,
}

impl fmt::Display for RecoveryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recovered from: {}", self.strict_error)?;
        if !self.dropped.is_empty() {
            write!(f, " (dropped: {})", self.dropped.join(", "))?;
        }
        Ok(())
    }
}

/// A successful parse, possibly annotated with a recovery warning
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOutcome<T> {
    pub config: T,
    pub recovery: Option<RecoveryReport>,
}

impl<T> ParseOutcome<T> {
    pub fn clean(config: T) -> Self {
        Self {
            config,
            recovery: None,
        }
    }

    pub fn is_recovered(&self) -> bool {
        self.recovery.is_some()
    }
}

const SUGGESTION_THRESHOLD: f64 = 0.8;

fn closest_match<'a, I>(name: &str, known: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(&str, f64)> = None;
    for candidate in known {
        let score = strsim::jaro_winkler(name, candidate);
        if score >= SUGGESTION_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((candidate, score));
        }
    }
    best.map(|(candidate, _)| candidate.to_string())
}
