//! Dockerfile and docker-compose analysis
//!
//! Dockerfiles are parsed line by line (not YAML), compose files through the
//! generic YAML decoder. [`summarize`] folds the per-file results into one
//! score, and [`DockerUsage`] records where other tools invoke docker.

mod compose;
mod dockerfile;
mod summary;
mod usage;

pub use compose::{
    analyze as analyze_compose, categorize, host_port, parse as parse_compose, port_conflicts, validate as validate_compose, BuildConfig,
    ComposeAnalysis, ComposeFile, ResourceLimits, Service,
};
pub use dockerfile::{
    analyze as analyze_dockerfile, parse as parse_dockerfile, parse_duration,
    validate as validate_dockerfile, Dockerfile, DockerfileAnalysis, HealthCheck, Instruction,
    SecurityScan, Stage, StageSummary,
};
pub use summary::{summarize, DockerSummary};
pub use usage::{images_in_command, DockerReferenceKind, DockerUsage, DockerUsageReference};

/// File names recognised as Dockerfiles
pub fn is_dockerfile_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower == "dockerfile"
        || lower == "containerfile"
        || lower.starts_with("dockerfile.")
        || lower.ends_with(".dockerfile")
}

/// File names recognised as compose files
pub fn is_compose_name(name: &str) -> bool {
    matches!(
        name,
        "docker-compose.yml" | "docker-compose.yaml" | "compose.yml" | "compose.yaml"
    ) || (name.starts_with("docker-compose.")
        && (name.ends_with(".yml") || name.ends_with(".yaml")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names() {
        assert!(is_dockerfile_name("Dockerfile"));
        assert!(is_dockerfile_name("Dockerfile.prod"));
        assert!(is_dockerfile_name("api.dockerfile"));
        assert!(!is_dockerfile_name("Dockerfile-notes.md"));

        assert!(is_compose_name("docker-compose.yml"));
        assert!(is_compose_name("docker-compose.override.yaml"));
        assert!(is_compose_name("compose.yaml"));
        assert!(!is_compose_name("compose.json"));
    }
}
