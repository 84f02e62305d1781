//! Cross-file Docker summary and overall score

use super::compose::ComposeAnalysis;
use super::dockerfile::DockerfileAnalysis;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

const TOP_INSTRUCTIONS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DockerSummary {
    pub total_dockerfiles: usize,
    pub multi_stage_builds: usize,
    pub security_issues: usize,
    pub optimization_issues: usize,
    pub has_compose: bool,
    pub total_compose_files: usize,
    pub service_count: usize,
    pub unique_base_images: Vec<String>,
    pub most_common_instructions: Vec<String>,
    pub recommendations: Vec<String>,
    /// 0 to 100, higher is better
    pub overall_score: u32,
}

pub fn summarize(dockerfiles: &[DockerfileAnalysis], compose: &[ComposeAnalysis]) -> DockerSummary {
    let mut summary = DockerSummary {
        total_dockerfiles: dockerfiles.len(),
        has_compose: !compose.is_empty(),
        total_compose_files: compose.len(),
        service_count: compose.iter().map(|c| c.service_count).sum(),
        ..Default::default()
    };

    let mut base_images = BTreeSet::new();
    let mut instructions: BTreeMap<&str, usize> = BTreeMap::new();
    for dockerfile in dockerfiles {
        if dockerfile.multi_stage {
            summary.multi_stage_builds += 1;
        }
        base_images.extend(dockerfile.base_images.iter().cloned());
        for (verb, count) in &dockerfile.instruction_counts {
            *instructions.entry(verb.as_str()).or_default() += count;
        }
        summary.security_issues += dockerfile.security.security_issue_count();
        summary.optimization_issues += dockerfile.security.optimization_issue_count();
    }
    summary.unique_base_images = base_images.into_iter().collect();
    summary.most_common_instructions = most_common(instructions, TOP_INSTRUCTIONS);

    let has_unpinned = dockerfiles
        .iter()
        .any(|d| !d.security.unpinned_images.is_empty());
    summary.recommendations = recommendations(&summary, has_unpinned);
    summary.overall_score = overall_score(&summary);
    summary
}

fn most_common(counts: BTreeMap<&str, usize>, limit: usize) -> Vec<String> {
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(verb, _)| verb.to_string())
        .collect()
}

fn recommendations(summary: &DockerSummary, has_unpinned: bool) -> Vec<String> {
    let mut recommendations = Vec::new();
    if summary.security_issues > 0 {
        recommendations.push("Address security issues found in Dockerfiles".to_string());
    }
    if summary.optimization_issues > 0 {
        recommendations.push("Optimize Dockerfiles for better performance and caching".to_string());
    }
    if summary.multi_stage_builds == 0 && summary.total_dockerfiles > 0 {
        recommendations.push("Consider using multi-stage builds to reduce image sizes".to_string());
    }
    if !summary.has_compose && summary.total_dockerfiles > 1 {
        recommendations.push(
            "Consider adding docker-compose.yml for easier multi-container management".to_string(),
        );
    }
    if has_unpinned {
        recommendations
            .push("Pin base images to specific versions for better reproducibility".to_string());
    }
    recommendations
}

fn overall_score(summary: &DockerSummary) -> u32 {
    let mut score = 100i64;
    score -= summary.security_issues as i64 * 10;
    score -= summary.optimization_issues as i64 * 5;
    if summary.multi_stage_builds > 0 {
        score += 10;
    }
    if summary.has_compose {
        score += 15;
    }
    score.clamp(0, 100) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docker::{analyze_compose, analyze_dockerfile, parse_compose, parse_dockerfile};

    fn dockerfile(path: &str, text: &str) -> DockerfileAnalysis {
        analyze_dockerfile(path, &parse_dockerfile(path, text).unwrap())
    }

    const HARDENED: &str = "\
FROM golang:1.22 AS build
WORKDIR /src
COPY go.mod go.sum ./
RUN go mod download
COPY . .
RUN go build -o /app

FROM gcr.io/distroless/static:nonroot
COPY --from=build /app /app
USER nonroot
HEALTHCHECK CMD [\"/app\", \"health\"]
ENTRYPOINT [\"/app\"]
";

    #[test]
    fn test_empty_summary() {
        let summary = summarize(&[], &[]);
        assert_eq!(summary.total_dockerfiles, 0);
        assert!(summary.recommendations.is_empty());
        assert_eq!(summary.overall_score, 100);
    }

    #[test]
    fn test_hardened_multi_stage() {
        let summary = summarize(&[dockerfile("Dockerfile", HARDENED)], &[]);
        assert_eq!(summary.multi_stage_builds, 1);
        assert_eq!(summary.security_issues, 0);
        assert_eq!(summary.optimization_issues, 0);
        assert_eq!(
            summary.unique_base_images,
            vec!["gcr.io/distroless/static:nonroot", "golang:1.22"]
        );
        assert_eq!(summary.overall_score, 100);
        assert!(summary.recommendations.is_empty());
    }

    #[test]
    fn test_naive_dockerfiles_lower_the_score() {
        let naive = "FROM node\nCOPY . .\nRUN npm install\nCMD [\"node\", \"index.js\"]\n";
        let summary = summarize(
            &[dockerfile("a/Dockerfile", naive), dockerfile("b/Dockerfile", naive)],
            &[],
        );
        // root + latest + no healthcheck, twice
        assert_eq!(summary.security_issues, 6);
        // cache-busting copy + single stage, twice
        assert_eq!(summary.optimization_issues, 4);
        assert_eq!(summary.overall_score, 0);
        assert_eq!(
            summary.recommendations,
            vec![
                "Address security issues found in Dockerfiles",
                "Optimize Dockerfiles for better performance and caching",
                "Consider using multi-stage builds to reduce image sizes",
                "Consider adding docker-compose.yml for easier multi-container management",
                "Pin base images to specific versions for better reproducibility",
            ]
        );
        assert_eq!(summary.most_common_instructions[0], "CMD");
    }

    #[test]
    fn test_compose_bonus() {
        let compose = parse_compose("docker-compose.yml", "services:\n  app:\n    image: app:1\n")
            .unwrap();
        let summary = summarize(
            &[dockerfile("Dockerfile", HARDENED)],
            &[analyze_compose("docker-compose.yml", &compose)],
        );
        assert!(summary.has_compose);
        assert_eq!(summary.service_count, 1);
        assert_eq!(summary.overall_score, 100);
    }

    #[test]
    fn test_most_common_ties_by_name() {
        let counts = BTreeMap::from([("RUN", 3), ("COPY", 3), ("FROM", 1)]);
        assert_eq!(most_common(counts, 2), vec!["COPY", "RUN"]);
    }
}
