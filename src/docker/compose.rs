//! docker-compose parsing and analysis

use super::dockerfile::{parse_duration, HealthCheck};
use crate::error::{DecodeError, ReferenceAnomaly, ReferenceKind, SchemaViolation};
use crate::graph::{DependencyGraph, GraphAnalysis};
use crate::yaml::{self, YamlValue};
use serde::Serialize;
use std::collections::BTreeMap;

const DATABASE_NAME_MARKERS: &[&str] = &["db", "database"];
const DATABASE_IMAGE_MARKERS: &[&str] = &["postgres", "mysql", "mariadb", "mongo", "redis"];
const CACHE_NAME_MARKERS: &[&str] = &["cache", "redis"];
const CACHE_IMAGE_MARKERS: &[&str] = &["redis", "memcached"];
const WEB_NAME_MARKERS: &[&str] = &["web", "app", "api", "frontend", "backend"];

const MAX_COMPLEXITY_SCORE: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComposeFile {
    pub version: Option<String>,
    pub name: Option<String>,
    pub services: BTreeMap<String, Service>,
    pub networks: Vec<String>,
    pub volumes: Vec<String>,
    pub secrets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Service {
    pub image: Option<String>,
    pub build: Option<BuildConfig>,
    pub container_name: Option<String>,
    pub ports: Vec<String>,
    pub environment: BTreeMap<String, String>,
    pub volumes: Vec<String>,
    pub depends_on: Vec<String>,
    pub networks: Vec<String>,
    pub command: Vec<String>,
    pub health_check: Option<HealthCheck>,
    pub restart: Option<String>,
    pub resources: Option<ResourceLimits>,
    pub privileged: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BuildConfig {
    pub context: Option<String>,
    pub dockerfile: Option<String>,
    pub args: BTreeMap<String, String>,
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResourceLimits {
    pub cpu_limit: Option<String>,
    pub memory_limit: Option<String>,
    pub cpu_reservation: Option<String>,
    pub memory_reservation: Option<String>,
}

pub fn parse(path: &str, text: &str) -> Result<ComposeFile, DecodeError> {
    let root = yaml::decode(path, text)?;
    Ok(from_value(&root))
}

pub fn from_value(root: &YamlValue) -> ComposeFile {
    ComposeFile {
        version: root.get_string("version"),
        name: root.get_string("name"),
        services: root
            .get("services")
            .map(|services| {
                services
                    .entries()
                    .filter(|(_, s)| s.as_mapping().is_ok())
                    .map(|(name, s)| (name.clone(), parse_service(s)))
                    .collect()
            })
            .unwrap_or_default(),
        networks: root.get("networks").map(YamlValue::names).unwrap_or_default(),
        volumes: root.get("volumes").map(YamlValue::names).unwrap_or_default(),
        secrets: root.get("secrets").map(YamlValue::names).unwrap_or_default(),
    }
}

pub fn validate(compose: &ComposeFile) -> Result<(), SchemaViolation> {
    if compose.services.is_empty() {
        return Err(SchemaViolation::NoServices);
    }
    Ok(())
}

fn parse_service(value: &YamlValue) -> Service {
    Service {
        image: value.get_string("image"),
        build: value.get("build").map(|build| match build {
            YamlValue::Mapping(_) => BuildConfig {
                context: build.get_string("context"),
                dockerfile: build.get_string("dockerfile"),
                args: build.get_map("args"),
                target: build.get_string("target"),
            },
            other => BuildConfig {
                context: other.scalar_string().ok(),
                ..Default::default()
            },
        }),
        container_name: value.get_string("container_name"),
        ports: value
            .get("ports")
            .map(|ports| ports.one_or_many().iter().filter_map(port_mapping).collect())
            .unwrap_or_default(),
        environment: value.get_map("environment"),
        volumes: value
            .get("volumes")
            .map(|volumes| volumes.one_or_many().iter().filter_map(volume_mapping).collect())
            .unwrap_or_default(),
        depends_on: value.get("depends_on").map(YamlValue::names).unwrap_or_default(),
        networks: value.get("networks").map(YamlValue::names).unwrap_or_default(),
        command: value.get_list("command"),
        health_check: value.get("healthcheck").and_then(parse_health_check),
        restart: value.get_string("restart").or_else(|| {
            value
                .get("deploy")
                .and_then(|d| d.get("restart_policy"))
                .and_then(|p| p.get_string("condition"))
        }),
        resources: value
            .get("deploy")
            .and_then(|d| d.get("resources"))
            .and_then(parse_resources),
        privileged: value.get_bool("privileged").unwrap_or(false),
    }
}

/// Short syntax (`"8080:80"`, `80`) or long syntax (`{target, published}`)
fn port_mapping(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::Mapping(_) => {
            let target = value.get_string("target")?;
            Some(match value.get_string("published") {
                Some(published) => format!("{}:{}", published, target),
                None => target,
            })
        }
        other => other.scalar_string().ok(),
    }
}

fn volume_mapping(value: &YamlValue) -> Option<String> {
    match value {
        YamlValue::Mapping(_) => {
            let target = value.get_string("target")?;
            Some(match value.get_string("source") {
                Some(source) => format!("{}:{}", source, target),
                None => target,
            })
        }
        other => other.scalar_string().ok(),
    }
}

fn parse_health_check(value: &YamlValue) -> Option<HealthCheck> {
    value.as_mapping().ok()?;
    let duration = |key: &str| value.get_string(key).as_deref().and_then(parse_duration);
    Some(HealthCheck {
        command: value.get_list("test"),
        disabled: value.get_bool("disable").unwrap_or(false),
        interval: duration("interval"),
        timeout: duration("timeout"),
        start_period: duration("start_period"),
        retries: value.get_u32("retries"),
    })
}

fn parse_resources(value: &YamlValue) -> Option<ResourceLimits> {
    value.as_mapping().ok()?;
    let limits = value.get("limits");
    let reservations = value.get("reservations");
    Some(ResourceLimits {
        cpu_limit: limits.and_then(|l| l.get_string("cpus")),
        memory_limit: limits.and_then(|l| l.get_string("memory")),
        cpu_reservation: reservations.and_then(|r| r.get_string("cpus")),
        memory_reservation: reservations.and_then(|r| r.get_string("memory")),
    })
}

/// Host side of a port mapping; `None` when the port is not published
pub fn host_port(mapping: &str) -> Option<&str> {
    let mapping = mapping.split('/').next().unwrap_or(mapping);
    let parts: Vec<&str> = mapping.split(':').collect();
    match parts.len() {
        0 | 1 => None,
        n => Some(parts[n - 2]).filter(|p| !p.is_empty()),
    }
}

fn container_port(mapping: &str) -> &str {
    let mapping = mapping.split('/').next().unwrap_or(mapping);
    mapping.rsplit(':').next().unwrap_or(mapping)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComposeAnalysis {
    pub path: String,
    pub version: Option<String>,
    pub service_count: usize,
    pub database_services: Vec<String>,
    pub web_services: Vec<String>,
    pub cache_services: Vec<String>,
    pub service_dependencies: BTreeMap<String, Vec<String>>,
    pub port_conflicts: Vec<String>,
    pub security_issues: Vec<String>,
    pub performance_issues: Vec<String>,
    pub recommendations: Vec<String>,
    pub dangling_references: Vec<ReferenceAnomaly>,
    /// Startup ordering derived from `depends_on`
    pub graph: GraphAnalysis,
    pub complexity_score: usize,
}

/// Tags a service as database, cache and/or web by name and image substrings.
/// The tags are not exclusive.
pub fn categorize(name: &str, service: &Service) -> (bool, bool, bool) {
    let name = name.to_lowercase();
    let image = service.image.as_deref().unwrap_or_default().to_lowercase();
    let any = |haystack: &str, needles: &[&str]| needles.iter().any(|n| haystack.contains(n));

    let database = any(&name, DATABASE_NAME_MARKERS) || any(&image, DATABASE_IMAGE_MARKERS);
    let cache = any(&name, CACHE_NAME_MARKERS) || any(&image, CACHE_IMAGE_MARKERS);
    let web = any(&name, WEB_NAME_MARKERS) || !service.ports.is_empty();
    (database, cache, web)
}

pub fn analyze(path: &str, compose: &ComposeFile) -> ComposeAnalysis {
    let mut analysis = ComposeAnalysis {
        path: path.to_string(),
        version: compose.version.clone(),
        service_count: compose.services.len(),
        ..Default::default()
    };
    let known: Vec<&str> = compose.services.keys().map(String::as_str).collect();

    for (name, service) in &compose.services {
        let (database, cache, web) = categorize(name, service);
        if database {
            analysis.database_services.push(name.clone());
        }
        if cache {
            analysis.cache_services.push(name.clone());
        }
        if web {
            analysis.web_services.push(name.clone());
        }

        if !service.depends_on.is_empty() {
            analysis
                .service_dependencies
                .insert(name.clone(), service.depends_on.clone());
        }
        for dependency in &service.depends_on {
            if !compose.services.contains_key(dependency) {
                analysis.dangling_references.push(ReferenceAnomaly::new(
                    name,
                    dependency,
                    ReferenceKind::Service,
                    known.iter().copied(),
                ));
            }
        }

        check_security(name, service, &mut analysis);
        check_performance(name, service, &mut analysis);
    }

    analysis.port_conflicts = port_conflicts(compose);
    analysis.recommendations = recommendations(compose, &analysis);
    analysis.graph = DependencyGraph::from_dependencies(
        compose.services.keys().map(String::as_str),
        &analysis.service_dependencies,
    )
    .analyze();
    analysis.complexity_score = complexity_score(compose, &analysis);
    analysis
}

fn check_security(name: &str, service: &Service, analysis: &mut ComposeAnalysis) {
    for port in &service.ports {
        if host_port(port).is_none() {
            continue;
        }
        match container_port(port) {
            "22" => analysis
                .security_issues
                .push(format!("Service {} exposes SSH port (22)", name)),
            "3306" => analysis
                .security_issues
                .push(format!("Service {} exposes MySQL port directly", name)),
            "5432" => analysis
                .security_issues
                .push(format!("Service {} exposes PostgreSQL port directly", name)),
            _ => {}
        }
    }
    if service.privileged {
        analysis
            .security_issues
            .push(format!("Service {} runs in privileged mode", name));
    }
}

fn check_performance(name: &str, service: &Service, analysis: &mut ComposeAnalysis) {
    let has_health_check = service.health_check.as_ref().map_or(false, |h| !h.disabled);
    if !has_health_check && !service.ports.is_empty() {
        analysis
            .performance_issues
            .push(format!("Service {} is missing health check", name));
    }
    if service.resources.is_none() {
        analysis
            .performance_issues
            .push(format!("Service {} has no resource limits", name));
    }
    if service.restart.is_none() {
        analysis
            .performance_issues
            .push(format!("Service {} has no restart policy", name));
    }
}

/// Host ports published by more than one service
pub fn port_conflicts(compose: &ComposeFile) -> Vec<String> {
    let mut by_port: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, service) in &compose.services {
        for port in &service.ports {
            if let Some(host) = host_port(port) {
                let services = by_port.entry(host).or_default();
                if !services.contains(&name.as_str()) {
                    services.push(name);
                }
            }
        }
    }
    by_port
        .into_iter()
        .filter(|(_, services)| services.len() > 1)
        .map(|(port, services)| {
            format!("Port {} is used by services: {}", port, services.join(", "))
        })
        .collect()
}

fn recommendations(compose: &ComposeFile, analysis: &ComposeAnalysis) -> Vec<String> {
    let mut recommendations = Vec::new();
    if !analysis.security_issues.is_empty() {
        recommendations.push("Review and fix security issues identified in the analysis".to_string());
    }
    if !analysis.performance_issues.is_empty() {
        recommendations.push(
            "Add resource limits and health checks to improve performance monitoring".to_string(),
        );
    }
    if !analysis.port_conflicts.is_empty() {
        recommendations.push("Resolve port conflicts between services".to_string());
    }
    if compose.networks.is_empty() && compose.services.len() > 1 {
        recommendations.push("Consider defining custom networks for service isolation".to_string());
    }
    let uses_volumes = compose.services.values().any(|s| !s.volumes.is_empty());
    if compose.volumes.is_empty() && uses_volumes {
        recommendations.push("Consider using named volumes for better data management".to_string());
    }
    recommendations
}

fn complexity_score(compose: &ComposeFile, analysis: &ComposeAnalysis) -> usize {
    let score = compose.services.len() * 10
        + compose.networks.len() * 5
        + compose.volumes.len() * 5
        + analysis.service_dependencies.len() * 3
        + analysis.security_issues.len() * 5
        + analysis.performance_issues.len() * 2
        + analysis.port_conflicts.len() * 3;
    score.min(MAX_COMPLEXITY_SCORE)
}
