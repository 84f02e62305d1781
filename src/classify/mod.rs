//! Shell command classification shared by every format analyzer
//!
//! [`classify`] maps a raw shell command to a category, the tools it invokes,
//! a structural complexity score, a risk level and static improvement
//! suggestions. Classification is pure and deterministic.

mod index;
mod patterns;
mod risk;

pub use index::{command_frequency, detect_ecosystem, PatternIndex, PatternUsage};
pub use patterns::{find_match, pattern_by_name, patterns, patterns_by_category, CommandPattern};
pub use risk::{assess_risk, complexity, RiskLevel};

use serde::Serialize;
use std::fmt;

/// Complexity above which a command gets a "break it up" suggestion
pub const COMPLEXITY_THRESHOLD: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Build,
    Testing,
    Containerization,
    PackageManagement,
    Network,
    Deployment,
    Infrastructure,
    CodeQuality,
    Framework,
    Database,
    VersionControl,
    Runtime,
    FileTransfer,
    Script,
    Documentation,
    Development,
    Packaging,
    TaskRunner,
    Utility,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Build => "build",
            Category::Testing => "testing",
            Category::Containerization => "containerization",
            Category::PackageManagement => "package-management",
            Category::Network => "network",
            Category::Deployment => "deployment",
            Category::Infrastructure => "infrastructure",
            Category::CodeQuality => "code-quality",
            Category::Framework => "framework",
            Category::Database => "database",
            Category::VersionControl => "version-control",
            Category::Runtime => "runtime",
            Category::FileTransfer => "file-transfer",
            Category::Script => "script",
            Category::Documentation => "documentation",
            Category::Development => "development",
            Category::Packaging => "packaging",
            Category::TaskRunner => "task-runner",
            Category::Utility => "utility",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandClassification {
    pub command: String,
    /// Name of the matched table entry, absent for the utility fallback
    pub pattern: Option<String>,
    pub category: Category,
    pub tools: Vec<String>,
    pub complexity: u32,
    pub risk: RiskLevel,
    pub suggestions: Vec<String>,
}

/// Classifies one shell command
pub fn classify(command: &str) -> CommandClassification {
    let lowercased = command.to_lowercase();

    let (pattern, category, tools) = match find_match(&lowercased) {
        Some(p) => (
            Some(p.name.to_string()),
            p.category,
            p.tools.iter().map(|t| t.to_string()).collect(),
        ),
        None => (None, Category::Utility, vec!["shell".to_string()]),
    };

    let complexity = complexity(command);
    let risk = assess_risk(&lowercased);
    let suggestions = suggestions(&lowercased, category, complexity, risk);

    CommandClassification {
        command: command.to_string(),
        pattern,
        category,
        tools,
        complexity,
        risk,
        suggestions,
    }
}

/// Splits a multi-line script into individual commands
///
/// Lines ending in a backslash are joined with the next one; blank lines and
/// `#` comments are dropped.
pub fn script_lines(script: &str) -> Vec<String> {
    let mut commands = Vec::new();
    let mut pending = String::new();

    for line in script.lines() {
        let line = line.trim();
        if pending.is_empty() && (line.is_empty() || line.starts_with('#')) {
            continue;
        }
        match line.strip_suffix('\\') {
            Some(head) => {
                pending.push_str(head.trim_end());
                pending.push(' ');
            }
            None => {
                pending.push_str(line);
                commands.push(pending.trim().to_string());
                pending.clear();
            }
        }
    }
    if !pending.trim().is_empty() {
        commands.push(pending.trim().to_string());
    }
    commands
}

fn suggestions(cmd: &str, category: Category, complexity: u32, risk: RiskLevel) -> Vec<String> {
    let mut out: Vec<&str> = Vec::new();

    match category {
        Category::Containerization => {
            if cmd.contains("docker run") && !cmd.contains("--rm") {
                out.push("Consider adding --rm flag to automatically remove containers");
            }
            if cmd.contains("latest") {
                out.push("Avoid using 'latest' tag, specify explicit version");
            }
        }
        Category::Build => {
            if cmd.contains("go build") && !cmd.contains("-ldflags") {
                out.push("Consider using -ldflags to inject version information");
            }
        }
        Category::PackageManagement => {
            if cmd.contains("npm install") {
                out.push("Use 'npm ci' for faster, reliable builds in CI environments");
            }
            if cmd.contains("composer install") {
                if !cmd.contains("--no-dev") {
                    out.push("Consider using --no-dev flag for production builds");
                }
                if !cmd.contains("--optimize-autoloader") && !cmd.contains(" -o") {
                    out.push("Consider using --optimize-autoloader for better performance");
                }
            }
        }
        Category::Network => {
            if cmd.contains("curl") && !has_curl_fail_flag(cmd) {
                out.push("Consider using --fail flag to exit on HTTP errors");
            }
        }
        Category::Testing => {
            if cmd.contains("phpunit") && !cmd.contains("--coverage") {
                out.push("Consider adding code coverage reporting");
            }
            if cmd.contains("pest") && !cmd.contains("--parallel") {
                out.push("Consider using --parallel flag for faster test execution");
            }
            if cmd.contains("pytest") && !cmd.contains("--cov") {
                out.push("Consider adding code coverage reporting");
            }
        }
        Category::CodeQuality => {
            if cmd.contains("phpcs") && !cmd.contains("--standard") {
                out.push("Specify a coding standard with the --standard flag");
            }
            if cmd.contains("phpstan") && !cmd.contains("--level") {
                out.push("Consider specifying the analysis level with --level");
            }
        }
        Category::Framework => {
            if cmd.contains("artisan migrate") && !cmd.contains("--seed") {
                out.push("Consider using --seed flag if database seeding is needed");
            }
        }
        _ => {}
    }

    if complexity > COMPLEXITY_THRESHOLD {
        out.push("Complex command - consider breaking into multiple steps");
    }
    if risk == RiskLevel::High {
        out.push("High-risk command detected - review security implications");
    }

    let mut deduped: Vec<String> = Vec::with_capacity(out.len());
    for s in out {
        if !deduped.iter().any(|d| d == s) {
            deduped.push(s.to_string());
        }
    }
    deduped
}

fn has_curl_fail_flag(cmd: &str) -> bool {
    cmd.split_whitespace().any(|token| {
        token == "--fail"
            || token == "--fail-with-body"
            || (token.starts_with('-') && !token.starts_with("--") && token.contains('f'))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_docker_run_with_rm() {
        let result = classify("docker run --rm myimage");
        assert_eq!(result.category, Category::Containerization);
        assert!(result.tools.contains(&"docker".to_string()));
        assert!(!result.suggestions.iter().any(|s| s.contains("--rm")));
        assert_eq!(result.pattern.as_deref(), Some("docker"));
    }

    #[test]
    fn test_docker_run_latest() {
        let result = classify("docker run myimage:latest");
        assert!(result.suggestions.iter().any(|s| s.contains("'latest'")));
        assert!(result.suggestions.iter().any(|s| s.contains("--rm")));
    }

    #[test]
    fn test_classification_is_deterministic() {
        let first = classify("docker run --rm myimage");
        for _ in 0..10 {
            assert_eq!(classify("docker run --rm myimage"), first);
        }
    }

    #[test]
    fn test_unmatched_command_is_utility() {
        let result = classify("echo hello");
        assert_eq!(result.category, Category::Utility);
        assert_eq!(result.tools, vec!["shell".to_string()]);
        assert_eq!(result.risk, RiskLevel::Low);
        assert!(result.pattern.is_none());
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn test_high_risk_gets_generic_warning() {
        let result = classify("rm -rf /");
        assert_eq!(result.risk, RiskLevel::High);
        assert!(result
            .suggestions
            .contains(&"High-risk command detected - review security implications".to_string()));
    }

    #[test]
    fn test_complex_command_suggestion() {
        let result = classify("cd app && npm ci && npm test | tee out.log > result.txt");
        assert!(result.complexity > COMPLEXITY_THRESHOLD);
        assert!(result.suggestions.iter().any(|s| s.starts_with("Complex command")));
    }

    #[test]
    fn test_case_insensitive_matching() {
        let result = classify("Docker Build -t app .");
        assert_eq!(result.category, Category::Containerization);
        assert_eq!(result.command, "Docker Build -t app .");
    }

    #[test]
    fn test_npm_install_suggests_ci() {
        let result = classify("npm install");
        assert_eq!(result.category, Category::PackageManagement);
        assert!(result.suggestions.iter().any(|s| s.contains("npm ci")));
        assert!(classify("npm ci").suggestions.is_empty());
    }

    #[test]
    fn test_curl_fail_flags() {
        assert!(classify("curl https://x.io")
            .suggestions
            .iter()
            .any(|s| s.contains("--fail")));
        assert!(!classify("curl -fsSL https://x.io -o out")
            .suggestions
            .iter()
            .any(|s| s.contains("--fail")));
    }

    #[test]
    fn test_go_build_ldflags() {
        assert!(classify("go build ./cmd/app")
            .suggestions
            .iter()
            .any(|s| s.contains("-ldflags")));
        assert!(classify("go build -ldflags \"-X main.v=1\" ./cmd/app")
            .suggestions
            .is_empty());
    }

    #[test]
    fn test_script_lines() {
        let script = "# install\nnpm ci\n\ndocker build \\\n  -t app \\\n  .\n  npm test  \n";
        assert_eq!(
            script_lines(script),
            vec!["npm ci", "docker build -t app .", "npm test"]
        );
    }

    #[test]
    fn test_category_serializes_kebab_case() {
        let json = serde_json::to_string(&Category::PackageManagement).unwrap();
        assert_eq!(json, "\"package-management\"");
        assert_eq!(Category::CodeQuality.to_string(), "code-quality");
    }
}
