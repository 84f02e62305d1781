//! Command pattern table
//!
//! Entries are declared in priority order: framework CLIs, then PHP tooling,
//! then other specific tools, then general-purpose tools. The first entry whose
//! regex matches the lowercased command wins.

use super::Category;
use regex::Regex;
use std::sync::OnceLock;

/// A compiled entry of the pattern table
#[derive(Debug)]
pub struct CommandPattern {
    pub name: &'static str,
    pub regex: Regex,
    pub category: Category,
    pub description: &'static str,
    pub tools: &'static [&'static str],
}

type PatternSpec = (
    &'static str,
    &'static str,
    Category,
    &'static str,
    &'static [&'static str],
);

const PATTERN_TABLE: &[PatternSpec] = &[
    // Framework CLIs
    ("artisan", r"\bartisan\s+", Category::Framework, "Laravel Artisan command", &["laravel", "artisan"]),
    ("symfony", r"\bsymfony\s+|\bbin/console\b", Category::Framework, "Symfony console command", &["symfony"]),
    ("drush", r"\bdrush\s+", Category::Framework, "Drupal Drush command", &["drupal", "drush"]),
    ("wp", r"\bwp\s+", Category::Framework, "WordPress CLI command", &["wordpress", "wp-cli"]),
    // PHP tooling
    ("phpunit", r"\bphpunit\b", Category::Testing, "PHPUnit test runner", &["phpunit", "php"]),
    ("pest", r"\bpest\b", Category::Testing, "Pest test runner", &["pest", "php"]),
    ("behat", r"\bbehat\b", Category::Testing, "Behat BDD testing", &["behat", "php"]),
    ("codeception", r"\bcodecept\s+", Category::Testing, "Codeception testing framework", &["codeception", "php"]),
    ("infection", r"\binfection\b", Category::Testing, "Infection mutation testing", &["infection", "php"]),
    ("phpcs", r"\bphpcs\b", Category::CodeQuality, "PHP CodeSniffer", &["phpcs", "php"]),
    ("phpcbf", r"\bphpcbf\b", Category::CodeQuality, "PHP Code Beautifier and Fixer", &["phpcbf", "php"]),
    ("phpstan", r"\bphpstan\b", Category::CodeQuality, "PHPStan static analysis", &["phpstan", "php"]),
    ("psalm", r"\bpsalm\b", Category::CodeQuality, "Psalm static analysis", &["psalm", "php"]),
    ("phan", r"\bphan\b", Category::CodeQuality, "Phan static analyzer", &["phan", "php"]),
    ("php-cs-fixer", r"\bphp-cs-fixer\b", Category::CodeQuality, "PHP CS Fixer", &["php-cs-fixer", "php"]),
    ("phpmd", r"\bphpmd\b", Category::CodeQuality, "PHP Mess Detector", &["phpmd", "php"]),
    ("phpdoc", r"\bphpdoc\b", Category::Documentation, "phpDocumentor", &["phpdoc", "php"]),
    ("php-server", r"\bphp\s+-s\s+", Category::Development, "PHP built-in web server", &["php"]),
    ("phar", r"\.phar\b", Category::Packaging, "PHAR archive execution", &["phar", "php"]),
    ("box", r"\bbox\s+", Category::Packaging, "Box PHAR builder", &["box", "php"]),
    ("robo", r"\brobo\s+", Category::TaskRunner, "Robo task runner", &["robo", "php"]),
    ("deployer", r"\bdep\s+", Category::Deployment, "Deployer deployment tool", &["deployer", "php"]),
    ("phinx", r"\bphinx\s+", Category::Database, "Phinx database migrations", &["phinx", "php"]),
    ("doctrine", r"\bdoctrine\b", Category::Database, "Doctrine ORM command", &["doctrine", "php"]),
    ("composer", r"\bcomposer\s+", Category::PackageManagement, "Composer package management", &["composer", "php"]),
    // Other specific tools
    ("docker-compose", r"\bdocker[- ]compose\b", Category::Containerization, "Docker Compose orchestration", &["docker-compose", "docker"]),
    ("kubectl", r"\bkubectl\s+", Category::Deployment, "Kubernetes CLI", &["kubectl", "kubernetes"]),
    ("helm", r"\bhelm\s+", Category::Deployment, "Helm chart management", &["helm", "kubernetes"]),
    ("terraform", r"\bterraform\s+", Category::Infrastructure, "Terraform infrastructure as code", &["terraform"]),
    ("cargo", r"\bcargo\s+", Category::Build, "Rust Cargo build", &["cargo", "rust"]),
    ("gradle", r"\bgradlew?\s+|\./gradlew\b", Category::Build, "Gradle build", &["gradle", "java"]),
    ("task", r"^task(\s|$)|\btask\s+-", Category::TaskRunner, "go-task task runner", &["go-task"]),
    ("pytest", r"\bpytest\b", Category::Testing, "pytest test runner", &["pytest", "python"]),
    // General tools
    ("docker", r"\bdocker\s+", Category::Containerization, "Docker container operations", &["docker"]),
    ("go", r"\bgo\s+", Category::Build, "Go toolchain command", &["go"]),
    ("npm", r"\bnpm\s+", Category::PackageManagement, "npm package management", &["npm", "nodejs"]),
    ("yarn", r"\byarn(\s|$)", Category::PackageManagement, "Yarn package management", &["yarn", "nodejs"]),
    ("make", r"\bmake(\s|$)", Category::Build, "Make build", &["make"]),
    ("git", r"\bgit\s+", Category::VersionControl, "Git version control", &["git"]),
    ("curl", r"\bcurl\s+", Category::Network, "HTTP request with curl", &["curl"]),
    ("ssh", r"\bssh\s+", Category::Network, "Remote shell", &["ssh"]),
    ("rsync", r"\brsync\s+", Category::FileTransfer, "File synchronization", &["rsync"]),
    ("python", r"\bpython[0-9.]*\s+", Category::Runtime, "Python interpreter", &["python"]),
    ("pip", r"\bpip[0-9]?\s+", Category::PackageManagement, "pip package management", &["pip", "python"]),
    ("mvn", r"\bmvnw?\s+|\./mvnw\b", Category::Build, "Maven build", &["maven", "java"]),
    ("php", r"\bphp\s+", Category::Runtime, "PHP interpreter", &["php"]),
    ("local-script", r"\./[^\s]+", Category::Script, "Local script execution", &["shell"]),
];

/// The compiled pattern table, built on first use
pub fn patterns() -> &'static [CommandPattern] {
    static PATTERNS: OnceLock<Vec<CommandPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        PATTERN_TABLE
            .iter()
            .map(|(name, pattern, category, description, tools)| CommandPattern {
                name,
                regex: Regex::new(pattern).expect("valid regex"),
                category: *category,
                description,
                tools,
            })
            .collect()
    })
}

/// First pattern matching an already-lowercased command
pub fn find_match(lowercased: &str) -> Option<&'static CommandPattern> {
    patterns().iter().find(|p| p.regex.is_match(lowercased))
}

pub fn pattern_by_name(name: &str) -> Option<&'static CommandPattern> {
    patterns().iter().find(|p| p.name == name)
}

/// All patterns of one category, in priority order
pub fn patterns_by_category(category: Category) -> Vec<&'static CommandPattern> {
    patterns()
        .iter()
        .filter(|p| p.category == category)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_pattern_names_unique() {
        let names: HashSet<_> = patterns().iter().map(|p| p.name).collect();
        assert_eq!(names.len(), patterns().len());
    }

    #[test]
    fn test_compose_wins_over_docker() {
        assert_eq!(find_match("docker-compose up -d").unwrap().name, "docker-compose");
        assert_eq!(find_match("docker compose build").unwrap().name, "docker-compose");
        assert_eq!(find_match("docker build .").unwrap().name, "docker");
    }

    #[test]
    fn test_framework_wins_over_runtime() {
        assert_eq!(find_match("php artisan migrate").unwrap().name, "artisan");
        assert_eq!(find_match("php vendor/bin/phpunit").unwrap().name, "phpunit");
        assert_eq!(find_match("php -s localhost:8000").unwrap().name, "php-server");
        assert_eq!(find_match("php index.php").unwrap().name, "php");
    }

    #[test]
    fn test_local_script_is_last_resort() {
        assert_eq!(find_match("./scripts/deploy.sh prod").unwrap().name, "local-script");
        assert_eq!(find_match("docker build -f ./docker/app .").unwrap().name, "docker");
        assert_eq!(find_match("./gradlew build").unwrap().name, "gradle");
        assert_eq!(find_match("go test ./...").unwrap().name, "go");
        assert_eq!(find_match("npm --prefix ./web ci").unwrap().name, "npm");
    }

    #[test]
    fn test_patterns_by_category() {
        let testing: Vec<_> = patterns_by_category(Category::Testing)
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert!(testing.contains(&"phpunit"));
        assert!(testing.contains(&"pytest"));
        assert!(!testing.contains(&"docker"));
    }

    #[test]
    fn test_no_match() {
        assert!(find_match("echo hello").is_none());
        assert!(pattern_by_name("cargo").is_some());
        assert!(pattern_by_name("nonexistent").is_none());
    }
}
