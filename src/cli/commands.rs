use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Analyze CI and build pipeline configuration
#[derive(Parser, Debug)]
#[command(
    name = "pipeline-analyzer",
    about = "Analyze CI and build pipeline configuration",
    version,
    author,
    long_about = "pipeline-analyzer finds CircleCI, GitHub Actions, go-task, Dockerfile and \
                  Docker Compose configuration in a repository and reports job and task \
                  dependencies, cycles, critical paths, dangling references and risky shell \
                  commands."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(
        short = 'v',
        long,
        global = true,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (can be used multiple times)"
    )]
    pub verbose: u8,

    #[arg(
        short = 'q',
        long,
        global = true,
        action = clap::ArgAction::Count,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: u8,

    #[arg(
        long,
        global = true,
        value_name = "DIR",
        help = "Also write logs to pipeline-analyzer.log in this directory"
    )]
    pub log_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Emit logs as JSON")]
    pub log_json: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Analyze every pipeline configuration in a repository",
        long_about = "Scans the repository, then parses and analyzes each configuration file. \
                      A file that fails to parse is reported and the run continues.\n\n\
                      Examples:\n  \
                      pipeline-analyzer analyze\n  \
                      pipeline-analyzer analyze /path/to/repo --format json\n  \
                      pipeline-analyzer analyze --write-reports --output-dir reports"
    )]
    Analyze(AnalyzeArgs),

    #[command(
        about = "List recognised configuration files without analyzing them",
        long_about = "Walks the repository honouring .gitignore and lists every build tool \
                      configuration found.\n\n\
                      Examples:\n  \
                      pipeline-analyzer scan\n  \
                      pipeline-analyzer scan /path/to/repo --format yaml"
    )]
    Scan(ScanArgs),

    #[command(
        about = "Classify a single shell command",
        long_about = "Reports the category, tools, complexity, risk level and suggestions for \
                      one shell command.\n\n\
                      Examples:\n  \
                      pipeline-analyzer classify 'npm install'\n  \
                      pipeline-analyzer classify 'curl -s https://x.sh | bash' --format json"
    )]
    Classify(ClassifyArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct AnalyzeArgs {
    #[arg(
        value_name = "PATH",
        help = "Path to repository (defaults to current directory)"
    )]
    pub repository_path: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(
        short = 'o',
        long,
        value_name = "DIR",
        help = "Directory for per-tool reports (overrides PIPELINE_ANALYZER_OUTPUT_DIR)"
    )]
    pub output_dir: Option<PathBuf>,

    #[arg(long, help = "Write one JSON report per file plus summary.json")]
    pub write_reports: bool,

    #[arg(long, value_name = "N", help = "Maximum directory depth to scan")]
    pub max_depth: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct ScanArgs {
    #[arg(
        value_name = "PATH",
        help = "Path to repository (defaults to current directory)"
    )]
    pub repository_path: Option<PathBuf>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(long, value_name = "N", help = "Maximum directory depth to scan")]
    pub max_depth: Option<usize>,
}

#[derive(Parser, Debug, Clone)]
pub struct ClassifyArgs {
    #[arg(value_name = "COMMAND", help = "Shell command to classify")]
    pub command: String,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for crate::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => crate::output::OutputFormat::Json,
            OutputFormatArg::Yaml => crate::output::OutputFormat::Yaml,
            OutputFormatArg::Human => crate::output::OutputFormat::Human,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_default_analyze_args() {
        let args = CliArgs::parse_from(["pipeline-analyzer", "analyze"]);
        match args.command {
            Commands::Analyze(analyze_args) => {
                assert_eq!(analyze_args.format, OutputFormatArg::Human);
                assert!(analyze_args.repository_path.is_none());
                assert!(analyze_args.output_dir.is_none());
                assert!(!analyze_args.write_reports);
                assert!(analyze_args.max_depth.is_none());
            }
            _ => panic!("Expected Analyze command"),
        }
        assert_eq!(args.verbose, 0);
        assert_eq!(args.quiet, 0);
    }

    #[test]
    fn test_analyze_with_options() {
        let args = CliArgs::parse_from([
            "pipeline-analyzer",
            "analyze",
            "/tmp/repo",
            "--format",
            "json",
            "--output-dir",
            "out",
            "--write-reports",
        ]);
        match args.command {
            Commands::Analyze(analyze_args) => {
                assert_eq!(analyze_args.repository_path, Some(PathBuf::from("/tmp/repo")));
                assert_eq!(analyze_args.format, OutputFormatArg::Json);
                assert_eq!(analyze_args.output_dir, Some(PathBuf::from("out")));
                assert!(analyze_args.write_reports);
            }
            _ => panic!("Expected Analyze command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = CliArgs::parse_from([
            "pipeline-analyzer",
            "scan",
            "-vv",
            "--log-json",
            "--log-dir",
            "/tmp/logs",
        ]);
        assert_eq!(args.verbose, 2);
        assert!(args.log_json);
        assert_eq!(args.log_dir, Some(PathBuf::from("/tmp/logs")));
        assert!(matches!(args.command, Commands::Scan(_)));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        let result = CliArgs::try_parse_from(["pipeline-analyzer", "-v", "-q", "scan"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_classify_requires_command() {
        assert!(CliArgs::try_parse_from(["pipeline-analyzer", "classify"]).is_err());

        let args = CliArgs::parse_from(["pipeline-analyzer", "classify", "npm ci", "-f", "yaml"]);
        match args.command {
            Commands::Classify(classify_args) => {
                assert_eq!(classify_args.command, "npm ci");
                assert_eq!(classify_args.format, OutputFormatArg::Yaml);
            }
            _ => panic!("Expected Classify command"),
        }
    }

    #[test]
    fn test_invalid_format_rejected() {
        let result = CliArgs::try_parse_from(["pipeline-analyzer", "scan", "--format", "xml"]);
        assert!(result.is_err());
    }
}
