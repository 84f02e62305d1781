use pipeline_analyzer::cli::commands::{CliArgs, Commands};
use pipeline_analyzer::cli::handlers::{handle_analyze, handle_classify, handle_scan};
use pipeline_analyzer::util::{adjust_level, config_from_env, init_logging, parse_level};
use pipeline_analyzer::VERSION;

use clap::Parser;
use tracing::debug;

fn main() {
    let args = CliArgs::parse();
    init_logging_from_args(&args);

    debug!("pipeline-analyzer v{} starting", VERSION);
    debug!("Arguments: {:?}", args);

    let exit_code = match &args.command {
        Commands::Analyze(analyze_args) => handle_analyze(analyze_args),
        Commands::Scan(scan_args) => handle_scan(scan_args),
        Commands::Classify(classify_args) => handle_classify(classify_args),
    };

    std::process::exit(exit_code);
}

fn init_logging_from_args(args: &CliArgs) {
    let mut config = config_from_env();
    if let Some(level) = &args.log_level {
        config.level = parse_level(level);
    }
    config.level = adjust_level(config.level, args.verbose, args.quiet);
    config.use_json |= args.log_json;
    config.log_dir = args.log_dir.clone();

    if let Err(e) = init_logging(config) {
        eprintln!("Failed to initialize logging: {}", e);
    }
}
