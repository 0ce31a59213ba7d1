// ========================================================================================
//
//                        The orchestrator: revtone
//
// ========================================================================================
//
// Resolves the run configuration from defaults, an optional TOML file, and
// command-line overrides, then drives the pipeline to completion. Progress goes
// to stdout; diagnostics go through `log` to stderr.

use clap::Parser;
use revtone::config::AnalysisConfig;
use revtone::pipeline;
use std::error::Error;
use std::path::PathBuf;
use std::process;

#[derive(Parser, Debug)]
#[clap(
    name = "revtone",
    version,
    about = "Robust OLS regressions of peer-review tone across reviewer-disclosure segments."
)]
struct Args {
    /// TOML file overriding the default settings.
    #[clap(long)]
    config: Option<PathBuf>,

    /// Input table (default: df_regression.csv).
    #[clap(long)]
    input: Option<PathBuf>,

    /// Directory for the output tables (default: regression_outputs).
    #[clap(long)]
    output_dir: Option<PathBuf>,

    /// Round identifier used in output file names (default: 1).
    #[clap(long)]
    round: Option<String>,

    /// Fit the remaining models when one fails, then report all failures.
    #[clap(long)]
    keep_going: bool,
}

fn resolve_config(args: Args) -> Result<AnalysisConfig, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::load(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(input) = args.input {
        config.input = input;
    }
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(round) = args.round {
        config.round = round;
    }
    config.keep_going |= args.keep_going;
    Ok(config)
}

fn report_failure(error: &dyn Error) -> ! {
    eprintln!("Error: {error}");
    let mut source = error.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
    process::exit(1);
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();
    let config = match resolve_config(args) {
        Ok(config) => config,
        Err(e) => report_failure(e.as_ref()),
    };
    log::info!(
        "Reading '{}', writing round {} to '{}'",
        config.input.display(),
        config.round,
        config.output_dir.display()
    );

    if let Err(e) = pipeline::run(&config) {
        report_failure(&e);
    }
    println!("Regression analysis completed.");
}
