// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use anyhow::Result;
use cbs_cli::{ConfigOverrides, macro_source, resolve_config};
use cbs_core::{CostKind, StageReport};
use cbs_pipeline::{CsvEventSource, Pipeline};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::env;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cbs")]
#[command(about = "Macro index, regime and sentiment-sensitivity analysis", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write every artifact
    Run(RunArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Serve macro data from the snapshot when it exists
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    use_cached: bool,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Macro snapshot (read when cached, refreshed after a live fetch)
    #[arg(long, default_value = "macroeconomic_data.csv")]
    macro_csv: PathBuf,

    /// Classified events with datetime, country_code and sentiment columns
    #[arg(long, default_value = "speeches.csv")]
    events: PathBuf,

    /// Artifact directory
    #[arg(short, long, default_value = "data")]
    output: PathBuf,

    /// Rolling standardization window in months
    #[arg(long)]
    standardize_window: Option<usize>,

    /// Rolling regression window in months
    #[arg(long)]
    regression_window: Option<usize>,

    /// Breakpoint penalty
    #[arg(long)]
    penalty: Option<f64>,

    /// Cumulative explained-variance threshold in (0, 1]
    #[arg(long)]
    variance_threshold: Option<f64>,

    /// Breakpoint cost model (rbf, l1, l2)
    #[arg(long)]
    cost: Option<String>,

    /// Print the summary as JSON instead of text
    #[arg(long)]
    json: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => handle_run(args),
    };
    if let Err(err) = result {
        eprintln!("error: {err}");
        process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_run(args: RunArgs) -> Result<()> {
    let overrides = ConfigOverrides {
        standardize_window: args.standardize_window,
        regression_window: args.regression_window,
        penalty: args.penalty,
        variance_threshold: args.variance_threshold,
        cost: args.cost.as_deref().map(CostKind::parse).transpose()?,
    };
    let config = resolve_config(args.config.as_deref(), &overrides)?;
    let api_key = env::var("FRED_API_KEY")
        .ok()
        .filter(|key| !key.trim().is_empty());
    let source = macro_source(&args.macro_csv, args.use_cached, api_key)?;
    let events = CsvEventSource::new(&args.events);

    let pipeline = Pipeline::new(config)?;
    match pipeline.execute(&source, &events, &args.output) {
        Ok(run) => {
            print_stages(&run.stages);
            if args.json {
                println!("{}", serde_json::to_string_pretty(&run.summary)?);
            } else {
                println!();
                print!("{}", run.summary);
            }
            println!("\nArtifacts written to {}", args.output.display());
            Ok(())
        }
        Err(failure) => {
            print_stages(&failure.stages);
            Err(failure.into())
        }
    }
}

fn print_stages(stages: &[StageReport]) {
    println!("Stages:");
    for report in stages {
        println!("  {report}");
    }
}
