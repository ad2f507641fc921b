//! permols: permutation-corrected mass-univariate OLS.
//!
//! CLI entry point using clap for argument parsing.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "permols",
    version,
    about = "Permutation-corrected mass-univariate OLS F-tests",
    long_about = "Tests every tested variable against every target variable with an\n\
                  OLS F-test adjusted for confounds, controlling the family-wise error\n\
                  rate with the max-statistic permutation null."
)]
struct Cli {
    /// Number of threads (and permutation workers); overrides the config file
    #[arg(long, global = true)]
    threads: Option<usize>,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the permutation test and write result tables
    Run(commands::run::RunArgs),

    /// Score threshold controlling the family-wise error rate of a saved run
    FwerThreshold(commands::fwer_threshold::FwerThresholdArgs),

    /// Print the summary of a saved run
    Summary(commands::summary::SummaryArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }

    tracing::info!("permols v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Using {} threads", rayon::current_num_threads());

    match cli.command {
        Commands::Run(args) => commands::run::run(args, cli.threads),
        Commands::FwerThreshold(args) => commands::fwer_threshold::run(args),
        Commands::Summary(args) => commands::summary::run(args),
    }
}
