//! Print the summary of a saved run.
//!
//! permols summary --run-file out.permols

use anyhow::Result;
use clap::Args;

use permols_core::report::serialization::{load_run, run_summary};

#[derive(Args)]
pub struct SummaryArgs {
    /// Saved run (.permols)
    #[arg(long)]
    run_file: String,
}

pub fn run(args: SummaryArgs) -> Result<()> {
    let saved = load_run(std::path::Path::new(&args.run_file))?;
    println!("Run: {}", args.run_file);
    println!("{}", run_summary(&saved));
    Ok(())
}
