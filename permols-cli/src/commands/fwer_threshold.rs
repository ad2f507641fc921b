//! FWER score threshold of a saved run.
//!
//! permols fwer-threshold --run-file out.permols --alpha 0.05

use anyhow::{bail, Result};
use clap::Args;

use permols_core::report::serialization::load_run;

#[derive(Args)]
pub struct FwerThresholdArgs {
    /// Saved run (.permols)
    #[arg(long)]
    run_file: String,

    /// Family-wise error rate
    #[arg(long, default_value = "0.05")]
    alpha: f64,

    /// List the significant (tested, target) pairs
    #[arg(long, default_value = "false")]
    list: bool,
}

pub fn run(args: FwerThresholdArgs) -> Result<()> {
    if !(args.alpha > 0.0 && args.alpha <= 1.0) {
        bail!("--alpha must be in (0, 1], got {}", args.alpha);
    }
    let saved = load_run(std::path::Path::new(&args.run_file))?;
    let result = &saved.result;

    let Some(threshold) = result.fwer_threshold(args.alpha) else {
        println!(
            "{} permutations are too few to reach alpha = {}",
            result.params.n_perm, args.alpha
        );
        return Ok(());
    };
    let significant = result.significant(args.alpha);

    println!("alpha: {}", args.alpha);
    println!("score threshold (F >): {}", threshold);
    println!(
        "significant pairs: {} of {}",
        significant.len(),
        result.params.n_tested * result.params.n_targets
    );
    if args.list {
        let name = |names: &[String], i: usize| names.get(i).cloned().unwrap_or_else(|| i.to_string());
        for (x_id, y_id) in significant {
            println!(
                "{}\t{}\t{}",
                name(&saved.tested_names, x_id),
                name(&saved.target_names, y_id),
                result.true_statistics.scores[x_id][y_id]
            );
        }
    }
    Ok(())
}
