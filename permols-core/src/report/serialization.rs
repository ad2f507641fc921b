//! Saved runs.
//!
//! Binary format: bincode of [`SavedRun`], which starts with magic bytes
//! (PMOL) and a format version. A JSON sidecar of the run parameters is
//! written alongside for inspection.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::diagnostics::Diagnostic;
use crate::permuted_ols::{PermutedOlsResult, RunParams};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRun {
    pub magic: [u8; 4],
    pub version: u32,
    /// Samples in analysis order.
    pub sample_ids: Vec<String>,
    pub tested_names: Vec<String>,
    pub target_names: Vec<String>,
    pub result: PermutedOlsResult,
    pub diagnostics: Vec<Diagnostic>,
}

impl SavedRun {
    /// "PMOL" (PerMuted OLs).
    pub const MAGIC: [u8; 4] = [b'P', b'M', b'O', b'L'];
    pub const VERSION: u32 = 1;

    pub fn new(
        sample_ids: Vec<String>,
        tested_names: Vec<String>,
        target_names: Vec<String>,
        result: PermutedOlsResult,
        diagnostics: Vec<Diagnostic>,
    ) -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            sample_ids,
            tested_names,
            target_names,
            result,
            diagnostics,
        }
    }
}

pub fn save_run(run: &SavedRun, path: &Path) -> Result<()> {
    let encoded = bincode::serialize(run)?;
    std::fs::write(path, &encoded)
        .with_context(|| format!("Failed to write run file: {}", path.display()))?;
    Ok(())
}

pub fn load_run(path: &Path) -> Result<SavedRun> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read run file: {}", path.display()))?;
    let run: SavedRun = bincode::deserialize(&data)
        .with_context(|| format!("Not a permols run file: {}", path.display()))?;

    if run.magic != SavedRun::MAGIC {
        bail!(
            "Invalid run file: expected magic bytes {:?}, got {:?}",
            SavedRun::MAGIC,
            run.magic
        );
    }
    if run.version > SavedRun::VERSION {
        bail!(
            "Run file version {} is newer than supported version {}",
            run.version,
            SavedRun::VERSION
        );
    }
    Ok(run)
}

/// JSON sidecar of the run parameters. Infinite thresholds are written
/// as `null`.
pub fn save_params_json(params: &RunParams, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(params)?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn run_summary(run: &SavedRun) -> String {
    let p = &run.result.params;
    let best = run
        .result
        .p_values
        .iter()
        .flatten()
        .copied()
        .fold(0.0_f64, f64::max);
    let mut summary = format!(
        "permols run v{}\n\
         Samples: {}\n\
         Tested variables: {}\n\
         Targets: {}\n\
         Confounds (incl. intercept): {}\n\
         Intercept added: {}\n\
         Permutation scheme: {}\n\
         Permutations: {} ({} workers, seed {})\n\
         Degrees of freedom: ({}, {})\n\
         Score threshold: {:.4} (tail p {})\n\
         Retained permuted entries: {}\n\
         Degenerate permutations: {}\n\
         Undefined true scores: {}\n\
         Max -log10 p: {:.4}",
        run.version,
        p.n_samples,
        p.n_tested,
        p.n_targets,
        p.n_confounds,
        if p.intercept_added { "yes" } else { "no" },
        p.permutation_scheme,
        p.n_perm,
        p.n_workers,
        p.random_seed,
        p.df_tested,
        p.df_residual,
        p.score_threshold,
        p.sparsity_threshold,
        p.n_retained_entries,
        p.n_degenerate_permutations,
        p.n_degenerate_true_scores,
        best,
    );
    for d in &run.diagnostics {
        summary.push_str(&format!("\nWarning: {}", d));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PermutedOlsConfig;
    use crate::permuted_ols::permuted_ols;
    use permols_linalg::DenseMatrix;

    fn saved() -> SavedRun {
        let x = DenseMatrix::from_vec(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let y = DenseMatrix::from_vec(&[1.2, 1.9, 3.3, 3.8, 5.1, 6.4]);
        let config = PermutedOlsConfig {
            n_perm: 20,
            random_seed: Some(9),
            ..Default::default()
        };
        let (result, diagnostics) = permuted_ols(&x, &y, None, &config).unwrap().into_parts();
        SavedRun::new(
            (1..=6).map(|i| format!("S{}", i)).collect(),
            vec!["dose".into()],
            vec!["response".into()],
            result,
            diagnostics,
        )
    }

    #[test]
    fn test_save_load_roundtrip() {
        let run = saved();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.permols");
        save_run(&run, &path).unwrap();
        let loaded = load_run(&path).unwrap();

        assert_eq!(loaded.magic, SavedRun::MAGIC);
        assert_eq!(loaded.sample_ids.len(), 6);
        assert_eq!(loaded.tested_names, vec!["dose"]);
        assert_eq!(loaded.result.params, run.result.params);
        assert_eq!(loaded.result.null_distribution, run.result.null_distribution);
        assert_eq!(loaded.result.p_values, run.result.p_values);
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut run = saved();
        run.magic = *b"XXXX";
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.permols");
        save_run(&run, &path).unwrap();
        assert!(load_run(&path).is_err());
    }

    #[test]
    fn test_params_json_and_summary() {
        let run = saved();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.params.json");
        save_params_json(&run.result.params, &path).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["n_perm"], 20);
        assert_eq!(value["random_seed"], 9);
        assert_eq!(value["permutation_scheme"], "Shuffle");

        let summary = run_summary(&run);
        assert!(summary.contains("Samples: 6"));
        assert!(summary.contains("Permutation scheme: shuffle"));
    }
}
