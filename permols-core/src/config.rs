//! Run configuration.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::PermutationError;

/// Parameters of a permutation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermutedOlsConfig {
    /// Add an intercept to the confounds when the design lacks one.
    pub model_intercept: bool,
    /// Number of permutations; 0 skips the permutation phase.
    pub n_perm: usize,
    /// Uncorrected tail probability above which permuted scores are
    /// discarded. 1.0 keeps every defined score.
    pub sparsity_threshold: f64,
    /// Seed for the permutation streams; drawn at random when absent.
    pub random_seed: Option<u64>,
    /// Worker count; 0 uses every thread of the current rayon pool.
    pub n_workers: usize,
}

impl Default for PermutedOlsConfig {
    fn default() -> Self {
        Self {
            model_intercept: true,
            n_perm: 10_000,
            sparsity_threshold: 1e-4,
            random_seed: None,
            n_workers: 1,
        }
    }
}

impl PermutedOlsConfig {
    pub fn validate(&self) -> Result<(), PermutationError> {
        if !(0.0..=1.0).contains(&self.sparsity_threshold) {
            return Err(PermutationError::InvalidSparsityThreshold(
                self.sparsity_threshold,
            ));
        }
        Ok(())
    }

    /// Read a JSON config; missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Number of workers actually used for `n_perm` permutations.
    ///
    /// Returns the requested count alongside the effective one.
    pub fn effective_workers(&self) -> (usize, usize) {
        let requested = if self.n_workers == 0 {
            rayon::current_num_threads()
        } else {
            self.n_workers
        };
        (requested, requested.min(self.n_perm).max(1))
    }
}
