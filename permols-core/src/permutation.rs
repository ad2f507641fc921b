//! Reproducible permutations of the tested variable.
//!
//! Two schemes, chosen once per analysis:
//! - `Shuffle`: reorder samples uniformly at random (labels swap).
//! - `SignFlip`: multiply each sample by an independent random sign.
//!   Used when the tested variable is constant, where reordering would
//!   be a no-op.
//!
//! Every iteration draws from its own ChaCha8 stream keyed by the
//! iteration index, so the permutation for iteration `i` is the same
//! no matter which worker computes it or in what order.

use std::ops::Range;

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::PermutationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermutationScheme {
    Shuffle,
    SignFlip,
}

impl std::fmt::Display for PermutationScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermutationScheme::Shuffle => write!(f, "shuffle"),
            PermutationScheme::SignFlip => write!(f, "sign-flip"),
        }
    }
}

/// One relabeling of the samples.
#[derive(Debug, Clone, PartialEq)]
pub enum Permutation {
    /// `order[i]` is the source sample placed at position `i`.
    Shuffle(Vec<usize>),
    /// Per-sample sign, +1.0 or -1.0.
    SignFlip(Vec<f64>),
}

impl Permutation {
    pub fn len(&self) -> usize {
        match self {
            Permutation::Shuffle(order) => order.len(),
            Permutation::SignFlip(signs) => signs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the relabeling reproduces the observed scores: the
    /// identity order, or the same sign on every sample (the F score is
    /// invariant to negating the tested column).
    pub fn is_trivial(&self) -> bool {
        match self {
            Permutation::Shuffle(order) => order.iter().enumerate().all(|(i, &j)| i == j),
            Permutation::SignFlip(signs) => {
                signs.iter().all(|&s| s > 0.0) || signs.iter().all(|&s| s < 0.0)
            }
        }
    }

    pub fn apply(&self, column: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; column.len()];
        self.apply_into(column, &mut out);
        out
    }

    pub fn apply_into(&self, column: &[f64], out: &mut [f64]) {
        debug_assert_eq!(column.len(), self.len());
        debug_assert_eq!(out.len(), self.len());
        match self {
            Permutation::Shuffle(order) => {
                for (o, &src) in out.iter_mut().zip(order.iter()) {
                    *o = column[src];
                }
            }
            Permutation::SignFlip(signs) => {
                for ((o, &v), &s) in out.iter_mut().zip(column.iter()).zip(signs.iter()) {
                    *o = v * s;
                }
            }
        }
    }
}

/// Seeded source of permutations, addressable by iteration index.
#[derive(Debug, Clone)]
pub struct PermutationGenerator {
    scheme: PermutationScheme,
    n_samples: usize,
    seed: u64,
}

impl PermutationGenerator {
    pub fn new(
        scheme: PermutationScheme,
        n_samples: usize,
        seed: u64,
    ) -> Result<Self, PermutationError> {
        // With fewer than two samples every draw is trivial.
        if n_samples < 2 {
            return Err(PermutationError::TooFewSamples(n_samples));
        }
        Ok(Self {
            scheme,
            n_samples,
            seed,
        })
    }

    pub fn scheme(&self) -> PermutationScheme {
        self.scheme
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Permutation for `iteration` (1-based; 0 is the true labeling).
    ///
    /// Never returns a trivial relabeling: such draws are repeated from
    /// the same stream.
    pub fn permutation(&self, iteration: u64) -> Result<Permutation, PermutationError> {
        if iteration == 0 {
            return Err(PermutationError::ReservedIteration);
        }
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(iteration);

        loop {
            let perm = match self.scheme {
                PermutationScheme::Shuffle => {
                    let mut order: Vec<usize> = (0..self.n_samples).collect();
                    order.shuffle(&mut rng);
                    Permutation::Shuffle(order)
                }
                PermutationScheme::SignFlip => Permutation::SignFlip(
                    (0..self.n_samples)
                        .map(|_| if rng.gen::<bool>() { 1.0 } else { -1.0 })
                        .collect(),
                ),
            };
            if !perm.is_trivial() {
                return Ok(perm);
            }
        }
    }

    /// Permutations for a contiguous range of iterations.
    pub fn range(
        &self,
        iterations: Range<u64>,
    ) -> impl Iterator<Item = Result<(u64, Permutation), PermutationError>> + '_ {
        iterations.map(move |i| self.permutation(i).map(|p| (i, p)))
    }
}
