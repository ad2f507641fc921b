//! Errors raised by the permutation engine.
//!
//! Only configuration problems are errors. Numerical degeneracy is
//! encoded in the scores themselves (NaN / +inf) and reported through
//! [`crate::diagnostics::Diagnostic`].

use permols_linalg::LinalgError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PermutationError {
    #[error("Shape mismatch for {what}: expected {expected} rows, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{what} has no {axis}")]
    EmptyMatrix {
        what: &'static str,
        axis: &'static str,
    },

    #[error("{what} contains NaN or infinite values")]
    NonFinite { what: &'static str },

    #[error("Cannot merge accumulators built for {expected} and {got} iterations")]
    IterationCountMismatch { expected: u64, got: u64 },

    #[error("Iteration 0 is reserved for the unpermuted labeling")]
    ReservedIteration,

    #[error("Label permutation needs at least two samples, got {0}")]
    TooFewSamples(usize),

    #[error("Sparsity threshold must lie in [0, 1], got {0}")]
    InvalidSparsityThreshold(f64),

    #[error("Invalid F distribution (df1={df1}, df2={df2}): {reason}")]
    Distribution { df1: f64, df2: f64, reason: String },

    #[error(transparent)]
    Linalg(#[from] LinalgError),

    #[error("Failed to start worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
