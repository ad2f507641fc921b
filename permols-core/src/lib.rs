//! permols-core: permutation-corrected mass-univariate OLS
//!
//! Tests every tested variable against every target with an F-test
//! adjusted for confounds, and controls the family-wise error rate with
//! the max-statistic permutation null. Permuted scores above a sparsity
//! threshold are kept in a [`accumulator::ScoreAccumulator`].

pub mod accumulator;
pub mod config;
pub mod design;
pub mod diagnostics;
pub mod error;
pub mod permutation;
pub mod permuted_ols;
pub mod report;
pub mod stats;
pub mod util;

pub use accumulator::ScoreAccumulator;
pub use config::PermutedOlsConfig;
pub use diagnostics::{Diagnosed, Diagnostic};
pub use error::PermutationError;
pub use permuted_ols::{permuted_ols, PermutedOlsResult, RunParams, TrueStatistics};
