//! permols-linalg: linear algebra for permutation-corrected OLS
//!
//! Provides the dense matrix type designs and targets are passed in,
//! plus the orthogonal decompositions used to project confounds out
//! of tested and target variables.

pub mod decomposition;
pub mod dense;

pub use decomposition::{LinalgError, OrthoBasis};
pub use dense::DenseMatrix;
