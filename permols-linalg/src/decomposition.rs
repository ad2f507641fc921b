#![allow(clippy::needless_range_loop)]
//! Orthogonal decompositions.
//!
//! `OrthoBasis` is a rank-revealing modified Gram-Schmidt: columns
//! that are (numerically) in the span of earlier columns are dropped
//! instead of failing, so collinear confounds simply reduce the rank
//! of the model. `least_squares` is the strict counterpart built on
//! faer's QR, which refuses rank-deficient input.

use faer::prelude::SpSolverLstsq;
use faer::Col;
use thiserror::Error;

use crate::dense::DenseMatrix;

#[derive(Error, Debug)]
pub enum LinalgError {
    #[error("Singular matrix encountered")]
    SingularMatrix,

    #[error("Dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("Underdetermined system: {nrows} rows for {ncols} columns")]
    Underdetermined { nrows: usize, ncols: usize },
}

/// Orthonormal basis of the column space of a matrix.
#[derive(Debug, Clone)]
pub struct OrthoBasis {
    nrows: usize,
    /// Orthonormal columns, each of length `nrows`.
    columns: Vec<Vec<f64>>,
    /// Indices of the input columns that contributed a basis vector.
    kept: Vec<usize>,
}

impl OrthoBasis {
    /// Relative norm below which a column counts as linearly dependent.
    pub const DEFAULT_TOL: f64 = 1e-10;

    /// Basis of the empty column space of `R^nrows`.
    pub fn empty(nrows: usize) -> Self {
        Self {
            nrows,
            columns: Vec::new(),
            kept: Vec::new(),
        }
    }

    pub fn new(a: &DenseMatrix) -> Self {
        Self::with_tolerance(a, Self::DEFAULT_TOL)
    }

    /// Build the basis, dropping any column whose residual norm after
    /// projection falls below `tol` times its original norm.
    pub fn with_tolerance(a: &DenseMatrix, tol: f64) -> Self {
        let mut basis = Self::empty(a.nrows());
        for j in 0..a.ncols() {
            let col = a.col(j);
            let norm = DenseMatrix::dot(&col, &col).sqrt();
            if norm == 0.0 {
                continue;
            }
            // Two projection passes keep the basis orthogonal to working precision.
            let mut v = basis.residualize(&col);
            basis.residualize_in_place(&mut v);
            let rnorm = DenseMatrix::dot(&v, &v).sqrt();
            if rnorm <= tol * norm {
                continue;
            }
            for x in &mut v {
                *x /= rnorm;
            }
            basis.columns.push(v);
            basis.kept.push(j);
        }
        basis
    }

    /// Dimension of the spanned space.
    pub fn rank(&self) -> usize {
        self.columns.len()
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    /// Input column indices that were linearly independent.
    pub fn kept_columns(&self) -> &[usize] {
        &self.kept
    }

    /// Orthonormal basis vectors.
    pub fn columns(&self) -> &[Vec<f64>] {
        &self.columns
    }

    /// Component of `v` orthogonal to the spanned space: `v - Q Q' v`.
    pub fn residualize(&self, v: &[f64]) -> Vec<f64> {
        let mut out = v.to_vec();
        self.residualize_in_place(&mut out);
        out
    }

    pub fn residualize_in_place(&self, v: &mut [f64]) {
        assert_eq!(v.len(), self.nrows);
        for q in &self.columns {
            let coef = DenseMatrix::dot(q, v);
            for i in 0..v.len() {
                v[i] -= coef * q[i];
            }
        }
    }
}

/// Relative size of a diagonal entry of R below which the design is
/// treated as rank deficient.
const LSTSQ_RANK_TOL: f64 = 1e-10;

/// Ordinary least squares coefficients of `b` on the columns of `a`.
///
/// Solved with faer's Householder QR. Rank-deficient designs are
/// rejected rather than given a minimum-norm solution.
pub fn least_squares(a: &DenseMatrix, b: &[f64]) -> Result<Vec<f64>, LinalgError> {
    let (m, n) = (a.nrows(), a.ncols());
    if b.len() != m {
        return Err(LinalgError::DimensionMismatch {
            expected: m,
            got: b.len(),
        });
    }
    if m < n {
        return Err(LinalgError::Underdetermined { nrows: m, ncols: n });
    }
    if n == 0 {
        return Ok(Vec::new());
    }

    let qr = a.as_faer().qr();
    let r = qr.compute_thin_r();
    let diag: Vec<f64> = (0..n).map(|i| r.read(i, i).abs()).collect();
    let scale = diag.iter().copied().fold(0.0, f64::max);
    if scale == 0.0 || diag.iter().any(|&d| d <= LSTSQ_RANK_TOL * scale) {
        return Err(LinalgError::SingularMatrix);
    }

    let rhs = Col::from_fn(m, |i| b[i]);
    let x = qr.solve_lstsq(&rhs);
    Ok((0..n).map(|i| x.read(i)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ortho_basis_full_rank() {
        let a = DenseMatrix::from_row_major(3, 2, &[1.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
        let basis = OrthoBasis::new(&a);
        assert_eq!(basis.rank(), 2);
        assert_eq!(basis.kept_columns(), &[0, 1]);
        let q = basis.columns();
        assert!((DenseMatrix::dot(&q[0], &q[0]) - 1.0).abs() < 1e-12);
        assert!((DenseMatrix::dot(&q[1], &q[1]) - 1.0).abs() < 1e-12);
        assert!(DenseMatrix::dot(&q[0], &q[1]).abs() < 1e-12);
    }

    #[test]
    fn test_ortho_basis_drops_collinear_columns() {
        // Third column = 2 * first - second; fourth is all zeros.
        let a = DenseMatrix::from_columns(&[
            vec![1.0, 2.0, 3.0, 4.0],
            vec![0.0, 1.0, 0.0, 1.0],
            vec![2.0, 3.0, 6.0, 7.0],
            vec![0.0; 4],
        ])
        .unwrap();
        let basis = OrthoBasis::new(&a);
        assert_eq!(basis.rank(), 2);
        assert_eq!(basis.kept_columns(), &[0, 1]);
    }

    #[test]
    fn test_residualize_removes_span() {
        let a = DenseMatrix::from_vec(&[1.0, 1.0, 1.0, 1.0]);
        let basis = OrthoBasis::new(&a);
        let r = basis.residualize(&[1.0, 2.0, 3.0, 6.0]);
        // Centering: mean is 3.
        let expected = [-2.0, -1.0, 0.0, 3.0];
        for (ri, ei) in r.iter().zip(expected.iter()) {
            assert!((ri - ei).abs() < 1e-12, "{} != {}", ri, ei);
        }
    }

    #[test]
    fn test_empty_basis_is_identity_projection() {
        let basis = OrthoBasis::empty(3);
        assert_eq!(basis.rank(), 0);
        assert_eq!(basis.residualize(&[1.0, -2.0, 3.0]), vec![1.0, -2.0, 3.0]);
    }

    #[test]
    fn test_least_squares_exact_fit() {
        // b = 2 - 0.5 * t is reproduced exactly.
        let a = DenseMatrix::from_row_major(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let x = least_squares(&a, &[2.0, 1.5, 1.0, 0.5]).unwrap();
        assert!((x[0] - 2.0).abs() < 1e-12, "{:?}", x);
        assert!((x[1] + 0.5).abs() < 1e-12, "{:?}", x);
    }

    #[test]
    fn test_least_squares_singular() {
        let a = DenseMatrix::from_columns(&[vec![1.0, 2.0, 3.0], vec![2.0, 4.0, 6.0]]).unwrap();
        assert!(matches!(
            least_squares(&a, &[1.0, 0.0, 1.0]),
            Err(LinalgError::SingularMatrix)
        ));
        assert!(matches!(
            least_squares(&DenseMatrix::zeros(3, 1), &[1.0, 0.0, 1.0]),
            Err(LinalgError::SingularMatrix)
        ));
    }

    #[test]
    fn test_least_squares_normal_equations() {
        let a = DenseMatrix::from_row_major(3, 2, &[1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let b = vec![1.0, 2.0, 2.0];
        let x = least_squares(&a, &b).unwrap();
        // The residual is orthogonal to every column of A.
        let fitted = a.mat_vec(&x);
        let resid: Vec<f64> = b.iter().zip(&fitted).map(|(bi, fi)| bi - fi).collect();
        for j in 0..2 {
            let g = DenseMatrix::dot(&a.col(j), &resid);
            assert!(g.abs() < 1e-10, "A'r[{}] = {}", j, g);
        }
    }

    #[test]
    fn test_least_squares_matches_basis_projection() {
        let a = DenseMatrix::from_columns(&[
            vec![1.0, 1.0, 1.0, 1.0, 1.0],
            vec![0.3, -1.2, 2.0, 0.7, -0.4],
        ])
        .unwrap();
        let b = [1.0, 0.5, 3.0, -2.0, 0.25];
        let x = least_squares(&a, &b).unwrap();
        let fitted = a.mat_vec(&x);
        let resid = OrthoBasis::new(&a).residualize(&b);
        for i in 0..b.len() {
            assert!((b[i] - fitted[i] - resid[i]).abs() < 1e-10);
        }
    }

    #[test]
    fn test_least_squares_rejects_wide_systems() {
        let a = DenseMatrix::zeros(2, 3);
        assert!(matches!(
            least_squares(&a, &[1.0, 2.0]),
            Err(LinalgError::Underdetermined { nrows: 2, ncols: 3 })
        ));
    }
}
