#![allow(clippy::needless_range_loop)]
//! Dense matrix storage backed by faer.
//!
//! Designs and target matrices enter the engine as column-major
//! `Mat<f64>` wrappers. The hot loops work on extracted columns,
//! so the wrapper only needs construction, element access and
//! matrix-vector products.

use faer::Mat;

use crate::decomposition::LinalgError;

/// A dense, column-major matrix of `f64`.
///
/// Rows are samples, columns are variables throughout permols.
#[derive(Debug, Clone)]
pub struct DenseMatrix {
    inner: Mat<f64>,
}

impl DenseMatrix {
    /// Create a new dense matrix filled with zeros.
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            inner: Mat::zeros(nrows, ncols),
        }
    }

    #[cfg(test)]
    pub(crate) fn from_row_major(nrows: usize, ncols: usize, data: &[f64]) -> Self {
        assert_eq!(data.len(), nrows * ncols);
        let inner = Mat::from_fn(nrows, ncols, |i, j| data[i * ncols + j]);
        Self { inner }
    }

    /// Create a single-column matrix from a vector.
    pub fn from_vec(data: &[f64]) -> Self {
        let inner = Mat::from_fn(data.len(), 1, |i, _| data[i]);
        Self { inner }
    }

    /// Create a matrix from a list of equally long columns.
    ///
    /// An empty list yields a 0 x 0 matrix.
    pub fn from_columns(columns: &[Vec<f64>]) -> Result<Self, LinalgError> {
        let nrows = columns.first().map_or(0, Vec::len);
        if let Some(bad) = columns.iter().find(|c| c.len() != nrows) {
            return Err(LinalgError::DimensionMismatch {
                expected: nrows,
                got: bad.len(),
            });
        }
        let inner = Mat::from_fn(nrows, columns.len(), |i, j| columns[j][i]);
        Ok(Self { inner })
    }

    /// Number of rows.
    pub fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    /// Number of columns.
    pub fn ncols(&self) -> usize {
        self.inner.ncols()
    }

    /// Get element at (row, col).
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.inner.read(row, col)
    }

    /// Set element at (row, col).
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.inner.write(row, col, value);
    }

    /// Extract column as a Vec<f64>.
    pub fn col(&self, j: usize) -> Vec<f64> {
        (0..self.nrows()).map(|i| self.inner.read(i, j)).collect()
    }

    /// All columns, in order.
    pub fn columns(&self) -> Vec<Vec<f64>> {
        (0..self.ncols()).map(|j| self.col(j)).collect()
    }

    /// Horizontal concatenation `[self | other]`.
    pub fn hstack(&self, other: &DenseMatrix) -> Result<DenseMatrix, LinalgError> {
        if self.nrows() != other.nrows() {
            return Err(LinalgError::DimensionMismatch {
                expected: self.nrows(),
                got: other.nrows(),
            });
        }
        let left = self.ncols();
        let inner = Mat::from_fn(self.nrows(), left + other.ncols(), |i, j| {
            if j < left {
                self.inner.read(i, j)
            } else {
                other.inner.read(i, j - left)
            }
        });
        Ok(DenseMatrix { inner })
    }

    /// True when no element is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        (0..self.ncols()).all(|j| (0..self.nrows()).all(|i| self.inner.read(i, j).is_finite()))
    }

    /// Matrix-vector product: self * v -> result vector.
    pub fn mat_vec(&self, v: &[f64]) -> Vec<f64> {
        assert_eq!(self.ncols(), v.len());
        let n = self.nrows();
        let mut result = vec![0.0; n];
        for j in 0..self.ncols() {
            let vj = v[j];
            for i in 0..n {
                result[i] += self.inner.read(i, j) * vj;
            }
        }
        result
    }

    pub(crate) fn as_faer(&self) -> &Mat<f64> {
        &self.inner
    }

    /// Dot product of two equally long slices.
    pub fn dot(a: &[f64], b: &[f64]) -> f64 {
        assert_eq!(a.len(), b.len());
        a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_columns() {
        let m = DenseMatrix::from_columns(&[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!(m.nrows(), 3);
        assert_eq!(m.ncols(), 2);
        assert_eq!(m.get(2, 0), 3.0);
        assert_eq!(m.get(0, 1), 4.0);
        assert_eq!(m.columns()[1], vec![4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_from_columns_ragged() {
        let err = DenseMatrix::from_columns(&[vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(
            err,
            LinalgError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        ));
    }

    #[test]
    fn test_from_vec_is_column() {
        let m = DenseMatrix::from_vec(&[1.0, 2.0, 3.0]);
        assert_eq!(m.nrows(), 3);
        assert_eq!(m.ncols(), 1);
        assert_eq!(m.col(0), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_hstack() {
        let a = DenseMatrix::from_vec(&[1.0, 2.0]);
        let b = DenseMatrix::from_row_major(2, 2, &[3.0, 4.0, 5.0, 6.0]);
        let c = a.hstack(&b).unwrap();
        assert_eq!(c.ncols(), 3);
        assert_eq!(c.row_values(1), vec![2.0, 5.0, 6.0]);

        let short = DenseMatrix::zeros(3, 1);
        assert!(a.hstack(&short).is_err());
    }

    #[test]
    fn test_is_finite() {
        let mut m = DenseMatrix::zeros(2, 2);
        assert!(m.is_finite());
        m.set(1, 1, f64::NAN);
        assert!(!m.is_finite());
        m.set(1, 1, f64::INFINITY);
        assert!(!m.is_finite());
    }

    #[test]
    fn test_mat_vec() {
        let a = DenseMatrix::from_row_major(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(a.get(1, 0), 4.0);
        assert_eq!(a.mat_vec(&[1.0, 0.0, 1.0]), vec![4.0, 10.0]);
        assert_eq!(a.mat_vec(&[0.0, 0.0, 0.0]), vec![0.0, 0.0]);
    }

    impl DenseMatrix {
        fn row_values(&self, i: usize) -> Vec<f64> {
            (0..self.ncols()).map(|j| self.get(i, j)).collect()
        }
    }
}
