//! Design assembly: tested variables, confounds and the intercept.
//!
//! The full model is `[tested | confounds]`, the reduced model is the
//! confounds alone. An intercept column joins the confounds when asked
//! for, unless the tested variable is itself constant (an intercept
//! test, which also selects sign flipping) or a confound is already a
//! non-zero constant.

use permols_linalg::DenseMatrix;

use crate::error::PermutationError;
use crate::permutation::PermutationScheme;
use crate::util::math::is_constant;

#[derive(Debug, Clone)]
pub struct Design {
    tested: DenseMatrix,
    confounds: Option<DenseMatrix>,
    intercept_added: bool,
    scheme: PermutationScheme,
}

fn check_rows(
    what: &'static str,
    m: &DenseMatrix,
    expected: usize,
) -> Result<(), PermutationError> {
    if m.nrows() != expected {
        return Err(PermutationError::ShapeMismatch {
            what,
            expected,
            got: m.nrows(),
        });
    }
    if !m.is_finite() {
        return Err(PermutationError::NonFinite { what });
    }
    Ok(())
}

impl Design {
    /// Validate shapes and assemble the design.
    ///
    /// `targets` only contributes its row count; scores are computed by
    /// [`crate::stats::f_test::FTestEngine`].
    pub fn build(
        tested: &DenseMatrix,
        targets: &DenseMatrix,
        confounds: Option<&DenseMatrix>,
        model_intercept: bool,
    ) -> Result<Self, PermutationError> {
        let n = targets.nrows();
        if n == 0 {
            return Err(PermutationError::EmptyMatrix {
                what: "target matrix",
                axis: "rows",
            });
        }
        if targets.ncols() == 0 {
            return Err(PermutationError::EmptyMatrix {
                what: "target matrix",
                axis: "columns",
            });
        }
        if tested.ncols() == 0 {
            return Err(PermutationError::EmptyMatrix {
                what: "tested variables",
                axis: "columns",
            });
        }
        check_rows("tested variables", tested, n)?;
        check_rows("target variables", targets, n)?;
        let confounds = confounds.filter(|c| c.ncols() > 0);
        if let Some(c) = confounds {
            check_rows("confounding variables", c, n)?;
        }

        let intercept_test = tested.columns().iter().all(|c| is_constant(c));
        let scheme = if intercept_test {
            PermutationScheme::SignFlip
        } else {
            PermutationScheme::Shuffle
        };

        let has_constant = confounds.is_some_and(|c| {
            c.columns()
                .iter()
                .any(|col| is_constant(col) && col[0] != 0.0)
        });
        let intercept_added = model_intercept && !intercept_test && !has_constant;

        let ones = DenseMatrix::from_vec(&vec![1.0; n]);
        let confounds = match (confounds, intercept_added) {
            (Some(c), true) => Some(c.hstack(&ones)?),
            (Some(c), false) => Some(c.clone()),
            (None, true) => Some(ones),
            (None, false) => None,
        };

        Ok(Self {
            tested: tested.clone(),
            confounds,
            intercept_added,
            scheme,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.tested.nrows()
    }

    pub fn n_tested(&self) -> usize {
        self.tested.ncols()
    }

    /// Columns of the reduced model, intercept included.
    pub fn n_confounds(&self) -> usize {
        self.confounds.as_ref().map_or(0, DenseMatrix::ncols)
    }

    pub fn intercept_added(&self) -> bool {
        self.intercept_added
    }

    /// Whether every tested column is constant.
    pub fn is_intercept_test(&self) -> bool {
        self.scheme == PermutationScheme::SignFlip
    }

    pub fn scheme(&self) -> PermutationScheme {
        self.scheme
    }

    pub fn tested(&self) -> &DenseMatrix {
        &self.tested
    }

    /// The reduced (confounds-only) model; `None` when empty.
    pub fn reduced(&self) -> Option<&DenseMatrix> {
        self.confounds.as_ref()
    }

    /// `[tested column j | confounds]`.
    pub fn full_for_column(&self, j: usize) -> Result<DenseMatrix, PermutationError> {
        let column = DenseMatrix::from_vec(&self.tested.col(j));
        match &self.confounds {
            Some(c) => Ok(column.hstack(c)?),
            None => Ok(column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targets(n: usize) -> DenseMatrix {
        DenseMatrix::from_vec(&(0..n).map(|i| (i as f64).sin()).collect::<Vec<_>>())
    }

    #[test]
    fn test_intercept_added_by_default() {
        let tested = DenseMatrix::from_vec(&[1.0, 2.0, 3.0, 4.0]);
        let design = Design::build(&tested, &targets(4), None, true).unwrap();
        assert!(design.intercept_added());
        assert_eq!(design.n_confounds(), 1);
        assert_eq!(design.scheme(), PermutationScheme::Shuffle);
        let full = design.full_for_column(0).unwrap();
        assert_eq!(full.ncols(), 2);
        assert_eq!(full.col(1), vec![1.0; 4]);
    }

    #[test]
    fn test_no_intercept_requested() {
        let tested = DenseMatrix::from_vec(&[1.0, 2.0, 3.0, 4.0]);
        let design = Design::build(&tested, &targets(4), None, false).unwrap();
        assert!(!design.intercept_added());
        assert!(design.reduced().is_none());
        assert_eq!(design.full_for_column(0).unwrap().ncols(), 1);
    }

    #[test]
    fn test_constant_tested_selects_sign_flip_without_intercept() {
        let tested = DenseMatrix::from_vec(&[1.0; 6]);
        let design = Design::build(&tested, &targets(6), None, true).unwrap();
        assert!(design.is_intercept_test());
        assert_eq!(design.scheme(), PermutationScheme::SignFlip);
        assert!(!design.intercept_added());
    }

    #[test]
    fn test_existing_constant_confound_is_reused() {
        let tested = DenseMatrix::from_vec(&[1.0, 2.0, 3.0, 5.0]);
        let confounds =
            DenseMatrix::from_columns(&[vec![0.5, 0.1, 0.3, 0.2], vec![2.0; 4]]).unwrap();
        let design = Design::build(&tested, &targets(4), Some(&confounds), true).unwrap();
        assert!(!design.intercept_added());
        assert_eq!(design.n_confounds(), 2);

        let confounds = DenseMatrix::from_vec(&[0.5, 0.1, 0.3, 0.2]);
        let design = Design::build(&tested, &targets(4), Some(&confounds), true).unwrap();
        assert!(design.intercept_added());
        let full = design.full_for_column(0).unwrap();
        assert_eq!(full.ncols(), 3);
        assert_eq!(full.col(0), vec![1.0, 2.0, 3.0, 5.0]);
        assert_eq!(full.col(2), vec![1.0; 4]);
    }

    #[test]
    fn test_row_mismatch() {
        let tested = DenseMatrix::from_vec(&[1.0, 2.0, 3.0]);
        let err = Design::build(&tested, &targets(4), None, true).unwrap_err();
        assert!(matches!(
            err,
            PermutationError::ShapeMismatch {
                what: "tested variables",
                expected: 4,
                got: 3
            }
        ));

        let tested = DenseMatrix::from_vec(&[1.0, 2.0, 3.0, 4.0]);
        let confounds = DenseMatrix::zeros(5, 1);
        assert!(matches!(
            Design::build(&tested, &targets(4), Some(&confounds), true),
            Err(PermutationError::ShapeMismatch {
                what: "confounding variables",
                ..
            })
        ));
    }

    #[test]
    fn test_empty_and_non_finite_inputs() {
        let tested = DenseMatrix::zeros(4, 0);
        assert!(matches!(
            Design::build(&tested, &targets(4), None, true),
            Err(PermutationError::EmptyMatrix { .. })
        ));

        let tested = DenseMatrix::from_vec(&[1.0, f64::NAN, 3.0, 4.0]);
        assert!(matches!(
            Design::build(&tested, &targets(4), None, true),
            Err(PermutationError::NonFinite {
                what: "tested variables"
            })
        ));
    }
}
