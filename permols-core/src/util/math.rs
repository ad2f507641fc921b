//! Numeric helpers for score vectors and design columns.

/// Sum of squared values.
pub fn sum_of_squares(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum()
}

/// Whether every value equals the first one, up to a relative tolerance.
///
/// Empty slices count as constant.
pub fn is_constant(values: &[f64]) -> bool {
    let Some(&first) = values.first() else {
        return true;
    };
    let tol = 1e-12 * first.abs().max(1.0);
    values.iter().all(|v| (v - first).abs() <= tol)
}

/// Maximum ignoring NaN; `None` when every value is NaN (or the slice is empty).
pub fn nan_max(values: &[f64]) -> Option<f64> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc, v| match acc {
            Some(m) if m >= v => Some(m),
            _ => Some(v),
        })
}

/// Number of NaN values.
pub fn count_nan(values: &[f64]) -> usize {
    values.iter().filter(|v| v.is_nan()).count()
}
