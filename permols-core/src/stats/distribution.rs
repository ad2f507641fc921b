//! F distribution helpers.
//!
//! The sparsity threshold is given as an uncorrected tail probability
//! and converted here into a score threshold on the F scale.

use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::error::PermutationError;

fn fisher(df1: f64, df2: f64) -> Result<FisherSnedecor, PermutationError> {
    FisherSnedecor::new(df1, df2).map_err(|e| PermutationError::Distribution {
        df1,
        df2,
        reason: e.to_string(),
    })
}

/// Score `x` with `P(F > x) = p` for `F ~ F(df1, df2)`.
///
/// `p = 1` gives 0 (every defined score passes), `p = 0` gives `+inf`.
pub fn f_upper_quantile(p: f64, df1: f64, df2: f64) -> Result<f64, PermutationError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(PermutationError::InvalidSparsityThreshold(p));
    }
    if p >= 1.0 {
        return Ok(0.0);
    }
    if p <= 0.0 {
        return Ok(f64::INFINITY);
    }
    Ok(fisher(df1, df2)?.inverse_cdf(1.0 - p).max(0.0))
}

/// Mean squared distance between the F(df1, df2) CDF at the sorted null
/// values and evenly spaced quantiles on [0, 1].
///
/// Measures how close an empirical null distribution is to the
/// theoretical one; it shrinks as permutations are added. NaN values
/// are ignored; fewer than two defined values give `None`.
pub fn null_calibration_mse(
    null: &[f64],
    df1: f64,
    df2: f64,
) -> Result<Option<f64>, PermutationError> {
    let dist = fisher(df1, df2)?;
    let mut sorted: Vec<f64> = null.iter().copied().filter(|v| !v.is_nan()).collect();
    if sorted.len() < 2 {
        return Ok(None);
    }
    sorted.sort_by(|a, b| a.total_cmp(b));
    let last = (sorted.len() - 1) as f64;
    let mse = sorted
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            let d = dist.cdf(v) - i as f64 / last;
            d * d
        })
        .sum::<f64>()
        / sorted.len() as f64;
    Ok(Some(mse))
}
