//! Max-statistic (family-wise) corrected p-values.
//!
//! For a true score `s` and a null distribution of per-permutation
//! maxima `h0` of length `n_perm`:
//!
//!   p = (#{h0 >= s} + 1) / (n_perm + 1)
//!
//! The `+1` keeps p-values strictly positive. Results are reported as
//! `-log10 p`, so larger means more significant and the range is
//! `[0, log10(n_perm + 1)]`.

/// `-log10` corrected p-value for every score.
///
/// NaN entries of `null` never count as exceeding a score; NaN scores
/// get p = 1 (0 on the log scale).
pub fn corrected_neg_log10_pvalues(scores: &[f64], null: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = null.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let log_total = ((null.len() + 1) as f64).log10();

    scores
        .iter()
        .map(|&s| {
            if s.is_nan() {
                return 0.0;
            }
            let exceeding = sorted.len() - sorted.partition_point(|&v| v < s);
            log_total - ((exceeding + 1) as f64).log10()
        })
        .collect()
}

/// Largest score that is *not* significant at family-wise level `alpha`.
///
/// A score is significant when it is strictly greater than the returned
/// value. `None` when `n_perm` is too small for any score to reach
/// `alpha` (`alpha * (n_perm + 1) < 1`) or `alpha` is outside (0, 1].
pub fn fwer_score_threshold(null: &[f64], alpha: f64) -> Option<f64> {
    if !(alpha > 0.0 && alpha <= 1.0) {
        return None;
    }
    let allowed = (alpha * (null.len() + 1) as f64).floor() as usize;
    if allowed == 0 {
        return None;
    }
    let mut sorted: Vec<f64> = null.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| b.total_cmp(a));
    Some(sorted.get(allowed - 1).copied().unwrap_or(f64::NEG_INFINITY))
}
