//! Permutation-corrected F-tests of every tested variable against every
//! target.
//!
//! A run walks through fixed phases:
//!
//! 1. `RunTrue`: score the true labeling (iteration 0), keep every score.
//! 2. `RunPermutations`: iterations `1..=n_perm`, split into contiguous
//!    ranges over a rayon pool; each worker owns its accumulator and its
//!    slice of the max-statistic null distribution.
//! 3. `Merge`: fold worker accumulators together, concatenate nulls in
//!    range order.
//! 4. `Finalize`: map true scores to FWER-corrected `-log10` p-values.

use std::ops::Range;

use permols_linalg::DenseMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::accumulator::ScoreAccumulator;
use crate::config::PermutedOlsConfig;
use crate::design::Design;
use crate::diagnostics::{Diagnosed, Diagnostic};
use crate::error::PermutationError;
use crate::permutation::{PermutationGenerator, PermutationScheme};
use crate::stats::distribution::f_upper_quantile;
use crate::stats::f_test::FTestEngine;
use crate::stats::pvalue::{corrected_neg_log10_pvalues, fwer_score_threshold};
use crate::util::math::{count_nan, nan_max};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Init,
    RunTrue,
    RunPermutations,
    Merge,
    Finalize,
    Done,
}

struct PhaseTracker(Phase);

impl PhaseTracker {
    fn advance(&mut self, next: Phase) {
        debug_assert!(next > self.0, "phase {:?} after {:?}", next, self.0);
        debug!("phase {:?} -> {:?}", self.0, next);
        self.0 = next;
    }
}

/// True-labeling fit, indexed `[x_id][y_id]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrueStatistics {
    pub scores: Vec<Vec<f64>>,
    /// Effect of the tested column on each target, adjusted for confounds.
    pub coefficients: Vec<Vec<f64>>,
    pub df_tested: usize,
    pub df_residual: usize,
}

/// Everything needed to interpret or replay a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    pub n_samples: usize,
    pub n_tested: usize,
    pub n_targets: usize,
    /// Reduced-model columns, intercept included.
    pub n_confounds: usize,
    pub reduced_rank: usize,
    pub n_perm: usize,
    pub n_workers: usize,
    pub model_intercept: bool,
    pub intercept_added: bool,
    pub permutation_scheme: PermutationScheme,
    pub df_tested: usize,
    pub df_residual: usize,
    pub sparsity_threshold: f64,
    /// Sparsity threshold on the F scale.
    pub score_threshold: f64,
    pub random_seed: u64,
    pub n_degenerate_permutations: usize,
    pub n_degenerate_true_scores: usize,
    pub n_retained_entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermutedOlsResult {
    /// `-log10` FWER-corrected p-values, `[x_id][y_id]`.
    pub p_values: Vec<Vec<f64>>,
    /// Every true score, stored at iteration 0.
    pub true_scores: ScoreAccumulator,
    pub true_statistics: TrueStatistics,
    /// Maximum score of each permutation, in iteration order.
    pub null_distribution: Vec<f64>,
    /// Permuted scores at or above `params.score_threshold`.
    pub permuted_scores: ScoreAccumulator,
    pub params: RunParams,
}

impl PermutedOlsResult {
    pub fn p_value(&self, x_id: usize, y_id: usize) -> Option<f64> {
        self.p_values.get(x_id)?.get(y_id).copied()
    }

    /// Score above which a true score is significant at FWER `alpha`.
    pub fn fwer_threshold(&self, alpha: f64) -> Option<f64> {
        fwer_score_threshold(&self.null_distribution, alpha)
    }

    /// `(x_id, y_id)` pairs whose true score exceeds the FWER threshold.
    pub fn significant(&self, alpha: f64) -> Vec<(usize, usize)> {
        let Some(threshold) = self.fwer_threshold(alpha) else {
            return Vec::new();
        };
        self.true_statistics
            .scores
            .iter()
            .enumerate()
            .flat_map(|(x_id, row)| {
                row.iter()
                    .enumerate()
                    .filter(move |&(_, &s)| s > threshold)
                    .map(move |(y_id, _)| (x_id, y_id))
            })
            .collect()
    }
}

/// Contiguous iteration ranges, `n_perm / n_workers` each with the
/// remainder on the last. Iterations start at 1.
pub fn partition_iterations(n_perm: u64, n_workers: usize) -> Vec<Range<u64>> {
    let w = n_workers.max(1) as u64;
    let base = n_perm / w;
    let mut start = 1;
    (0..w)
        .map(|i| {
            let len = if i == w - 1 { base + n_perm % w } else { base };
            let range = start..start + len;
            start += len;
            range
        })
        .collect()
}

/// Recomputes the true scores from two separate projections per tested
/// column and warns on any disagreement with the engine's fast path.
/// Returns the number of disagreeing scores.
#[cfg(debug_assertions)]
fn cross_check_true_scores(
    design: &Design,
    targets: &DenseMatrix,
    fits: &[crate::stats::f_test::ColumnFit],
) -> Result<usize, PermutationError> {
    use crate::stats::f_test::nested_f_scores;

    let mut mismatches = 0;
    for (x_id, fit) in fits.iter().enumerate() {
        let nested = nested_f_scores(&design.full_for_column(x_id)?, design.reduced(), targets)?;
        for (y_id, (&fast, &slow)) in fit.scores.iter().zip(&nested.scores).enumerate() {
            let agree = fast == slow
                || (fast.is_nan() && slow.is_nan())
                || (fast - slow).abs() <= 1e-6 * slow.abs().max(1.0);
            if !agree {
                mismatches += 1;
                warn!(
                    "true score x{} y{}: engine gives {}, nested fit gives {}",
                    x_id, y_id, fast, slow
                );
            }
        }
    }
    Ok(mismatches)
}

fn score_threshold(sparsity: f64, df_residual: usize) -> Result<f64, PermutationError> {
    if df_residual == 0 {
        // Every defined score is +inf.
        return Ok(if sparsity >= 1.0 { 0.0 } else { f64::INFINITY });
    }
    f_upper_quantile(sparsity, 1.0, df_residual as f64)
}

struct WorkerContext<'a> {
    engine: &'a FTestEngine,
    /// Tested columns with the reduced model projected out.
    tested: &'a [Vec<f64>],
    generator: &'a PermutationGenerator,
    n_iter: u64,
    threshold: f64,
}

struct WorkerOutput {
    scores: ScoreAccumulator,
    null: Vec<f64>,
    degenerate: Vec<u64>,
}

fn run_worker(
    ctx: &WorkerContext<'_>,
    iterations: Range<u64>,
) -> Result<WorkerOutput, PermutationError> {
    let mut scores = ScoreAccumulator::new(ctx.n_iter, ctx.threshold);
    let mut null = Vec::with_capacity((iterations.end - iterations.start) as usize);
    let mut degenerate = Vec::new();
    let mut permuted = vec![0.0; ctx.engine.n_samples()];

    for item in ctx.generator.range(iterations.clone()) {
        let (iteration, perm) = item?;
        let mut max: Option<f64> = None;
        let mut undefined = false;
        for (x_id, column) in ctx.tested.iter().enumerate() {
            perm.apply_into(column, &mut permuted);
            let s = ctx.engine.scores(&permuted);
            undefined |= count_nan(&s) > 0;
            if let Some(m) = nan_max(&s) {
                max = Some(max.map_or(m, |cur| cur.max(m)));
            }
            scores.append_with(iteration, x_id, &s, 0);
        }
        if undefined {
            degenerate.push(iteration);
        }
        null.push(max.unwrap_or(f64::NAN));
    }

    debug!(
        "worker {}..{} done: {} entries retained",
        iterations.start,
        iterations.end,
        scores.len()
    );
    Ok(WorkerOutput {
        scores,
        null,
        degenerate,
    })
}

/// Permutation-corrected F-test of each tested column against each
/// target, controlling the family-wise error rate with the max statistic.
///
/// `tested` is n × p, `targets` n × t, `confounds` n × c. Shape errors
/// fail the call; numerical degeneracy is reported through the returned
/// diagnostics.
pub fn permuted_ols(
    tested: &DenseMatrix,
    targets: &DenseMatrix,
    confounds: Option<&DenseMatrix>,
    config: &PermutedOlsConfig,
) -> Result<Diagnosed<PermutedOlsResult>, PermutationError> {
    let mut phase = PhaseTracker(Phase::Init);
    let mut diagnostics = Vec::new();

    config.validate()?;
    let design = Design::build(tested, targets, confounds, config.model_intercept)?;
    let engine = FTestEngine::new(design.reduced(), targets)?;
    let seed = config.random_seed.unwrap_or_else(rand::random);
    let df_residual = engine.df_residual();
    let threshold = score_threshold(config.sparsity_threshold, df_residual)?;
    let n_perm = config.n_perm as u64;

    info!(
        "permuted OLS: n={}, tested={}, targets={}, confounds={}, n_perm={}, scheme={}",
        design.n_samples(),
        design.n_tested(),
        engine.n_targets(),
        design.n_confounds(),
        n_perm,
        design.scheme()
    );
    if design.is_intercept_test() {
        info!("All tested variables are constant; the intercept is tested with sign flips");
    }

    phase.advance(Phase::RunTrue);
    let tested_cols = design.tested().columns();
    let fits: Vec<_> = tested_cols.iter().map(|c| engine.fit(c)).collect();
    #[cfg(debug_assertions)]
    cross_check_true_scores(&design, targets, &fits)?;
    let mut true_scores = ScoreAccumulator::unbounded(1);
    for (x_id, fit) in fits.iter().enumerate() {
        true_scores.append_with(0, x_id, &fit.scores, 0);
    }
    let n_degenerate_true: usize = fits.iter().map(|f| count_nan(&f.scores)).sum();
    if n_degenerate_true > 0 {
        let d = Diagnostic::DegenerateTrueScores {
            count: n_degenerate_true,
        };
        warn!("{}", d);
        diagnostics.push(d);
    }

    let (requested, n_workers) = config.effective_workers();
    let mut permuted_scores = ScoreAccumulator::new(n_perm, threshold);
    let mut null_distribution = Vec::with_capacity(config.n_perm);
    let mut degenerate: Vec<u64> = Vec::new();

    if n_perm > 0 {
        phase.advance(Phase::RunPermutations);
        if n_workers < requested {
            let d = Diagnostic::WorkersClamped {
                requested,
                used: n_workers,
            };
            warn!("{}", d);
            diagnostics.push(d);
        }
        let generator = PermutationGenerator::new(design.scheme(), design.n_samples(), seed)?;
        let residualized: Vec<Vec<f64>> =
            tested_cols.iter().map(|c| engine.residualize(c)).collect();
        let ctx = WorkerContext {
            engine: &engine,
            tested: &residualized,
            generator: &generator,
            n_iter: n_perm,
            threshold,
        };
        let ranges = partition_iterations(n_perm, n_workers);
        info!(
            "Running {} permutations on {} workers (seed {})",
            n_perm, n_workers, seed
        );
        let outputs = if n_workers == 1 {
            ranges
                .into_iter()
                .map(|r| run_worker(&ctx, r))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n_workers)
                .build()?;
            pool.install(|| {
                ranges
                    .into_par_iter()
                    .map(|r| run_worker(&ctx, r))
                    .collect::<Result<Vec<_>, _>>()
            })?
        };

        phase.advance(Phase::Merge);
        diagnostics.extend(permuted_scores.merge_all(outputs.iter().map(|o| &o.scores))?);
        for output in outputs {
            null_distribution.extend(output.null);
            degenerate.extend(output.degenerate);
        }
        if let Some(&first_iteration) = degenerate.first() {
            let d = Diagnostic::DegeneratePermutations {
                count: degenerate.len(),
                first_iteration,
            };
            warn!("{}", d);
            diagnostics.push(d);
        }
    }

    phase.advance(Phase::Finalize);
    let p_values: Vec<Vec<f64>> = fits
        .iter()
        .map(|f| corrected_neg_log10_pvalues(&f.scores, &null_distribution))
        .collect();

    let params = RunParams {
        n_samples: design.n_samples(),
        n_tested: design.n_tested(),
        n_targets: engine.n_targets(),
        n_confounds: design.n_confounds(),
        reduced_rank: engine.reduced_rank(),
        n_perm: config.n_perm,
        n_workers,
        model_intercept: config.model_intercept,
        intercept_added: design.intercept_added(),
        permutation_scheme: design.scheme(),
        df_tested: 1,
        df_residual,
        sparsity_threshold: config.sparsity_threshold,
        score_threshold: threshold,
        random_seed: seed,
        n_degenerate_permutations: degenerate.len(),
        n_degenerate_true_scores: n_degenerate_true,
        n_retained_entries: permuted_scores.len(),
    };
    let true_statistics = TrueStatistics {
        scores: fits.iter().map(|f| f.scores.clone()).collect(),
        coefficients: fits.into_iter().map(|f| f.coefficients).collect(),
        df_tested: 1,
        df_residual,
    };

    phase.advance(Phase::Done);
    info!(
        "permuted OLS done: {} permuted entries retained (score >= {:.4}), {} diagnostics",
        params.n_retained_entries,
        threshold,
        diagnostics.len()
    );

    Ok(Diagnosed::new(
        PermutedOlsResult {
            p_values,
            true_scores,
            true_statistics,
            null_distribution,
            permuted_scores,
            params,
        },
        diagnostics,
    ))
}
