//! Sparse, threshold-filtered store of permutation scores.
//!
//! Over `n_perm x n_tested x n_targets` scores only the few above a
//! threshold are worth keeping. `ScoreAccumulator` holds them as
//! `(iter_id, x_id, y_id, score)` entries in insertion order.
//!
//! Retention rule: an entry is kept when `score >= threshold`. NaN is
//! never kept, except by an unbounded accumulator (threshold `-inf`),
//! which keeps everything.
//!
//! Merging follows the higher of the two thresholds. Entries from a
//! lower-threshold source are filtered; a higher-threshold source
//! raises the receiver's threshold, leaving entries already held below
//! it in place. In that case the receiver is no longer complete between
//! the old and new thresholds. Both situations are reported as
//! diagnostics.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::diagnostics::Diagnostic;
use crate::error::PermutationError;

/// One retained score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreEntry {
    /// Permutation that produced the score (0 = true labeling).
    pub iter_id: u64,
    /// Tested column.
    pub x_id: usize,
    /// Target column.
    pub y_id: usize,
    pub score: f64,
}

/// Entries as parallel columns, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreColumns {
    pub iter_id: Vec<u64>,
    pub x_id: Vec<usize>,
    pub y_id: Vec<usize>,
    pub score: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreAccumulator {
    n_iter: u64,
    threshold: f64,
    entries: Vec<ScoreEntry>,
}

impl ScoreAccumulator {
    /// Capacity reserved before the first append.
    pub const INITIAL_CAPACITY: usize = 64;

    /// Accumulator for a run of `n_iter` iterations keeping scores `>= threshold`.
    pub fn new(n_iter: u64, threshold: f64) -> Self {
        Self {
            n_iter,
            threshold,
            entries: Vec::with_capacity(Self::INITIAL_CAPACITY),
        }
    }

    /// Accumulator keeping every score, NaN included.
    pub fn unbounded(n_iter: u64) -> Self {
        Self::new(n_iter, f64::NEG_INFINITY)
    }

    pub fn n_iter(&self) -> u64 {
        self.n_iter
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn entries(&self) -> &[ScoreEntry] {
        &self.entries
    }

    fn retains(&self, score: f64) -> bool {
        self.threshold == f64::NEG_INFINITY || score >= self.threshold
    }

    /// Double the capacity until `additional` more entries fit.
    fn grow_for(&mut self, additional: usize) {
        let needed = self.entries.len() + additional;
        let mut cap = self.entries.capacity().max(Self::INITIAL_CAPACITY);
        if needed <= self.entries.capacity() {
            return;
        }
        while cap < needed {
            cap *= 2;
        }
        self.entries.reserve_exact(cap - self.entries.len());
    }

    fn push_all<I: Iterator<Item = ScoreEntry>>(&mut self, entries: I, count: usize) {
        self.grow_for(count);
        self.entries.extend(entries);
    }

    /// Append scores for tested column 0, target ids `0..scores.len()`.
    pub fn append(&mut self, iter_id: u64, scores: &[f64]) -> usize {
        self.append_with(iter_id, 0, scores, 0)
    }

    /// Append the retained scores of one tested column; target ids start
    /// at `y_offset`. Returns the number of entries kept.
    pub fn append_with(&mut self, iter_id: u64, x_id: usize, scores: &[f64], y_offset: usize) -> usize {
        let kept = scores.iter().filter(|&&s| self.retains(s)).count();
        if kept == 0 {
            return 0;
        }
        let threshold = self.threshold;
        let unbounded = threshold == f64::NEG_INFINITY;
        let entries = scores
            .iter()
            .enumerate()
            .filter(move |&(_, &s)| unbounded || s >= threshold)
            .map(move |(k, &score)| ScoreEntry {
                iter_id,
                x_id,
                y_id: y_offset + k,
                score,
            });
        self.push_all(entries, kept);
        kept
    }

    /// Merge another accumulator into this one.
    ///
    /// Fails without modifying `self` when the iteration counts differ.
    pub fn merge(&mut self, other: &ScoreAccumulator) -> Result<Vec<Diagnostic>, PermutationError> {
        if other.n_iter != self.n_iter {
            return Err(PermutationError::IterationCountMismatch {
                expected: self.n_iter,
                got: other.n_iter,
            });
        }

        let mut diagnostics = Vec::new();
        if other.threshold < self.threshold {
            let kept: Vec<ScoreEntry> = other
                .entries
                .iter()
                .copied()
                .filter(|e| e.score >= self.threshold)
                .collect();
            let dropped = other.entries.len() - kept.len();
            let diag = Diagnostic::ThresholdFiltered {
                source_threshold: other.threshold,
                threshold: self.threshold,
                dropped,
            };
            warn!("{}", diag);
            diagnostics.push(diag);
            let count = kept.len();
            self.push_all(kept.into_iter(), count);
        } else {
            if other.threshold > self.threshold {
                let diag = Diagnostic::ThresholdRaised {
                    previous: self.threshold,
                    current: other.threshold,
                };
                warn!("{}", diag);
                diagnostics.push(diag);
                self.threshold = other.threshold;
            }
            self.push_all(other.entries.iter().copied(), other.entries.len());
        }
        Ok(diagnostics)
    }

    /// Merge several accumulators in order.
    ///
    /// All iteration counts are checked before anything is merged.
    pub fn merge_all<'a, I>(&mut self, others: I) -> Result<Vec<Diagnostic>, PermutationError>
    where
        I: IntoIterator<Item = &'a ScoreAccumulator>,
    {
        let others: Vec<&ScoreAccumulator> = others.into_iter().collect();
        if let Some(bad) = others.iter().find(|o| o.n_iter != self.n_iter) {
            return Err(PermutationError::IterationCountMismatch {
                expected: self.n_iter,
                got: bad.n_iter,
            });
        }
        let mut diagnostics = Vec::new();
        for other in others {
            diagnostics.extend(self.merge(other)?);
        }
        Ok(diagnostics)
    }

    /// Materialise the entries as parallel columns.
    pub fn get_data(&self) -> ScoreColumns {
        let n = self.entries.len();
        let mut data = ScoreColumns {
            iter_id: Vec::with_capacity(n),
            x_id: Vec::with_capacity(n),
            y_id: Vec::with_capacity(n),
            score: Vec::with_capacity(n),
        };
        for e in &self.entries {
            data.iter_id.push(e.iter_id);
            data.x_id.push(e.x_id);
            data.y_id.push(e.y_id);
            data.score.push(e.score);
        }
        data
    }

    /// Entries produced by one iteration, in insertion order.
    pub fn entries_for_iteration(&self, iter_id: u64) -> impl Iterator<Item = &ScoreEntry> {
        self.entries.iter().filter(move |e| e.iter_id == iter_id)
    }
}
