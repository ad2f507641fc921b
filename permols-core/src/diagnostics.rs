//! Non-fatal conditions raised during a run.
//!
//! Operations that can lose information or hit numerical degeneracy
//! return their value together with a list of [`Diagnostic`]s instead
//! of failing. Every diagnostic is also logged at `warn` level where it
//! is produced.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Diagnostic {
    /// A merged source had a lower threshold than the receiver; its
    /// entries below the receiver's threshold were discarded.
    ThresholdFiltered {
        source_threshold: f64,
        threshold: f64,
        dropped: usize,
    },
    /// A merged source had a higher threshold; the receiver's threshold
    /// was raised and is no longer complete below it.
    ThresholdRaised { previous: f64, current: f64 },
    /// Permutations for which at least one score was undefined (NaN).
    DegeneratePermutations { count: usize, first_iteration: u64 },
    /// Undefined true scores (collinear tested column, constant target).
    DegenerateTrueScores { count: usize },
    /// More workers were requested than there are permutations.
    WorkersClamped { requested: usize, used: usize },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::ThresholdFiltered {
                source_threshold,
                threshold,
                dropped,
            } => write!(
                f,
                "merged accumulator had threshold {:.6} below {:.6}: {} entries dropped, information may be lost",
                source_threshold, threshold, dropped
            ),
            Diagnostic::ThresholdRaised { previous, current } => write!(
                f,
                "threshold raised from {:.6} to {:.6}: entries between the two may be incomplete",
                previous, current
            ),
            Diagnostic::DegeneratePermutations {
                count,
                first_iteration,
            } => write!(
                f,
                "{} permutations produced undefined scores (first at iteration {})",
                count, first_iteration
            ),
            Diagnostic::DegenerateTrueScores { count } => {
                write!(f, "{} true scores are undefined", count)
            }
            Diagnostic::WorkersClamped { requested, used } => write!(
                f,
                "{} workers requested but only {} permutations to run; using {} workers",
                requested, used, used
            ),
        }
    }
}

/// A computed value together with the non-fatal diagnostics raised
/// while producing it.
#[derive(Debug, Clone)]
pub struct Diagnosed<T> {
    pub value: T,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> Diagnosed<T> {
    pub fn new(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self { value, diagnostics }
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn into_parts(self) -> (T, Vec<Diagnostic>) {
        (self.value, self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mentions_counts() {
        let d = Diagnostic::ThresholdFiltered {
            source_threshold: 0.0,
            threshold: 2.0,
            dropped: 5,
        };
        assert!(d.to_string().contains("5 entries dropped"));

        let d = Diagnostic::WorkersClamped {
            requested: 8,
            used: 3,
        };
        assert!(d.to_string().contains("using 3 workers"));
    }

    #[test]
    fn test_diagnosed_parts() {
        let clean = Diagnosed::new(3, Vec::new());
        assert!(!clean.has_diagnostics());

        let d = Diagnosed::new("x", vec![Diagnostic::DegenerateTrueScores { count: 1 }]);
        assert!(d.has_diagnostics());
        let (value, diags) = d.into_parts();
        assert_eq!(value, "x");
        assert_eq!(diags.len(), 1);
    }
}
