//! Statistics: nested-model F-tests, F distribution helpers and the
//! max-statistic p-value mapping.

pub mod distribution;
pub mod pvalue;
