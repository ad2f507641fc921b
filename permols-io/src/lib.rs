//! permols-io: table input for permols
//!
//! Reads sample-indexed numeric tables (tested variables, targets,
//! confounds) and aligns them on shared, complete samples.

pub mod sample;
pub mod table;

pub use sample::align_tables;
pub use table::{read_table, NumericTable};
