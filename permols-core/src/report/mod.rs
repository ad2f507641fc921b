//! Run output: text tables and the saved binary run.

pub mod serialization;
pub mod tables;
