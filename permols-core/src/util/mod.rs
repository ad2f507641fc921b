//! Small numeric helpers shared across modules.

pub mod math;
