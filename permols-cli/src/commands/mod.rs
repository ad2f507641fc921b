pub mod fwer_threshold;
pub mod run;
pub mod summary;
