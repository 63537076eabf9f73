//! Run accounting.
//!
//! Tracks what a pipeline run read and wrote, persisted next to the
//! session output as `run_stats.json`.

pub mod log;

// Re-export commonly used types
pub use log::{RunLog, RunStats};
