//! Session-level orchestration.
//!
//! - The session manifest and its on-disk files
//! - Joining external feature vectors onto chunks
//! - The runner that takes one recording from raw inputs to scored chunks

pub mod manifest;
pub mod merge;
pub mod pipeline;

pub use manifest::{read_events, SessionManifest, StartTime};
pub use merge::{merge_vectors, merge_vectors_file, FeatureVector};
pub use pipeline::{RunOptions, SessionInputs, SessionReport, SessionRunner};
