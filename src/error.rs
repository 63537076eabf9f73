//! Error types for the perception pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a session run.
///
/// Degenerate numeric inputs (too few frames, empty audio, a zero-range
/// batch) are not errors; they produce zero-valued results.
#[derive(Debug, Error)]
pub enum PerceptionError {
    #[error("Required input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Malformed record on line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("Event seed schema violation: {0}")]
    SchemaViolation(String),

    #[error("Media decode failure: {0}")]
    MediaDecodeFailure(String),

    #[error("Invalid session manifest: {0}")]
    InvalidManifest(String),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("Embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PerceptionError>;
