//! Core per-window processing.
//!
//! This module contains:
//! - Window planning and media cutting
//! - Motion and loudness dynamics
//! - Sync and capture-health metadata
//! - EventSeed assembly and the append-only seed log
//! - Whole-session event scoring

pub mod dynamics;
pub mod health;
pub mod scoring;
pub mod seed;
pub mod windowing;

// Re-export commonly used types
pub use dynamics::{
    compute_audio_rms, compute_optical_flow, waveform_energy, AudioDynamics, FlowEstimator,
    LucasKanadeFlow, VideoDynamics,
};
pub use health::{capture_health_metrics, capture_sync_metrics, HealthMetrics, SyncMetrics};
pub use scoring::{BatchEventScorer, ScoreSummary, ScoringPolicy};
pub use seed::{
    make_event_uid, EventSeed, MonotonicClock, ProcessClock, SeedEmitter, SeedInput, SeedLog,
    SCHEMA_VERSION,
};
pub use windowing::{plan_windows, Chunk, Chunker, ValenceLabel, WindowPlan};
