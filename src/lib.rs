//! Aethermind Perception - temporal alignment of recorded play sessions.
//!
//! Takes a screen recording, its audio track and a time-stamped input-action
//! log, cuts them into fixed windows, and emits one schema-validated
//! EventSeed per window. A second whole-session pass scores every window for
//! motion and loudness and flags the salient ones as events.
//!
//! # Time domains
//!
//! - **Session time**: chunk `start`/`end`, absolute seconds from the stream
//!   origin (epoch seconds when a stream start is known, else 0-based).
//! - **Emission time**: seed `start`/`end`, read from a process-local
//!   monotonic clock when the seed is built.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Aethermind Perception                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │ Action log  │──▶│   Chunker   │──▶│  EventSeed  │──▶ seeds.jsonl
//! │  │ dedup / map │   │  (windows)  │   │   Emitter   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                      │        ▲              ▲              │
//! │                      ▼        │              │              │
//! │               ┌─────────────┐ │      ┌─────────────┐       │
//! │               │    Media    │─┘      │  Dynamics   │       │
//! │               │   backend   │───────▶│ sync/health │       │
//! │               └─────────────┘        └─────────────┘       │
//! │                      │                                      │
//! │                      ▼                                      │
//! │               ┌─────────────┐                               │
//! │               │ Batch event │──▶ session_events.json        │
//! │               │   scorer    │                               │
//! │               └─────────────┘                               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use aethermind_perception::{config::Config, media::FfmpegBackend, session};
//!
//! let backend = FfmpegBackend::default();
//! let runner = session::SessionRunner::new(Config::default(), &backend);
//! let inputs = session::SessionInputs::resolve(
//!     Some(std::path::Path::new("recordings/run_01")),
//!     None,
//!     None,
//!     None,
//! )?;
//! let report = runner.run(&inputs, &session::RunOptions::default())?;
//! println!("{} events", report.summary.events);
//! # Ok::<(), aethermind_perception::PerceptionError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod input;
pub mod media;
pub mod memory;
pub mod session;
pub mod transparency;

// Re-export key types at crate root for convenience
pub use config::{ClockAlignment, Config, ConfigError};
pub use core::{Chunk, EventSeed, ScoringPolicy, SeedEmitter};
pub use error::{PerceptionError, Result};
pub use input::{ActionEvent, SemanticAction};
pub use media::{FfmpegBackend, MediaBackend};
pub use session::{SessionManifest, SessionRunner};
pub use transparency::{RunLog, RunStats};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
