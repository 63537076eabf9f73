//! Fixed-duration windowing of a session timeline.
//!
//! Windows are laid out on an absolute time axis starting at the session
//! origin (the stream-start epoch, or 0 for purely relative chunking). Each
//! window gets its own video and audio sub-clip and the deduplicated input
//! events whose absolute timestamp falls inside it.

use crate::error::Result;
use crate::input::dedup::deduplicate;
use crate::input::semantics::SemanticAction;
use crate::input::types::ActionEvent;
use crate::media::{MediaBackend, MediaInfo};
use crate::memory::Valence;
use crate::session::merge::FeatureVector;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Windows shorter than this at the end of a session are rounding residue.
const MIN_WINDOW_SECS: f64 = 1e-6;

/// One window of the session, in absolute seconds.
///
/// Structural fields are set by the chunker; score fields are filled later by
/// the batch scorer once every window exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    #[serde(default)]
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
    #[serde(default = "default_source")]
    pub source: String,
    /// `None` until a predictor has judged the chunk
    #[serde(default)]
    pub valence: Option<ValenceLabel>,
    #[serde(default)]
    pub annotations: serde_json::Map<String, serde_json::Value>,
    /// Actions with `start <= ts < end`, deduplicated, absolute timestamps
    #[serde(default)]
    pub actions: Vec<SemanticAction>,
    #[serde(default)]
    pub raw_motion: Option<f64>,
    #[serde(default)]
    pub raw_energy: Option<f64>,
    #[serde(default)]
    pub event_score: Option<f64>,
    #[serde(default)]
    pub is_event: bool,
    /// Feature vectors joined in by midpoint timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vectors: Option<Vec<FeatureVector>>,
    /// Fields written by other tools, kept as-is
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A chunk's valence as stored on disk.
///
/// Records written by other tools may hold a placeholder such as `"unknown"`;
/// it is carried through unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValenceLabel {
    Judged(Valence),
    Placeholder(String),
}

fn default_source() -> String {
    crate::core::seed::SEED_SOURCE.to_string()
}

impl Chunk {
    /// Create an unscored chunk.
    pub fn new(
        window: &WindowPlan,
        video_path: PathBuf,
        audio_path: PathBuf,
        actions: Vec<SemanticAction>,
    ) -> Self {
        Self {
            index: window.index,
            start: window.start,
            end: window.end,
            video_path,
            audio_path,
            source: default_source(),
            valence: None,
            annotations: serde_json::Map::new(),
            actions,
            raw_motion: None,
            raw_energy: None,
            event_score: None,
            is_event: false,
            vectors: None,
            extra: serde_json::Map::new(),
        }
    }

    /// The predicted valence, ignoring placeholders.
    pub fn judged_valence(&self) -> Option<Valence> {
        match self.valence {
            Some(ValenceLabel::Judged(valence)) => Some(valence),
            _ => None,
        }
    }

    /// Check if an absolute timestamp falls within this chunk.
    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    pub fn duration_secs(&self) -> f64 {
        self.end - self.start
    }
}

/// A planned window before any media has been cut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowPlan {
    pub index: usize,
    /// Absolute seconds
    pub start: f64,
    pub end: f64,
}

impl WindowPlan {
    /// Offsets of this window from the start of the source media.
    pub fn relative_to(&self, origin: f64) -> (f64, f64) {
        (self.start - origin, self.end - origin)
    }

    pub fn contains(&self, timestamp: f64) -> bool {
        timestamp >= self.start && timestamp < self.end
    }
}

/// Partition `[origin, origin + total_duration)` into consecutive windows.
///
/// The last window is shorter when the duration does not divide evenly. A
/// non-positive duration or window length gives no windows.
pub fn plan_windows(origin: f64, total_duration: f64, window: f64) -> Vec<WindowPlan> {
    if !(total_duration > 0.0) || !(window > 0.0) {
        return Vec::new();
    }

    let session_end = origin + total_duration;
    let mut windows = Vec::new();
    let mut index = 0usize;
    loop {
        // Index arithmetic keeps window edges free of accumulated drift
        let start = origin + index as f64 * window;
        if session_end - start <= MIN_WINDOW_SECS {
            break;
        }
        let end = (origin + (index + 1) as f64 * window).min(session_end);
        windows.push(WindowPlan { index, start, end });
        index += 1;
    }
    windows
}

/// Events whose absolute time falls in the window, deduplicated, with
/// timestamps rebuilt to absolute form.
///
/// `origin` is the offset that was subtracted when the log was loaded.
pub fn window_actions(
    events: &[ActionEvent],
    origin: Option<f64>,
    window: &WindowPlan,
) -> Vec<ActionEvent> {
    let offset = origin.unwrap_or(0.0);
    let in_window: Vec<ActionEvent> = events
        .iter()
        .filter(|e| window.contains(e.timestamp + offset))
        .cloned()
        .collect();

    deduplicate(&in_window)
        .into_iter()
        .map(|e| e.shifted(offset))
        .collect()
}

/// Cuts a session's media into per-window sub-clips.
pub struct Chunker<'a> {
    backend: &'a dyn MediaBackend,
    chunk_duration: Duration,
}

impl<'a> Chunker<'a> {
    pub fn new(backend: &'a dyn MediaBackend, chunk_duration: Duration) -> Self {
        Self {
            backend,
            chunk_duration,
        }
    }

    /// Plan windows for a probed video. Zero duration or zero frames gives none.
    pub fn plan(&self, origin: Option<f64>, info: &MediaInfo) -> Vec<WindowPlan> {
        if info.frame_count == 0 || info.duration_s <= 0.0 {
            tracing::warn!(
                duration_s = info.duration_s,
                frame_count = info.frame_count,
                "Video has no content, producing no windows"
            );
            return Vec::new();
        }
        plan_windows(
            origin.unwrap_or(0.0),
            info.duration_s,
            self.chunk_duration.as_secs_f64(),
        )
    }

    /// Write the window's video-only and audio-only sub-clips into `out_dir`.
    pub fn materialize(
        &self,
        window: &WindowPlan,
        origin: Option<f64>,
        video_src: &Path,
        audio_src: &Path,
        out_dir: &Path,
    ) -> Result<(PathBuf, PathBuf)> {
        let base = format!("chunk_{:04}", window.index);
        let video_out = out_dir.join(format!("{base}.mp4"));
        let audio_out = out_dir.join(format!("{base}.wav"));

        let (rel_start, rel_end) = window.relative_to(origin.unwrap_or(0.0));
        self.backend
            .cut_video(video_src, rel_start, rel_end, &video_out)?;
        self.backend
            .cut_audio(audio_src, rel_start, rel_end, &audio_out)?;

        tracing::debug!(
            index = window.index,
            rel_start,
            rel_end,
            "Materialized window media"
        );
        Ok((video_out, audio_out))
    }
}
