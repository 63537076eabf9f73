//! Media decoding and cutting.
//!
//! The pipeline never decodes media itself; it talks to a [`MediaBackend`].
//! [`FfmpegBackend`] shells out to `ffprobe`/`ffmpeg`, tests use in-memory
//! fakes.

pub mod ffmpeg;

pub use ffmpeg::FfmpegBackend;

use crate::error::Result;
use image::GrayImage;
use std::path::Path;

/// Stream properties reported by a probe.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Duration in seconds
    pub duration_s: f64,
    /// Number of video frames (0 when unknown or audio-only)
    pub frame_count: u64,
    /// Nominal frame rate
    pub fps: f64,
    pub width: u32,
    pub height: u32,
    /// Codec identifier, e.g. "h264"
    pub codec: String,
}

/// Evenly spaced grayscale frames sampled from a clip.
#[derive(Debug, Clone)]
pub struct SampledFrames {
    pub frames: Vec<GrayImage>,
    /// Source frame index of each sample
    pub indices: Vec<u64>,
    pub info: MediaInfo,
}

/// Decoded mono audio.
#[derive(Debug, Clone, Default)]
pub struct Waveform {
    /// Samples in [-1, 1]
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// External media collaborator: probing, cutting, and decoding.
pub trait MediaBackend: Send + Sync {
    /// Report duration, frame count, frame rate, resolution and codec.
    fn probe(&self, video: &Path) -> Result<MediaInfo>;

    /// Write the video-only sub-clip `[start, end)` (seconds from clip start).
    fn cut_video(&self, src: &Path, start: f64, end: f64, out: &Path) -> Result<()>;

    /// Write the audio-only sub-clip `[start, end)` as PCM WAV.
    fn cut_audio(&self, src: &Path, start: f64, end: f64, out: &Path) -> Result<()>;

    /// Decode up to `max_frames` frames spread evenly across the clip.
    fn sample_frames(&self, video: &Path, max_frames: usize) -> Result<SampledFrames>;

    /// Decode the whole clip as mono samples.
    fn read_waveform(&self, audio: &Path) -> Result<Waveform>;
}

/// Indices of up to `max_frames` frames spread evenly over `total` frames,
/// always including the first and last frame.
pub fn even_frame_indices(total: u64, max_frames: usize) -> Vec<u64> {
    let take = (max_frames as u64).min(total);
    if take == 0 {
        return Vec::new();
    }
    let span = (take - 1).max(1);
    (0..take).map(|i| i * (total - 1) / span).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_even_indices_cover_clip() {
        assert_eq!(even_frame_indices(60, 4), vec![0, 19, 39, 59]);
        assert_eq!(even_frame_indices(3, 12), vec![0, 1, 2]);
    }

    #[test]
    fn test_even_indices_degenerate() {
        assert!(even_frame_indices(0, 12).is_empty());
        assert!(even_frame_indices(10, 0).is_empty());
        assert_eq!(even_frame_indices(1, 12), vec![0]);
        assert_eq!(even_frame_indices(50, 1), vec![0]);
    }
}
