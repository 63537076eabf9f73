//! Best-effort AV sync and capture-health metadata.
//!
//! No hardware sync beacon exists yet, so sync offsets are always reported as
//! zero and not estimated.

use serde::{Deserialize, Serialize};

/// Skew estimates between audio, video and input clocks.
///
/// Every field the emitter requires is optional here so a record that lacks
/// one can be detected and rejected instead of silently defaulted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncMetrics {
    /// Audio-video offset in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub av_ms: Option<f64>,
    /// Audio-input offset in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_ms: Option<f64>,
    /// Video-input offset in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vi_ms: Option<f64>,
    pub beacon_id: Option<String>,
    /// Whether the offsets were measured rather than defaulted
    pub estimated: bool,
}

/// Capture-health metadata for a window's video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    pub dropped_frames: u32,
    pub window_focused: bool,
    pub resolution: [u32; 2],
    pub codec: String,
    pub crf: Option<u32>,
}

/// Sync offsets when no beacon is available: all zero, not estimated.
pub fn capture_sync_metrics() -> SyncMetrics {
    SyncMetrics {
        av_ms: Some(0.0),
        ai_ms: Some(0.0),
        vi_ms: Some(0.0),
        beacon_id: None,
        estimated: false,
    }
}

/// Fill a health record from what the clip reports.
pub fn capture_health_metrics(
    fps: f64,
    dropped_frames: u32,
    window_focused: bool,
    resolution: (u32, u32),
    codec: &str,
    crf: Option<u32>,
) -> HealthMetrics {
    HealthMetrics {
        fps: Some(fps),
        dropped_frames,
        window_focused,
        resolution: [resolution.0, resolution.1],
        codec: codec.to_string(),
        crf,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_sync_is_zero_and_not_estimated() {
        let sync = capture_sync_metrics();
        assert_eq!(sync.av_ms, Some(0.0));
        assert_eq!(sync.ai_ms, Some(0.0));
        assert_eq!(sync.vi_ms, Some(0.0));
        assert!(!sync.estimated);

        let json = serde_json::to_value(&sync).unwrap();
        for key in ["av_ms", "ai_ms", "vi_ms", "beacon_id", "estimated"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }

    #[test]
    fn test_absent_offsets_are_omitted() {
        let json = serde_json::to_value(SyncMetrics::default()).unwrap();
        assert!(json.get("av_ms").is_none());
    }

    #[test]
    fn test_health_metrics() {
        let health = capture_health_metrics(60.0, 0, true, (1920, 1080), "h264", None);
        assert_eq!(health.fps, Some(60.0));
        assert_eq!(health.resolution, [1920, 1080]);
        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["codec"], "h264");
        assert!(json["crf"].is_null());
    }
}
