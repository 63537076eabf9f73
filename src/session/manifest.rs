//! The per-session manifest and events output.

use crate::config::ClockAlignment;
use crate::core::windowing::Chunk;
use crate::error::{PerceptionError, Result};
use chrono::{DateTime, NaiveDateTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the manifest inside a session directory.
pub const MANIFEST_FILE: &str = "session.json";

/// File name of the scored chunk list inside a session directory.
pub const EVENTS_FILE: &str = "session_events.json";

/// File name of the unscored chunk list inside a session directory.
pub const CHUNKS_FILE: &str = "chunks.json";

/// Recorder start-string layout.
const START_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// When the recording started, as written by the upstream recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StartTime {
    /// Epoch seconds
    Epoch(f64),
    /// `YYYY-MM-DD_HH-MM-SS` local to the configured zone, or RFC 3339
    Text(String),
}

impl StartTime {
    /// Epoch seconds, reading a `YYYY-MM-DD_HH-MM-SS` string in `tz`.
    pub fn to_epoch(&self, tz: Tz) -> Result<f64> {
        match self {
            StartTime::Epoch(secs) => Ok(*secs),
            StartTime::Text(text) => {
                if let Ok(naive) = NaiveDateTime::parse_from_str(text, START_TIME_FORMAT) {
                    let local = naive.and_local_timezone(tz).earliest().ok_or_else(|| {
                        PerceptionError::InvalidManifest(format!(
                            "start_time '{text}' does not exist in {tz}"
                        ))
                    })?;
                    return Ok(local.timestamp() as f64);
                }
                DateTime::parse_from_rfc3339(text)
                    .map(|dt| dt.timestamp_millis() as f64 / 1000.0)
                    .map_err(|_| {
                        PerceptionError::InvalidManifest(format!(
                            "unrecognized start_time '{text}'"
                        ))
                    })
            }
        }
    }
}

/// Session metadata, its chunks, and where its seeds went.
///
/// Fields written by other tools are kept as-is in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionManifest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<StartTime>,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeds_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl SessionManifest {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(PerceptionError::InputNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            PerceptionError::InvalidManifest(format!("{}: {e}", path.display()))
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        write_json(path, self)
    }

    /// Stream-start epoch derived from `start_time`, with the configured
    /// correction applied. `None` when the manifest has no start time.
    pub fn stream_start(&self, clock: &ClockAlignment) -> Result<Option<f64>> {
        let Some(start_time) = &self.start_time else {
            return Ok(None);
        };
        let epoch = start_time.to_epoch(clock.time_zone()?)?;
        if clock.start_time_offset_secs != 0.0 {
            tracing::warn!(
                offset_secs = clock.start_time_offset_secs,
                "Applying configured start-time offset; manifest and action-log clocks disagree"
            );
        }
        Ok(Some(epoch + clock.start_time_offset_secs))
    }
}

/// Write the scored chunk list.
pub fn write_events(path: &Path, chunks: &[Chunk]) -> Result<()> {
    write_json(path, &chunks)
}

/// Read a scored chunk list written by [`write_events`].
pub fn read_events(path: &Path) -> Result<Vec<Chunk>> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

pub(crate) fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_start_time_string_in_zone() {
        let start = StartTime::Text("2025-08-01_20-12-27".into());
        assert_eq!(start.to_epoch(chrono_tz::UTC).unwrap(), 1_754_079_147.0);
        // Four hours behind UTC in summer
        let ny = start.to_epoch(chrono_tz::America::New_York).unwrap();
        assert_eq!(ny - 1_754_079_147.0, 14_400.0);
    }

    #[test]
    fn test_start_time_epoch_and_rfc3339() {
        assert_eq!(StartTime::Epoch(12.5).to_epoch(chrono_tz::UTC).unwrap(), 12.5);
        let iso = StartTime::Text("2025-08-01T20:12:27Z".into());
        assert_eq!(iso.to_epoch(chrono_tz::UTC).unwrap(), 1_754_079_147.0);
        assert!(StartTime::Text("yesterday".into())
            .to_epoch(chrono_tz::UTC)
            .is_err());
    }

    #[test]
    fn test_stream_start_applies_offset() {
        let manifest: SessionManifest =
            serde_json::from_value(json!({"session_id": "s", "start_time": 1000})).unwrap();
        let mut clock = ClockAlignment::default();
        assert_eq!(manifest.stream_start(&clock).unwrap(), Some(1000.0));
        clock.start_time_offset_secs = 14_400.0;
        assert_eq!(manifest.stream_start(&clock).unwrap(), Some(15_400.0));

        let bare = SessionManifest::new("s");
        assert_eq!(bare.stream_start(&clock).unwrap(), None);
    }

    #[test]
    fn test_manifest_preserves_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_FILE);
        std::fs::write(
            &path,
            r#"{"session_id": "s1", "start_time": "2025-08-01_20-12-27", "duration": 61.5, "notes": ""}"#,
        )
        .unwrap();

        let mut manifest = SessionManifest::load(&path).unwrap();
        assert_eq!(manifest.extra["duration"], json!(61.5));
        manifest.run_id = Some("r".into());
        manifest.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["duration"], json!(61.5));
        assert_eq!(raw["start_time"], json!("2025-08-01_20-12-27"));
        assert_eq!(raw["run_id"], json!("r"));
        assert_eq!(raw["chunks"], json!([]));
    }

    #[test]
    fn test_events_file_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(EVENTS_FILE);
        let window = crate::core::windowing::WindowPlan {
            index: 3,
            start: 6.0,
            end: 8.0,
        };
        let mut chunk = Chunk::new(&window, "chunk_0003.mp4".into(), "chunk_0003.wav".into(), Vec::new());
        chunk.event_score = Some(0.72);
        chunk.is_event = true;

        write_events(&path, std::slice::from_ref(&chunk)).unwrap();
        assert_eq!(read_events(&path).unwrap(), vec![chunk]);
    }

    #[test]
    fn test_missing_manifest() {
        assert!(matches!(
            SessionManifest::load(Path::new("/nonexistent/session.json")),
            Err(PerceptionError::InputNotFound(_))
        ));
    }
}
