//! EventSeed assembly, validation and persistence.
//!
//! An EventSeed is the self-contained record for one window. Its `start` and
//! `end` live in the emitting process's monotonic clock, not the footage's
//! session time: the Chunk carries when the footage happened, the seed carries
//! when it was emitted.

use crate::core::dynamics::{AudioDynamics, VideoDynamics};
use crate::core::health::{HealthMetrics, SyncMetrics};
use crate::error::{PerceptionError, Result};
use crate::input::semantics::SemanticAction;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::Instant;

/// Schema version written into every seed.
pub const SCHEMA_VERSION: SchemaVersion = SchemaVersion { major: 1, minor: 0 };

/// Value of every seed's `source` field.
pub const SEED_SOURCE: &str = "perception";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaVersion {
    pub major: u32,
    pub minor: u32,
}

/// Input context kept around the window, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionWindow {
    pub pre_ms: u32,
    pub post_ms: u32,
}

/// The persisted record for one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSeed {
    pub event_uid: String,
    pub session_id: String,
    pub schema_version: SchemaVersion,
    /// Wall-clock UTC emission time with nanosecond fraction
    pub created_at: String,
    /// Monotonic-clock seconds at emission
    pub start: f64,
    pub end: f64,
    pub source: String,
    pub video_path: String,
    pub audio_path: String,
    pub actions: Vec<SemanticAction>,
    pub sync: SyncMetrics,
    pub video_dyn: VideoDynamics,
    pub audio_dyn: AudioDynamics,
    pub system: HealthMetrics,
    pub action_window: ActionWindow,
    pub decision_trace: Option<serde_json::Value>,
}

/// Emission parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Nominal seed duration added to the monotonic start
    pub duration_s: f64,
    pub pre_ms: u32,
    pub post_ms: u32,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            duration_s: 2.0,
            pre_ms: 300,
            post_ms: 500,
        }
    }
}

/// Source of monotonic seconds.
pub trait MonotonicClock: Send + Sync {
    fn now_secs(&self) -> f64;
}

/// Seconds since the first read in this process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessClock;

impl MonotonicClock for ProcessClock {
    fn now_secs(&self) -> f64 {
        static ANCHOR: OnceLock<Instant> = OnceLock::new();
        ANCHOR.get_or_init(Instant::now).elapsed().as_secs_f64()
    }
}

/// A clock frozen at one reading.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub f64);

impl MonotonicClock for FixedClock {
    fn now_secs(&self) -> f64 {
        self.0
    }
}

impl<C: MonotonicClock + ?Sized> MonotonicClock for std::sync::Arc<C> {
    fn now_secs(&self) -> f64 {
        (**self).now_secs()
    }
}

/// Everything a seed needs besides its identity and timing.
#[derive(Debug, Clone)]
pub struct SeedInput {
    pub video_path: PathBuf,
    pub audio_path: PathBuf,
    pub actions: Vec<SemanticAction>,
    pub sync: SyncMetrics,
    pub video_dyn: VideoDynamics,
    pub audio_dyn: AudioDynamics,
    pub system: HealthMetrics,
    pub decision_trace: Option<serde_json::Value>,
}

/// Builds validated seeds for one session.
pub struct SeedEmitter {
    session_id: String,
    config: EmitterConfig,
    clock: Box<dyn MonotonicClock>,
}

impl SeedEmitter {
    pub fn new(session_id: impl Into<String>, config: EmitterConfig) -> Self {
        Self {
            session_id: session_id.into(),
            config,
            clock: Box::new(ProcessClock),
        }
    }

    /// Replace the monotonic clock.
    pub fn with_clock(mut self, clock: impl MonotonicClock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Assemble and validate one seed. Nothing is returned on violation.
    pub fn emit(&self, input: SeedInput) -> Result<EventSeed> {
        let start = self.clock.now_secs();
        let end = start + self.config.duration_s;

        let seed = EventSeed {
            event_uid: make_event_uid(&self.session_id, &input.video_path, start, end),
            session_id: self.session_id.clone(),
            schema_version: SCHEMA_VERSION,
            created_at: wall_clock_iso(),
            start,
            end,
            source: SEED_SOURCE.to_string(),
            video_path: input.video_path.display().to_string(),
            audio_path: input.audio_path.display().to_string(),
            actions: input.actions,
            sync: input.sync,
            video_dyn: input.video_dyn,
            audio_dyn: input.audio_dyn,
            system: input.system,
            action_window: ActionWindow {
                pre_ms: self.config.pre_ms,
                post_ms: self.config.post_ms,
            },
            decision_trace: input.decision_trace,
        };

        validate(&seed)?;
        Ok(seed)
    }
}

/// `session|basename|start-end`, times with exactly three decimals.
pub fn make_event_uid(session_id: &str, video_path: &Path, start: f64, end: f64) -> String {
    let media_key = video_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("{session_id}|{media_key}|{start:.3}-{end:.3}")
}

/// Current UTC time as ISO-8601 with nine fractional digits.
pub fn wall_clock_iso() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.9fZ").to_string()
}

/// Check a seed's invariants.
pub fn validate(seed: &EventSeed) -> Result<()> {
    if seed.end < seed.start {
        return Err(PerceptionError::SchemaViolation(format!(
            "end {} < start {}",
            seed.end, seed.start
        )));
    }
    let sync = [
        ("av_ms", seed.sync.av_ms),
        ("ai_ms", seed.sync.ai_ms),
        ("vi_ms", seed.sync.vi_ms),
    ];
    if let Some((key, _)) = sync.iter().find(|(_, v)| v.is_none()) {
        return Err(PerceptionError::SchemaViolation(format!("sync missing {key}")));
    }
    if seed.system.fps.is_none() {
        return Err(PerceptionError::SchemaViolation("system.fps missing".to_string()));
    }
    Ok(())
}

/// Append-only JSONL log of seeds, one object per line.
///
/// Appends are serialized under a lock so concurrent emitters never
/// interleave partial lines.
pub struct SeedLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl SeedLog {
    /// Create a fresh log, truncating any rows a previous run left behind.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Validate and append one seed.
    pub fn append(&self, seed: &EventSeed) -> Result<()> {
        validate(seed)?;
        let line = serde_json::to_string(seed)?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "seed log lock poisoned"))?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Read every seed in a log, in emission order.
    pub fn read_all(path: &Path) -> Result<Vec<EventSeed>> {
        let reader = BufReader::new(File::open(path)?);
        let mut seeds = Vec::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let seed = serde_json::from_str(&line).map_err(|e| {
                PerceptionError::MalformedRecord {
                    line: idx + 1,
                    reason: e.to_string(),
                }
            })?;
            seeds.push(seed);
        }
        Ok(seeds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::health::{capture_health_metrics, capture_sync_metrics};

    fn input(video: &str) -> SeedInput {
        SeedInput {
            video_path: PathBuf::from(video),
            audio_path: PathBuf::from("/some/path/audio.wav"),
            actions: Vec::new(),
            sync: capture_sync_metrics(),
            video_dyn: VideoDynamics::default(),
            audio_dyn: AudioDynamics {
                rms_frames: vec![0.0, 0.0],
                sr: 16_000,
            },
            system: capture_health_metrics(60.0, 0, true, (1920, 1080), "h264", None),
            decision_trace: None,
        }
    }

    fn emitter(at: f64) -> SeedEmitter {
        SeedEmitter::new("session_20250805_162657", EmitterConfig::default())
            .with_clock(FixedClock(at))
    }

    #[test]
    fn test_monotonic_times_and_uid() {
        let seed = emitter(100.0)
            .emit(input("/some/path/chunks/session_video.mp4"))
            .unwrap();

        assert_eq!(seed.start, 100.0);
        assert_eq!(seed.end, 102.0);
        assert_eq!(
            seed.event_uid,
            "session_20250805_162657|session_video.mp4|100.000-102.000"
        );
        assert_eq!(seed.source, "perception");
        assert_eq!(seed.schema_version, SchemaVersion { major: 1, minor: 0 });
        assert_eq!(seed.action_window, ActionWindow { pre_ms: 300, post_ms: 500 });
    }

    #[test]
    fn test_uid_format() {
        let uid = make_event_uid("s", Path::new("a/b/c.mp4"), 1.23456, 3.0);
        assert_eq!(uid, "s|c.mp4|1.235-3.000");

        let (session, rest) = uid.split_once('|').unwrap();
        let (media, range) = rest.split_once('|').unwrap();
        assert_eq!((session, media), ("s", "c.mp4"));
        let (a, b) = range.split_once('-').unwrap();
        for part in [a, b] {
            let (_, frac) = part.split_once('.').unwrap();
            assert_eq!(frac.len(), 3);
        }
    }

    #[test]
    fn test_uid_distinguishes_milliseconds() {
        let a = make_event_uid("s", Path::new("v.mp4"), 10.001, 12.001);
        let b = make_event_uid("s", Path::new("v.mp4"), 10.002, 12.002);
        assert_ne!(a, b);
    }

    #[test]
    fn test_created_at_has_nanoseconds() {
        let seed = emitter(1.0).emit(input("v.mp4")).unwrap();
        let frac = seed
            .created_at
            .trim_end_matches('Z')
            .rsplit_once('.')
            .map(|(_, f)| f.len());
        assert_eq!(frac, Some(9));
        assert!(seed.created_at.ends_with('Z'));
    }

    #[test]
    fn test_missing_sync_key_rejected() {
        for key in ["av_ms", "ai_ms", "vi_ms"] {
            let mut bad = input("v.mp4");
            match key {
                "av_ms" => bad.sync.av_ms = None,
                "ai_ms" => bad.sync.ai_ms = None,
                _ => bad.sync.vi_ms = None,
            }
            let err = emitter(5.0).emit(bad).unwrap_err();
            match err {
                PerceptionError::SchemaViolation(msg) => assert!(msg.contains(key)),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_missing_fps_rejected() {
        let mut bad = input("v.mp4");
        bad.system.fps = None;
        assert!(matches!(
            emitter(5.0).emit(bad),
            Err(PerceptionError::SchemaViolation(_))
        ));
    }

    #[test]
    fn test_negative_duration_rejected() {
        let emitter = SeedEmitter::new(
            "s",
            EmitterConfig {
                duration_s: -1.0,
                ..Default::default()
            },
        )
        .with_clock(FixedClock(10.0));
        assert!(matches!(
            emitter.emit(input("v.mp4")),
            Err(PerceptionError::SchemaViolation(_))
        ));
    }

    #[test]
    fn test_log_appends_one_line_per_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.jsonl");
        let log = SeedLog::create(&path).unwrap();

        let first = emitter(1.0).emit(input("a.mp4")).unwrap();
        let second = emitter(3.0).emit(input("b.mp4")).unwrap();
        log.append(&first).unwrap();
        log.append(&second).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 2);

        let seeds = SeedLog::read_all(&path).unwrap();
        assert_eq!(seeds, vec![first, second]);
    }

    #[test]
    fn test_create_discards_previous_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.jsonl");
        let seed = emitter(1.0).emit(input("a.mp4")).unwrap();

        SeedLog::create(&path).unwrap().append(&seed).unwrap();
        SeedLog::create(&path).unwrap().append(&seed).unwrap();
        assert_eq!(SeedLog::read_all(&path).unwrap().len(), 1);

        let log = SeedLog::create(&path).unwrap();
        assert!(SeedLog::read_all(&path).unwrap().is_empty());
        log.append(&seed).unwrap();
        assert_eq!(SeedLog::read_all(&path).unwrap(), vec![seed]);
    }

    #[test]
    fn test_log_refuses_invalid_seed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seeds.jsonl");
        let log = SeedLog::create(&path).unwrap();

        let mut seed = emitter(1.0).emit(input("a.mp4")).unwrap();
        seed.system.fps = None;
        assert!(log.append(&seed).is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }
}
