//! Configuration for the perception pipeline.

use crate::core::dynamics::{FlowConfig, RmsConfig};
use crate::core::scoring::ScoringPolicy;
use crate::core::seed::EmitterConfig;
use crate::input::semantics::ActionVocabulary;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Main configuration for a perception run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Length of each window
    #[serde(with = "duration_serde")]
    pub chunk_duration: Duration,

    /// Root directory for session output folders
    pub output_dir: PathBuf,

    /// Frames sampled per window for motion statistics
    pub max_sampled_frames: usize,

    /// Worker threads for the scoring pass (1 = inline)
    pub workers: usize,

    /// Key and button to action tables
    pub vocabulary: ActionVocabulary,

    pub emitter: EmitterConfig,
    pub scoring: ScoringPolicy,
    pub audio: RmsConfig,
    pub flow: FlowConfig,
    pub clock: ClockAlignment,

    /// Used when a clip cannot report its resolution
    pub fallback_resolution: (u32, u32),

    /// Used when a clip cannot report its frame rate
    pub fallback_fps: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_duration: Duration::from_secs(2),
            output_dir: PathBuf::from("chunks"),
            max_sampled_frames: 12,
            workers: 1,
            vocabulary: ActionVocabulary::default(),
            emitter: EmitterConfig::default(),
            scoring: ScoringPolicy::default(),
            audio: RmsConfig::default(),
            flow: FlowConfig::default(),
            clock: ClockAlignment::default(),
            fallback_resolution: (1920, 1080),
            fallback_fps: 30.0,
        }
    }
}

impl Config {
    /// Load configuration from the default location, or defaults if absent.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit file, or defaults if absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&content)
                .map_err(|e| ConfigError::Parse(e.to_string()))?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("aethermind-perception")
            .join("config.json")
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_duration.is_zero() {
            return Err(ConfigError::Invalid("chunk_duration must be positive".into()));
        }
        if self.emitter.duration_s < 0.0 {
            return Err(ConfigError::Invalid("emitter.duration_s must not be negative".into()));
        }
        if self.audio.frame_length == 0 || self.audio.hop_length == 0 {
            return Err(ConfigError::Invalid("audio frame and hop lengths must be positive".into()));
        }
        self.clock.time_zone()?;
        Ok(())
    }
}

/// Corrections between the clocks of the upstream recorders.
///
/// The session manifest's start string and the action log have been observed
/// to disagree by a fixed timezone offset. Nothing here assumes a value: the
/// offsets default to zero and must be set explicitly for a recorder that
/// needs them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockAlignment {
    /// IANA timezone the `YYYY-MM-DD_HH-MM-SS` start string is written in
    pub start_time_zone: String,
    /// Seconds added to a manifest-derived stream start
    pub start_time_offset_secs: f64,
    /// Seconds added to feature-vector timestamps before joining them to chunks
    pub vector_offset_secs: f64,
}

impl Default for ClockAlignment {
    fn default() -> Self {
        Self {
            start_time_zone: "UTC".to_string(),
            start_time_offset_secs: 0.0,
            vector_offset_secs: 0.0,
        }
    }
}

impl ClockAlignment {
    pub fn time_zone(&self) -> Result<Tz, ConfigError> {
        self.start_time_zone
            .parse::<Tz>()
            .map_err(|_| ConfigError::Invalid(format!("unknown timezone '{}'", self.start_time_zone)))
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Serde support for Duration as fractional seconds.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chunk_duration, Duration::from_secs(2));
        assert_eq!(config.max_sampled_frames, 12);
        assert_eq!(config.scoring.threshold, 0.3);
        assert_eq!(config.clock.start_time_offset_secs, 0.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"chunk_duration": 0.5, "clock": {"start_time_offset_secs": 14400}}"#)
                .unwrap();
        assert_eq!(config.chunk_duration, Duration::from_millis(500));
        assert_eq!(config.clock.start_time_offset_secs, 14400.0);
        assert_eq!(config.clock.start_time_zone, "UTC");
        assert_eq!(config.emitter.duration_s, 2.0);
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        let mut config = Config::default();
        config.clock.start_time_zone = "Mars/Olympus".into();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.clock.start_time_zone = "America/New_York".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_missing_file_uses_defaults() {
        let config = Config::load_from(Path::new("/nonexistent/config.json")).unwrap();
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut config = Config::default();
        config.workers = 4;
        config.scoring.threshold = 0.5;
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.workers, 4);
        assert_eq!(loaded.scoring.threshold, 0.5);
    }
}
