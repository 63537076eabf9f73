//! Per-run processing counters.
//!
//! Counts what a pipeline run consumed and produced so an output folder can
//! be audited without re-reading every record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Counters for one pipeline run.
#[derive(Debug)]
pub struct RunLog {
    run_id: Uuid,
    /// Action records read from the log
    actions_loaded: AtomicU64,
    /// Actions surviving per-window deduplication
    actions_kept: AtomicU64,
    windows_chunked: AtomicU64,
    seeds_emitted: AtomicU64,
    events_detected: AtomicU64,
    run_start: DateTime<Utc>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            actions_loaded: AtomicU64::new(0),
            actions_kept: AtomicU64::new(0),
            windows_chunked: AtomicU64::new(0),
            seeds_emitted: AtomicU64::new(0),
            events_detected: AtomicU64::new(0),
            run_start: Utc::now(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn record_actions_loaded(&self, count: u64) {
        self.actions_loaded.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_actions_kept(&self, count: u64) {
        self.actions_kept.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_window_chunked(&self) {
        self.windows_chunked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_seed_emitted(&self) {
        self.seeds_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_events_detected(&self, count: u64) {
        self.events_detected.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> RunStats {
        RunStats {
            run_id: self.run_id,
            actions_loaded: self.actions_loaded.load(Ordering::Relaxed),
            actions_kept: self.actions_kept.load(Ordering::Relaxed),
            windows_chunked: self.windows_chunked.load(Ordering::Relaxed),
            seeds_emitted: self.seeds_emitted.load(Ordering::Relaxed),
            events_detected: self.events_detected.load(Ordering::Relaxed),
            run_start: self.run_start,
            run_duration_secs: (Utc::now() - self.run_start).num_milliseconds() as f64 / 1000.0,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run {}:\n\
             - Actions loaded: {}\n\
             - Actions kept after dedup: {}\n\
             - Windows chunked: {}\n\
             - Seeds emitted: {}\n\
             - Events detected: {}\n\
             - Duration: {:.1} seconds",
            stats.run_id,
            stats.actions_loaded,
            stats.actions_kept,
            stats.windows_chunked,
            stats.seeds_emitted,
            stats.events_detected,
            stats.run_duration_secs
        )
    }

    /// Write stats as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.stats())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        std::fs::write(path, json)
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub run_id: Uuid,
    pub actions_loaded: u64,
    pub actions_kept: u64,
    pub windows_chunked: u64,
    pub seeds_emitted: u64,
    pub events_detected: u64,
    pub run_start: DateTime<Utc>,
    pub run_duration_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_log_counting() {
        let log = RunLog::new();

        log.record_actions_loaded(10);
        log.record_actions_kept(4);
        log.record_window_chunked();
        log.record_window_chunked();
        log.record_seed_emitted();

        let stats = log.stats();
        assert_eq!(stats.actions_loaded, 10);
        assert_eq!(stats.actions_kept, 4);
        assert_eq!(stats.windows_chunked, 2);
        assert_eq!(stats.seeds_emitted, 1);
        assert_eq!(stats.events_detected, 0);
    }

    #[test]
    fn test_summary_format() {
        let log = RunLog::new();
        let summary = log.summary();

        assert!(summary.contains("Actions loaded"));
        assert!(summary.contains("Seeds emitted"));
        assert!(summary.contains(&log.run_id().to_string()));
    }

    #[test]
    fn test_save_writes_run_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run_stats.json");
        let log = RunLog::new();
        log.record_events_detected(3);
        log.save(&path).unwrap();

        let stats: RunStats = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(stats.run_id, log.run_id());
        assert_eq!(stats.events_detected, 3);
    }
}
