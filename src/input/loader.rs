//! Action log loading.
//!
//! The log holds one JSON object per line with an epoch `time` in seconds and
//! optional `keys` / `mouse` fields. Loading is all-or-nothing: the first
//! unparseable line aborts the session.

use crate::error::{PerceptionError, Result};
use crate::input::types::{ActionEvent, MouseState};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// A log line as written by the recorder.
#[derive(Debug, Deserialize)]
struct RawActionRecord {
    time: f64,
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    mouse: MouseState,
}

/// Load an action log from disk.
///
/// When `session_origin` is given every timestamp is rebased to
/// `time - session_origin`; otherwise timestamps pass through unchanged.
pub fn load_action_log(path: &Path, session_origin: Option<f64>) -> Result<Vec<ActionEvent>> {
    if !path.exists() {
        return Err(PerceptionError::InputNotFound(path.to_path_buf()));
    }
    let file = File::open(path)?;
    let events = parse_action_log(BufReader::new(file), session_origin)?;

    tracing::debug!(
        path = %path.display(),
        count = events.len(),
        first_ts = events.first().map(|e| e.timestamp),
        last_ts = events.last().map(|e| e.timestamp),
        "Loaded action log"
    );
    Ok(events)
}

/// Parse action log lines from any buffered reader.
///
/// Blank lines are skipped; line numbers in errors are 1-based.
pub fn parse_action_log<R: BufRead>(
    reader: R,
    session_origin: Option<f64>,
) -> Result<Vec<ActionEvent>> {
    let mut events = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let raw: RawActionRecord =
            serde_json::from_str(&line).map_err(|e| PerceptionError::MalformedRecord {
                line: idx + 1,
                reason: e.to_string(),
            })?;

        let timestamp = match session_origin {
            Some(origin) => raw.time - origin,
            None => raw.time,
        };
        events.push(ActionEvent::new(timestamp, raw.keys, raw.mouse));
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const LOG: &str = r#"{"time": 1000.5, "keys": ["W"], "mouse": {"position": [10, 20], "buttons": {"left": false}, "scroll": [0, 0]}}
{"time": 1001.0}

{"time": 1001.25, "keys": ["SPACE", "W"]}
"#;

    #[test]
    fn test_parse_defaults_and_order() {
        let events = parse_action_log(Cursor::new(LOG), None).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].timestamp, 1000.5);
        assert_eq!(events[0].mouse.position, Some([10.0, 20.0]));
        assert!(events[1].keys.is_empty());
        assert_eq!(events[1].mouse, MouseState::default());
        assert_eq!(events[2].keys, vec!["SPACE", "W"]);
    }

    #[test]
    fn test_parse_rebases_on_origin() {
        let events = parse_action_log(Cursor::new(LOG), Some(1000.0)).unwrap();
        let ts: Vec<f64> = events.iter().map(|e| e.timestamp).collect();
        assert_eq!(ts, vec![0.5, 1.0, 1.25]);
    }

    #[test]
    fn test_malformed_line_aborts() {
        let log = "{\"time\": 1.0}\nnot json\n{\"time\": 2.0}\n";
        let err = parse_action_log(Cursor::new(log), None).unwrap_err();
        match err {
            PerceptionError::MalformedRecord { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_time_is_malformed() {
        let err = parse_action_log(Cursor::new("{\"keys\": []}\n"), None).unwrap_err();
        assert!(matches!(err, PerceptionError::MalformedRecord { line: 1, .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = load_action_log(Path::new("/nonexistent/actions.jsonl"), None).unwrap_err();
        assert!(matches!(err, PerceptionError::InputNotFound(_)));
    }
}
