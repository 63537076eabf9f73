//! Run-length collapse of repeated input state.

use crate::input::types::ActionEvent;

/// Collapse runs of state-identical consecutive events.
///
/// An event is kept only when its fingerprint differs from the last kept
/// event's fingerprint, so each run keeps its first timestamp. Idempotent.
pub fn deduplicate(events: &[ActionEvent]) -> Vec<ActionEvent> {
    let mut kept: Vec<ActionEvent> = Vec::with_capacity(events.len());
    let mut last = None;

    for event in events {
        let fingerprint = event.fingerprint();
        if last.as_ref() != Some(&fingerprint) {
            kept.push(event.clone());
            last = Some(fingerprint);
        }
    }

    kept
}
