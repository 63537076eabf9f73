//! Mapping raw input events onto a coarse game-action vocabulary.

use crate::input::types::ActionEvent;
use serde::{Deserialize, Serialize};

/// Semantic actions a raw input can map to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameAction {
    MoveForward,
    MoveLeft,
    MoveBackward,
    MoveRight,
    Interact,
    Jump,
    Inventory,
    ClickPrimary,
    ClickSecondary,
    ClickMiddle,
}

/// Key and button lookup tables.
///
/// Stored as ordered pairs so configuration files stay readable; lookups are
/// by exact name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionVocabulary {
    pub keys: Vec<(String, GameAction)>,
    pub buttons: Vec<(String, GameAction)>,
}

impl Default for ActionVocabulary {
    fn default() -> Self {
        use GameAction::*;
        let keys = [
            ("W", MoveForward),
            ("A", MoveLeft),
            ("S", MoveBackward),
            ("D", MoveRight),
            ("E", Interact),
            ("SPACE", Jump),
            ("I", Inventory),
        ];
        let buttons = [
            ("left", ClickPrimary),
            ("right", ClickSecondary),
            ("middle", ClickMiddle),
        ];
        Self {
            keys: keys.iter().map(|(k, a)| (k.to_string(), *a)).collect(),
            buttons: buttons.iter().map(|(b, a)| (b.to_string(), *a)).collect(),
        }
    }
}

impl ActionVocabulary {
    pub fn key_action(&self, key: &str) -> Option<GameAction> {
        self.keys.iter().find(|(k, _)| k == key).map(|(_, a)| *a)
    }

    pub fn button_action(&self, button: &str) -> Option<GameAction> {
        self.buttons.iter().find(|(b, _)| b == button).map(|(_, a)| *a)
    }
}

/// An action event annotated with its semantic interpretation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticAction {
    #[serde(rename = "ts")]
    pub timestamp: f64,
    pub raw: ActionEvent,
    pub action: Option<GameAction>,
    pub valid_for_game: bool,
    /// Pointer position scaled to the unit square, always clamped to [0, 1]
    pub mouse_norm: [f64; 2],
}

/// Classifies raw events and normalizes pointer positions.
#[derive(Debug, Clone)]
pub struct ActionMapper {
    vocabulary: ActionVocabulary,
    resolution: (f64, f64),
}

impl ActionMapper {
    /// Create a mapper for a capture of `resolution` (width, height) pixels.
    ///
    /// Non-positive dimensions are treated as 1.
    pub fn new(vocabulary: ActionVocabulary, resolution: (u32, u32)) -> Self {
        let axis = |v: u32| if v == 0 { 1.0 } else { v as f64 };
        Self {
            vocabulary,
            resolution: (axis(resolution.0), axis(resolution.1)),
        }
    }

    /// Classify one event.
    ///
    /// Keys are checked first, in the order they arrived; the first key with a
    /// mapping wins. That tie-break is arbitrary and not canonicalized. Failing
    /// that, the first pressed and mapped button wins, in the log's order.
    pub fn classify(&self, event: &ActionEvent) -> Option<GameAction> {
        event
            .keys
            .iter()
            .find_map(|k| self.vocabulary.key_action(k))
            .or_else(|| {
                event
                    .mouse
                    .buttons
                    .iter()
                    .filter(|(_, down)| *down)
                    .find_map(|(b, _)| self.vocabulary.button_action(b))
            })
    }

    /// Pointer position divided by resolution, clamped per axis.
    pub fn normalize_pointer(&self, event: &ActionEvent) -> [f64; 2] {
        let [x, y] = event.mouse.position.unwrap_or([0.0, 0.0]);
        [
            (x / self.resolution.0).clamp(0.0, 1.0),
            (y / self.resolution.1).clamp(0.0, 1.0),
        ]
    }

    pub fn map(&self, event: &ActionEvent) -> SemanticAction {
        let action = self.classify(event);
        SemanticAction {
            timestamp: event.timestamp,
            raw: event.clone(),
            action,
            valid_for_game: action.is_some(),
            mouse_norm: self.normalize_pointer(event),
        }
    }

    pub fn map_all(&self, events: &[ActionEvent]) -> Vec<SemanticAction> {
        events.iter().map(|e| self.map(e)).collect()
    }
}
