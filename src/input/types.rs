//! Input action types.
//!
//! An [`ActionEvent`] is one line of the recorded action log: the set of held
//! keys and the pointer state at a point in session time.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Mouse button states in the order the log provided them.
///
/// Order matters: the semantic mapper takes the first pressed, mapped button.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ButtonStates(Vec<(String, bool)>);

impl ButtonStates {
    pub fn new(buttons: Vec<(String, bool)>) -> Self {
        Self(buttons)
    }

    /// Iterate in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, bool)> {
        self.0.iter().map(|(name, down)| (name.as_str(), *down))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Button states sorted by name, for order-independent comparison.
    pub fn sorted(&self) -> Vec<(String, bool)> {
        let mut sorted = self.0.clone();
        sorted.sort();
        sorted
    }
}

impl Serialize for ButtonStates {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, down) in &self.0 {
            map.serialize_entry(name, down)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ButtonStates {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct ButtonVisitor;

        impl<'de> Visitor<'de> for ButtonVisitor {
            type Value = ButtonStates;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of button name to pressed flag")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut buttons = Vec::with_capacity(access.size_hint().unwrap_or(3));
                while let Some((name, down)) = access.next_entry::<String, bool>()? {
                    buttons.push((name, down));
                }
                Ok(ButtonStates(buttons))
            }
        }

        deserializer.deserialize_map(ButtonVisitor)
    }
}

/// Pointer state attached to an action event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MouseState {
    /// Pixel coordinates, if the log recorded them
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<[f64; 2]>,
    /// Button name to pressed flag
    #[serde(default, skip_serializing_if = "ButtonStates::is_empty")]
    pub buttons: ButtonStates,
    /// Scroll delta (dx, dy)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll: Option<[f64; 2]>,
}

/// A single recorded input event. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEvent {
    /// Seconds in the session time base (relative when an origin was supplied)
    #[serde(rename = "ts")]
    pub timestamp: f64,
    /// Held keys in arrival order
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub mouse: MouseState,
}

/// Timestamp-free identity of an event's input state.
#[derive(Debug, Clone, PartialEq)]
pub struct StateFingerprint {
    keys: Vec<String>,
    position: Option<[f64; 2]>,
    buttons: Vec<(String, bool)>,
    scroll: Option<[f64; 2]>,
}

impl ActionEvent {
    pub fn new(timestamp: f64, keys: Vec<String>, mouse: MouseState) -> Self {
        Self {
            timestamp,
            keys,
            mouse,
        }
    }

    /// The state fingerprint used for run-length deduplication.
    pub fn fingerprint(&self) -> StateFingerprint {
        let mut keys = self.keys.clone();
        keys.sort();
        StateFingerprint {
            keys,
            position: self.mouse.position,
            buttons: self.mouse.buttons.sorted(),
            scroll: self.mouse.scroll,
        }
    }

    /// Same event shifted by `offset` seconds.
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            timestamp: self.timestamp + offset,
            ..self.clone()
        }
    }
}
