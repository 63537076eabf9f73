//! Input action handling.
//!
//! This module turns a recorded action log into semantic, deduplicated
//! action sequences:
//! - Loading and rebasing the time-stamped log
//! - Collapsing runs of identical input state
//! - Mapping keys and buttons to game actions

pub mod dedup;
pub mod loader;
pub mod semantics;
pub mod types;

// Re-export commonly used types
pub use dedup::deduplicate;
pub use loader::{load_action_log, parse_action_log};
pub use semantics::{ActionMapper, ActionVocabulary, GameAction, SemanticAction};
pub use types::{ActionEvent, ButtonStates, MouseState, StateFingerprint};
