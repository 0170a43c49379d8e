//! Serializable projection of a native UI event.
//!
//! Native events can reference host objects (targets, windows, callbacks).
//! Only this projection ever leaves the host.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Modifier keys held while the event fired.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CTRL  = 1 << 1;
        const ALT   = 1 << 2;
        const META  = 1 << 3;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventProjection {
    /// Event type ("click", "input", "keydown", ...).
    pub kind: String,
    /// Current value of an input-like target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked: Option<bool>,
    /// Key name for keyboard events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Modifiers::is_empty")]
    pub modifiers: Modifiers,
    /// Pointer position for mouse events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointer: Option<(i32, i32)>,
}

impl EventProjection {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_projection_is_compact() {
        let json = serde_json::to_string(&EventProjection::new("click")).unwrap();
        assert_eq!(json, r#"{"kind":"click"}"#);
    }

    #[test]
    fn test_modifiers_survive_the_wire() {
        let projection = EventProjection {
            key: Some("Enter".into()),
            modifiers: Modifiers::CTRL | Modifiers::SHIFT,
            ..EventProjection::new("keydown")
        };
        let json = serde_json::to_string(&projection).unwrap();
        let back: EventProjection = serde_json::from_str(&json).unwrap();
        assert_eq!(back, projection);
    }
}
