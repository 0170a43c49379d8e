//! Native events as the host sees them.

use super::NodeId;
use crate::protocol::{EventProjection, Modifiers};

/// A UI event raised on a display node.
///
/// Carries the host-only [`NodeId`] of its target. Only [`NativeEvent::project`]
/// ever crosses the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeEvent {
    pub kind: String,
    pub target: NodeId,
    pub value: Option<String>,
    pub checked: Option<bool>,
    pub key: Option<String>,
    pub modifiers: Modifiers,
    pub pointer: Option<(i32, i32)>,
}

impl NativeEvent {
    pub fn new(kind: impl Into<String>, target: NodeId) -> Self {
        Self {
            kind: kind.into(),
            target,
            value: None,
            checked: None,
            key: None,
            modifiers: Modifiers::empty(),
            pointer: None,
        }
    }

    pub fn click(target: NodeId) -> Self {
        Self::new("click", target)
    }

    pub fn input(target: NodeId, value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::new("input", target)
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_checked(mut self, checked: bool) -> Self {
        self.checked = Some(checked);
        self
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_pointer(mut self, x: i32, y: i32) -> Self {
        self.pointer = Some((x, y));
        self
    }

    /// The serializable part of the event. The target handle is dropped.
    pub fn project(&self) -> EventProjection {
        EventProjection {
            kind: self.kind.clone(),
            value: self.value.clone(),
            checked: self.checked,
            key: self.key.clone(),
            modifiers: self.modifiers,
            pointer: self.pointer,
        }
    }
}
