//! View-state patches and keyed list reconciliation.
//!
//! A [`Patch`] is scoped to one coordinate: `fields` are the scalar view-state
//! values that changed in that scope, `lists` are the structural changes of
//! the keyed groups that live directly in it.
//!
//! # Keyed list diff
//!
//! [`diff_keys`] turns an old key order into a new one with three operations,
//! emitted in a fixed order so the host can replay them blindly:
//!
//! 1. `Remove` every key that disappeared
//! 2. walk the new order left to right; a key already at its index is left
//!    alone, an existing key elsewhere is `Move`d, a new key is `Insert`ed
//!
//! Replaying the ops with [`apply_list_ops`] on the old order always yields the
//! new order. Existing keys are never re-created.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::Generation;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lists: Vec<ListChange>,
}

impl Patch {
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.lists.is_empty()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Structural change of one keyed group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListChange {
    /// Name of the keyed group (its nested reference scope).
    pub scope: String,
    pub ops: Vec<ListOp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ListOp {
    Remove { key: String },
    Insert { key: String, index: usize, generation: Generation },
    Move { key: String, index: usize },
}

impl ListOp {
    pub fn key(&self) -> &str {
        match self {
            ListOp::Remove { key } | ListOp::Insert { key, .. } | ListOp::Move { key, .. } => key,
        }
    }
}

/// Compute the ops that turn `old` into `new`.
///
/// `mount` is called once per inserted key, in insertion order, and returns
/// the generation the new item was mounted with.
pub fn diff_keys(
    old: &[String],
    new: &[String],
    mut mount: impl FnMut(&str) -> Generation,
) -> Vec<ListOp> {
    let kept: HashSet<&str> = new.iter().map(String::as_str).collect();
    let mut ops = Vec::new();

    for key in old.iter().filter(|key| !kept.contains(key.as_str())) {
        ops.push(ListOp::Remove { key: key.clone() });
    }

    let mut working: Vec<&str> = old
        .iter()
        .map(String::as_str)
        .filter(|key| kept.contains(key))
        .collect();

    for (index, key) in new.iter().enumerate() {
        if working.get(index) == Some(&key.as_str()) {
            continue;
        }
        match working.iter().position(|existing| *existing == key.as_str()) {
            Some(from) => {
                working.remove(from);
                working.insert(index, key.as_str());
                ops.push(ListOp::Move {
                    key: key.clone(),
                    index,
                });
            }
            None => {
                working.insert(index, key.as_str());
                ops.push(ListOp::Insert {
                    key: key.clone(),
                    index,
                    generation: mount(key),
                });
            }
        }
    }

    ops
}

/// Replay `ops` on `keys` in place.
pub fn apply_list_ops(keys: &mut Vec<String>, ops: &[ListOp]) {
    for op in ops {
        match op {
            ListOp::Remove { key } => keys.retain(|existing| existing != key),
            ListOp::Insert { key, index, .. } => {
                let index = (*index).min(keys.len());
                keys.insert(index, key.clone());
            }
            ListOp::Move { key, index } => {
                if let Some(from) = keys.iter().position(|existing| existing == key) {
                    let moved = keys.remove(from);
                    let index = (*index).min(keys.len());
                    keys.insert(index, moved);
                }
            }
        }
    }
}
