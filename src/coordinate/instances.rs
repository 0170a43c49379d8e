//! Instance-generation table.
//!
//! The only mutable addressing state on either side. Reference tables are
//! frozen after construction; everything that changes at runtime (keyed items
//! added, removed, reused; child components mounted and unmounted) goes
//! through here.
//!
//! Entries are keyed by coordinate but validated by generation. A key that is
//! removed and re-added gets a fresh generation, so an in-flight message for
//! the old instance is recognised as stale even though its path string is
//! identical.

use std::collections::HashMap;

use super::Coordinate;
use crate::error::{BridgeError, Result};
use crate::types::Generation;

/// What kind of scope a coordinate names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Root of a component instance.
    Component,
    /// One item of a keyed group.
    Item,
}

/// A live scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeEntry {
    pub kind: ScopeKind,
    /// Generation this scope was mounted with.
    pub generation: Generation,
    /// Generation of the nearest keyed item at or above this scope
    /// ([`Generation::ROOT`] when there is none). Events carry this value.
    pub item_generation: Generation,
    /// Coordinate of the component instance that owns this scope.
    pub owner: Coordinate,
}

#[derive(Debug, Default)]
pub struct InstanceTable {
    live: HashMap<Coordinate, ScopeEntry>,
    last_generation: Generation,
}

impl InstanceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a scope with a freshly allocated generation.
    ///
    /// Any previous entry at the same coordinate is replaced, which is exactly
    /// the key-reuse case: the old generation is dead from here on.
    pub fn mount(&mut self, coordinate: Coordinate, kind: ScopeKind, owner: Coordinate) -> ScopeEntry {
        self.last_generation = self.last_generation.next();
        let generation = self.last_generation;
        self.insert(coordinate, kind, owner, generation)
    }

    /// Mount a scope with a generation chosen by the peer.
    ///
    /// The host mirrors item generations allocated by the worker so both
    /// sides agree on which instance an event was meant for.
    pub fn adopt(
        &mut self,
        coordinate: Coordinate,
        kind: ScopeKind,
        owner: Coordinate,
        generation: Generation,
    ) -> ScopeEntry {
        if generation > self.last_generation {
            self.last_generation = generation;
        }
        self.insert(coordinate, kind, owner, generation)
    }

    fn insert(
        &mut self,
        coordinate: Coordinate,
        kind: ScopeKind,
        owner: Coordinate,
        generation: Generation,
    ) -> ScopeEntry {
        let item_generation = match kind {
            ScopeKind::Item => generation,
            ScopeKind::Component => self.inherited_item_generation(&coordinate),
        };
        let entry = ScopeEntry {
            kind,
            generation,
            item_generation,
            owner,
        };
        self.live.insert(coordinate, entry.clone());
        entry
    }

    fn inherited_item_generation(&self, coordinate: &Coordinate) -> Generation {
        coordinate
            .ancestors()
            .find_map(|ancestor| self.live.get(&ancestor).map(|entry| entry.item_generation))
            .unwrap_or(Generation::ROOT)
    }

    /// Remove `prefix` and every scope underneath it. Returns the removed
    /// coordinates, shortest first.
    pub fn unmount_subtree(&mut self, prefix: &Coordinate) -> Vec<Coordinate> {
        let mut removed: Vec<Coordinate> = self
            .live
            .keys()
            .filter(|coordinate| coordinate.starts_with(prefix))
            .cloned()
            .collect();
        for coordinate in &removed {
            self.live.remove(coordinate);
        }
        removed.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        removed
    }

    /// Locate the live scope at `coordinate`, checking that it is still the
    /// instance the sender saw.
    pub fn resolve(&self, coordinate: &Coordinate, item_generation: Generation) -> Result<&ScopeEntry> {
        match self.live.get(coordinate) {
            Some(entry) if entry.item_generation == item_generation => Ok(entry),
            _ => Err(BridgeError::StaleAddress {
                coordinate: coordinate.clone(),
            }),
        }
    }

    pub fn get(&self, coordinate: &Coordinate) -> Option<&ScopeEntry> {
        self.live.get(coordinate)
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        self.live.contains_key(coordinate)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}
