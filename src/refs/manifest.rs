//! Shape manifests - the comparable summary of a reference layout.

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::types::{RefId, RefKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub id: RefId,
    pub kind: RefKind,
    /// Qualified name, `Component::scope/name`.
    pub name: String,
}

/// Every reference of a registry, in allocation order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeManifest {
    entries: Vec<ManifestEntry>,
}

impl ShapeManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: ManifestEntry) {
        self.entries.push(entry);
    }

    pub fn extend(&mut self, other: ShapeManifest) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compare against the peer's manifest, failing on the first divergent
    /// reference.
    pub fn verify(&self, peer: &ShapeManifest) -> Result<()> {
        for (local, remote) in self.entries.iter().zip(&peer.entries) {
            if local != remote {
                return Err(BridgeError::shape_mismatch(
                    local.name.clone(),
                    format!(
                        "local {} {} `{}`, peer {} {} `{}`",
                        local.kind, local.id, local.name, remote.kind, remote.id, remote.name
                    ),
                ));
            }
        }

        if self.entries.len() != peer.entries.len() {
            let first_extra = self
                .entries
                .get(peer.entries.len())
                .or_else(|| peer.entries.get(self.entries.len()))
                .map(|entry| entry.name.clone())
                .unwrap_or_default();
            return Err(BridgeError::shape_mismatch(
                first_extra,
                format!(
                    "arity differs: local declares {} references, peer declares {}",
                    self.entries.len(),
                    peer.entries.len()
                ),
            ));
        }

        Ok(())
    }
}
