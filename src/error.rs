//! Error taxonomy for the bridge.
//!
//! Two classes of failure live here:
//!
//! - **Recoverable** (`StaleAddress`, `UnknownCapability`): routine under
//!   concurrent mutation. Callers resolve them locally as a no-op or as a
//!   failed capability result.
//! - **Fatal** (`ShapeMismatch`, `HandshakeTimeout`, `ChannelClosed`): a
//!   build or configuration defect, or a dead transport. Returned immediately.

use thiserror::Error;

use crate::coordinate::Coordinate;
use crate::types::CapabilityId;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("handshake did not complete within {waited_ms}ms")]
    HandshakeTimeout { waited_ms: u64 },

    #[error("no live instance at {coordinate}")]
    StaleAddress { coordinate: Coordinate },

    #[error("reference shape mismatch at `{reference}`: {detail}")]
    ShapeMismatch { reference: String, detail: String },

    #[error("capability {0} is not registered")]
    UnknownCapability(CapabilityId),

    #[error("channel closed")]
    ChannelClosed,

    #[error("pending queue is full ({limit} envelopes)")]
    QueueFull { limit: usize },

    #[error("malformed envelope: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("unknown component template `{0}`")]
    UnknownTemplate(String),

    #[error("unknown reference `{name}` in {scope}")]
    UnknownReference { scope: String, name: String },

    #[error("reference `{name}` is ambiguous in {scope}, qualify it as one of: {candidates}")]
    AmbiguousReference {
        scope: String,
        name: String,
        candidates: String,
    },

    #[error("invalid bridge configuration: {0}")]
    Config(String),
}

impl BridgeError {
    pub(crate) fn shape_mismatch(reference: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ShapeMismatch {
            reference: reference.into(),
            detail: detail.into(),
        }
    }

    pub(crate) fn unknown_reference(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self::UnknownReference {
            scope: scope.into(),
            name: name.into(),
        }
    }

    /// Fatal errors cannot be recovered at runtime and must reach the application.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BridgeError::HandshakeTimeout { .. }
                | BridgeError::ShapeMismatch { .. }
                | BridgeError::ChannelClosed
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
