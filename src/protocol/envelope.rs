//! Message envelopes - the typed unit carried by a channel.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::{EventProjection, Patch};
use crate::coordinate::Coordinate;
use crate::error::Result;
use crate::refs::ShapeManifest;
use crate::types::{CallId, CapabilityId, Generation, RefId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    Handshake(Handshake),
    Event(EventMessage),
    ViewStateUpdate(ViewStateUpdate),
    CapabilityRequest(CapabilityRequest),
    CapabilityResult(CapabilityResult),
    /// Several envelopes produced in the same turn, delivered in order.
    Batch { envelopes: Vec<Envelope> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakePhase {
    Syn,
    Ack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handshake {
    pub phase: HandshakePhase,
    /// Reference shapes of the sender, checked by the receiver.
    pub manifest: ShapeManifest,
}

/// A projected UI event addressed to one live reference instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMessage {
    pub reference: RefId,
    pub coordinate: Coordinate,
    /// Item generation of the scope as the host saw it.
    pub generation: Generation,
    pub projection: EventProjection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewStateUpdate {
    pub coordinate: Coordinate,
    pub patch: Patch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityRequest {
    pub call: CallId,
    pub repository_id: CapabilityId,
    /// Plain data handed to the host callable. Never code.
    #[serde(default)]
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResult {
    pub call: CallId,
    pub repository_id: CapabilityId,
    pub outcome: CapabilityOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityOutcome {
    Fulfilled(Value),
    Failed(CapabilityError),
}

impl CapabilityOutcome {
    pub fn into_result(self) -> std::result::Result<Value, CapabilityError> {
        match self {
            CapabilityOutcome::Fulfilled(value) => Ok(value),
            CapabilityOutcome::Failed(err) => Err(err),
        }
    }
}

/// Why a capability call failed, as seen by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityError {
    #[error("capability {0} is not registered")]
    UnknownCapability(CapabilityId),
    #[error("capability rejected the call: {0}")]
    Rejected(String),
    #[error("channel closed before the capability answered")]
    ChannelClosed,
}

impl Envelope {
    pub fn encode(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Short name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Handshake(h) => match h.phase {
                HandshakePhase::Syn => "syn",
                HandshakePhase::Ack => "ack",
            },
            Envelope::Event(_) => "event",
            Envelope::ViewStateUpdate(_) => "view_state_update",
            Envelope::CapabilityRequest(_) => "capability_request",
            Envelope::CapabilityResult(_) => "capability_result",
            Envelope::Batch { .. } => "batch",
        }
    }

    /// Expand nested batches into a flat, order-preserving list.
    pub fn flatten(self, out: &mut Vec<Envelope>) {
        match self {
            Envelope::Batch { envelopes } => {
                for envelope in envelopes {
                    envelope.flatten(out);
                }
            }
            other => out.push(other),
        }
    }
}
