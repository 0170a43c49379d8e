//! # spark-sandbox
//!
//! Secure cross-context component bridge.
//!
//! Reactive components run inside an isolated worker that shares no memory
//! with the host and talks to it only through messages. The host owns the
//! display tree and is the only side that can touch it.
//!
//! ## Architecture
//!
//! ```text
//!         HOST (trusted)                          WORKER (isolated)
//!  ┌──────────────────────────────┐       ┌──────────────────────────────┐
//!  │ DisplayTree   FunctionRepo   │       │ Components   CapabilityClient│
//!  │      ▲             ▲         │       │      │              │        │
//!  │      └─ HostBridge ┘         │       │      └─ WorkerBridge ┘       │
//!  │            │                 │Event ►│            │                 │
//!  │         Channel ◄──────── Transport ────────► Channel               │
//!  │                              │◄ Patch│                              │
//!  └──────────────────────────────┘       └──────────────────────────────┘
//!       ReferenceManager + Coordinate derived independently on both sides
//! ```
//!
//! Both sides build their [`ReferenceManager`]s from the same
//! [`TemplateRegistry`] and therefore agree on every [`RefId`] without
//! negotiating. Concrete instances are told apart by [`Coordinate`], the path
//! of item keys and child reference names leading to them.
//!
//! ## Modules
//!
//! - [`types`] - identifiers shared by both sides
//! - [`transport`] - raw two-party message transports
//! - [`channel`] - handshake, pre-open queueing, ordered delivery
//! - [`protocol`] - envelopes, patches, keyed list ops, batching
//! - [`refs`] - deterministic reference allocation
//! - [`coordinate`] - path construction and instance resolution
//! - [`template`] - compiled template contract
//! - [`host`] - display tree, function repository, host bridge
//! - [`worker`] - component contract, capability client, worker bridge

pub mod channel;
pub mod config;
pub mod coordinate;
pub mod error;
pub mod host;
pub mod protocol;
pub mod refs;
pub mod template;
pub mod transport;
pub mod types;
pub mod worker;

pub use types::*;

pub use channel::{Channel, ChannelState};
pub use config::BridgeConfig;
pub use coordinate::{Coordinate, InstanceTable, current_coordinate, with_key, with_scope};
pub use error::{BridgeError, Result};
pub use host::{
    DisplayTree, FunctionRepository, HostBridge, MemoryDisplay, NativeEvent, NodeId,
};
pub use protocol::{CapabilityError, Envelope, EventProjection, Modifiers, Patch};
pub use refs::{PublicApi, RefDeclaration, ReferenceManager};
pub use template::{ComponentTemplate, TemplateRegistry};
pub use transport::Transport;
pub use worker::{CapabilityClient, Component, Components, HandlerContext, Props, Refs, WorkerBridge};
