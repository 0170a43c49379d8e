//! Reference Manager - deterministic reference allocation per component shape.
//!
//! A compiled template declares its addressable positions as four ordered
//! lists plus named nested scopes (one per keyed group). A
//! [`ReferenceManager`] turns that declaration into [`RefId`]s by walking it
//! in a fixed order:
//!
//! ```text
//! elements → collections → components → collection_components → nested scopes (depth first)
//! ```
//!
//! The host and the worker each build their own managers from the same
//! declarations and arrive at byte-identical ids without ever exchanging
//! them. The [`ShapeManifest`] of each side travels in the handshake only so
//! that a mismatch is caught loudly instead of misrouting events.
//!
//! Managers exist once per component *shape*, not per rendered instance.
//! Instances are told apart by coordinate (see [`crate::coordinate`]).
//!
//! [`RefId`]: crate::types::RefId

mod declaration;
mod manager;
mod manifest;
mod surface;

pub use declaration::*;
pub use manager::*;
pub use manifest::*;
pub use surface::*;
