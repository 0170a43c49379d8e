//! Host side of the bridge.
//!
//! The host is the trusted half. It owns:
//!
//! - the display tree ([`DisplayTree`], [`MemoryDisplay`])
//! - the function repository ([`FunctionRepository`])
//! - the only handles that can name display nodes ([`NodeId`])
//!
//! [`HostBridge`] ties them to a channel: it builds display nodes from the
//! templates, applies coordinate-scoped patches from the worker, forwards
//! projected native events and answers capability requests.

mod bridge;
mod display;
mod native;
mod repository;

pub use bridge::*;
pub use display::*;
pub use native::*;
pub use repository::*;
