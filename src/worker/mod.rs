//! Worker side of the bridge.
//!
//! The worker is the isolated half. It runs component logic and nothing else:
//! it holds no display node, no host closure, and no other component's
//! internals. Everything it knows about the outside world arrives as an
//! envelope, and everything it wants done leaves as one:
//!
//! - [`WorkerBridge`] - turn loop, render pass, event resolution
//! - [`Components`], [`Refs`], [`HandlerContext`] - the component contract
//! - [`CapabilityClient`] - `exec()` against the host's closed function table

mod bridge;
mod capability;
mod component;

pub use bridge::*;
pub use capability::*;
pub use component::*;
