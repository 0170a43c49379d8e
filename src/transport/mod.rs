//! Raw transports - the postMessage-like primitive under a [`Channel`].
//!
//! A transport moves opaque strings between exactly two endpoints. It must
//! preserve per-endpoint order and must not deliver synchronously into the
//! peer: a posted message only becomes visible when the peer asks for it.
//!
//! Two implementations ship with the crate:
//!
//! - [`memory`] - single-threaded queues for cooperative loops and tests
//! - [`thread`] - `std::sync::mpsc` endpoints for a worker on its own thread
//!
//! [`Channel`]: crate::channel::Channel

pub mod memory;
pub mod thread;

use thiserror::Error;

/// The underlying transport has been destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("transport closed")]
pub struct TransportClosed;

/// One endpoint of a two-party message transport.
pub trait Transport {
    /// Queue `message` for the peer. Never blocks.
    fn post(&self, message: String) -> Result<(), TransportClosed>;

    /// Take the next message from the peer, if one has arrived.
    fn try_recv(&self) -> Result<Option<String>, TransportClosed>;

    /// Destroy the transport for both endpoints.
    fn close(&self);

    fn is_closed(&self) -> bool;
}
