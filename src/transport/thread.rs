//! Cross-thread transport built on `std::sync::mpsc`.
//!
//! Used when the worker runs on its own OS thread. Strings are the only thing
//! that crosses, so the two sides still share no memory.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::time::Duration;

use super::{Transport, TransportClosed};

/// One end of a [`pair`]. `Send`, so it can be moved into a worker thread.
pub struct ThreadEndpoint {
    tx: Sender<String>,
    rx: Receiver<String>,
    closed: Arc<AtomicBool>,
}

/// Create two connected endpoints.
pub fn pair() -> (ThreadEndpoint, ThreadEndpoint) {
    let (to_b, from_a) = mpsc::channel();
    let (to_a, from_b) = mpsc::channel();
    let closed = Arc::new(AtomicBool::new(false));
    (
        ThreadEndpoint { tx: to_b, rx: from_b, closed: closed.clone() },
        ThreadEndpoint { tx: to_a, rx: from_a, closed },
    )
}

impl ThreadEndpoint {
    /// Block for at most `timeout` waiting for the next message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<String>, TransportClosed> {
        if self.is_closed() {
            return Err(TransportClosed);
        }
        match self.rx.recv_timeout(timeout) {
            Ok(message) => Ok(Some(message)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(TransportClosed),
        }
    }
}

impl Transport for ThreadEndpoint {
    fn post(&self, message: String) -> Result<(), TransportClosed> {
        if self.is_closed() {
            return Err(TransportClosed);
        }
        self.tx.send(message).map_err(|_| TransportClosed)
    }

    fn try_recv(&self) -> Result<Option<String>, TransportClosed> {
        if self.is_closed() {
            return Err(TransportClosed);
        }
        match self.rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportClosed),
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
