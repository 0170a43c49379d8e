//! Channel - handshake, pre-open queueing and ordered delivery over a transport.
//!
//! ```text
//!   Connecting ──connect()──► Handshaking ──Syn/Ack──► Open ──transport gone──► Closed
//!        │                                              ▲
//!        └────────────── peer Syn arrives ──────────────┘
//! ```
//!
//! Either side may send `Syn` first, or both may send it at once. A side that
//! receives `Syn` and has not acknowledged yet replies `Ack`; receiving either
//! message opens the channel. Envelopes sent before `Open` wait in a FIFO that
//! is flushed exactly once, right after the `Ack` (if one is sent).
//!
//! Every handshake message carries the sender's [`ShapeManifest`]. A peer
//! built from a different template source fails the handshake with
//! `ShapeMismatch` instead of silently misrouting events later.

use std::collections::VecDeque;
use std::time::Instant;

use tracing::{debug, trace, warn};

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::protocol::{Envelope, Handshake, HandshakePhase};
use crate::refs::ShapeManifest;
use crate::transport::Transport;
use crate::types::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Connecting,
    Handshaking,
    Open,
    Closed,
}

pub struct Channel<T: Transport> {
    transport: T,
    side: Side,
    state: ChannelState,
    pending: VecDeque<Envelope>,
    sent_ack: bool,
    manifest: ShapeManifest,
    config: BridgeConfig,
    started: Instant,
    undelivered: Vec<Envelope>,
}

impl<T: Transport> Channel<T> {
    pub fn new(transport: T, side: Side, manifest: ShapeManifest, config: BridgeConfig) -> Self {
        Self {
            transport,
            side,
            state: ChannelState::Connecting,
            pending: VecDeque::new(),
            sent_ack: false,
            manifest,
            config,
            started: Instant::now(),
            undelivered: Vec::new(),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    pub fn side(&self) -> Side {
        self.side
    }

    /// Envelopes waiting for the channel to open.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Start the handshake by sending `Syn`. No-op once past `Connecting`.
    pub fn connect(&mut self) -> Result<()> {
        if self.state != ChannelState::Connecting {
            return Ok(());
        }
        self.started = Instant::now();
        self.state = ChannelState::Handshaking;
        debug!(side = %self.side, "channel handshaking");
        self.post_handshake(HandshakePhase::Syn)
    }

    /// Send `envelope` now if open, otherwise queue it until the channel opens.
    pub fn send(&mut self, envelope: Envelope) -> Result<()> {
        match self.state {
            ChannelState::Open => self.post(&envelope),
            ChannelState::Closed => Err(BridgeError::ChannelClosed),
            ChannelState::Connecting | ChannelState::Handshaking => {
                if self.pending.len() >= self.config.max_pending {
                    return Err(BridgeError::QueueFull {
                        limit: self.config.max_pending,
                    });
                }
                trace!(side = %self.side, kind = envelope.kind(), "queued before open");
                self.pending.push_back(envelope);
                Ok(())
            }
        }
    }

    /// Drain every message that has arrived, in order.
    ///
    /// Handshake messages are consumed here; batches are flattened. Malformed
    /// messages are logged and skipped.
    pub fn receive(&mut self) -> Result<Vec<Envelope>> {
        if self.state == ChannelState::Closed {
            return Err(BridgeError::ChannelClosed);
        }

        let mut delivered = Vec::new();
        loop {
            let raw = match self.transport.try_recv() {
                Ok(Some(raw)) => raw,
                Ok(None) => break,
                Err(_) => {
                    self.shut_down();
                    return Err(BridgeError::ChannelClosed);
                }
            };
            let envelope = match Envelope::decode(&raw) {
                Ok(envelope) => envelope,
                Err(err) => {
                    warn!(side = %self.side, error = %err, "dropping malformed message");
                    continue;
                }
            };
            let mut flat = Vec::new();
            envelope.flatten(&mut flat);
            for envelope in flat {
                match envelope {
                    Envelope::Handshake(handshake) => self.on_handshake(handshake)?,
                    other => {
                        if self.state != ChannelState::Open {
                            warn!(side = %self.side, kind = other.kind(), "envelope arrived before handshake");
                        }
                        delivered.push(other);
                    }
                }
            }
        }
        Ok(delivered)
    }

    fn on_handshake(&mut self, handshake: Handshake) -> Result<()> {
        if let Err(err) = self.manifest.verify(&handshake.manifest) {
            warn!(side = %self.side, error = %err, "peer built from a different template source");
            self.shut_down();
            return Err(err);
        }
        match handshake.phase {
            HandshakePhase::Syn => {
                if !self.sent_ack {
                    self.sent_ack = true;
                    self.post_handshake(HandshakePhase::Ack)?;
                }
                self.open()
            }
            HandshakePhase::Ack => self.open(),
        }
    }

    fn open(&mut self) -> Result<()> {
        if self.state == ChannelState::Open {
            return Ok(());
        }
        self.state = ChannelState::Open;
        debug!(side = %self.side, flushed = self.pending.len(), "channel open");
        while let Some(envelope) = self.pending.pop_front() {
            self.post(&envelope)?;
        }
        Ok(())
    }

    /// Fail with `HandshakeTimeout` if the channel has not opened within the
    /// configured bound. The channel is closed when that happens.
    pub fn check_handshake(&mut self, now: Instant) -> Result<()> {
        if matches!(self.state, ChannelState::Open | ChannelState::Closed) {
            return Ok(());
        }
        let waited = now.saturating_duration_since(self.started);
        if waited >= self.config.handshake_timeout() {
            warn!(side = %self.side, waited_ms = waited.as_millis() as u64, "handshake timed out");
            self.shut_down();
            return Err(BridgeError::HandshakeTimeout {
                waited_ms: waited.as_millis() as u64,
            });
        }
        Ok(())
    }

    /// Close the channel and its transport. Returns the envelopes that were
    /// never delivered.
    pub fn close(&mut self) -> Vec<Envelope> {
        self.shut_down();
        self.take_undelivered()
    }

    /// Envelopes left in the pending queue when the channel closed.
    pub fn take_undelivered(&mut self) -> Vec<Envelope> {
        std::mem::take(&mut self.undelivered)
    }

    fn shut_down(&mut self) {
        if self.state == ChannelState::Closed {
            return;
        }
        self.state = ChannelState::Closed;
        self.transport.close();
        self.undelivered.extend(self.pending.drain(..));
        debug!(side = %self.side, undelivered = self.undelivered.len(), "channel closed");
    }

    fn post_handshake(&mut self, phase: HandshakePhase) -> Result<()> {
        let envelope = Envelope::Handshake(Handshake {
            phase,
            manifest: self.manifest.clone(),
        });
        self.post(&envelope)
    }

    fn post(&mut self, envelope: &Envelope) -> Result<()> {
        let raw = envelope.encode()?;
        if self.transport.post(raw).is_err() {
            self.shut_down();
            return Err(BridgeError::ChannelClosed);
        }
        trace!(side = %self.side, kind = envelope.kind(), "posted");
        Ok(())
    }
}
