//! Capability client - `exec()` for worker code.
//!
//! Worker code never holds a host function, only a [`CapabilityId`]. Calling
//! [`CapabilityClient::exec`] records a request that the worker bridge ships
//! at the end of the turn, and hands back a [`CapabilityCall`] future that
//! resolves when the host answers.
//!
//! ```text
//! exec(id, input) ──► Requested ──CapabilityResult──► Fulfilled | Failed
//!                          └──────channel closed──────► Failed(ChannelClosed)
//! ```

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use serde_json::Value;
use tracing::{trace, warn};

use crate::protocol::{CapabilityError, CapabilityRequest, CapabilityResult};
use crate::types::{CallId, CapabilityId};

type Outcome = Result<Value, CapabilityError>;

/// Settled calls remembered for [`CapabilityClient::state`]. Older ones are
/// forgotten.
pub const SETTLED_HISTORY: usize = 64;

/// Lifecycle of one capability call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Requested,
    Fulfilled,
    Failed,
}

#[derive(Default)]
struct Ledger {
    last_call: u64,
    pending: HashMap<CallId, oneshot::Sender<Outcome>>,
    outbound: Vec<CapabilityRequest>,
    settled: VecDeque<(CallId, CallState)>,
    closed: bool,
}

impl Ledger {
    fn settle(&mut self, call: CallId, state: CallState) {
        if self.settled.len() == SETTLED_HISTORY {
            self.settled.pop_front();
        }
        self.settled.push_back((call, state));
    }
}

/// Handle for issuing capability calls. Clones share one ledger.
#[derive(Clone, Default)]
pub struct CapabilityClient {
    ledger: Rc<RefCell<Ledger>>,
}

impl CapabilityClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the host to run capability `id` with `input`.
    pub fn exec(&self, id: CapabilityId, input: Value) -> CapabilityCall {
        let mut ledger = self.ledger.borrow_mut();
        ledger.last_call += 1;
        let call = CallId(ledger.last_call);
        let (sender, receiver) = oneshot::channel();

        if ledger.closed {
            ledger.settle(call, CallState::Failed);
            let _ = sender.send(Err(CapabilityError::ChannelClosed));
        } else {
            trace!(%call, capability = %id, "capability requested");
            ledger.pending.insert(call, sender);
            ledger.outbound.push(CapabilityRequest {
                call,
                repository_id: id,
                input,
            });
        }
        CapabilityCall { call, receiver }
    }

    /// `Requested` while in flight, the outcome for recently settled calls,
    /// `None` once a call has aged out of the history.
    pub fn state(&self, call: CallId) -> Option<CallState> {
        let ledger = self.ledger.borrow();
        if ledger.pending.contains_key(&call) {
            return Some(CallState::Requested);
        }
        ledger
            .settled
            .iter()
            .rev()
            .find(|(settled, _)| *settled == call)
            .map(|(_, state)| *state)
    }

    /// Calls that have not been answered yet.
    pub fn in_flight(&self) -> usize {
        self.ledger.borrow().pending.len()
    }

    /// Requests issued since the last call, in issue order.
    pub(crate) fn take_requests(&self) -> Vec<CapabilityRequest> {
        std::mem::take(&mut self.ledger.borrow_mut().outbound)
    }

    /// Settle the call answered by `result`.
    pub(crate) fn resolve(&self, result: CapabilityResult) {
        let mut ledger = self.ledger.borrow_mut();
        let Some(sender) = ledger.pending.remove(&result.call) else {
            warn!(call = %result.call, "result for an unknown capability call");
            return;
        };
        let outcome = result.outcome.into_result();
        let state = match outcome {
            Ok(_) => CallState::Fulfilled,
            Err(_) => CallState::Failed,
        };
        ledger.settle(result.call, state);
        trace!(call = %result.call, ?state, "capability settled");
        // The caller may have dropped its future; that is fine.
        let _ = sender.send(outcome);
    }

    /// Fail every pending call with `ChannelClosed`; later calls fail at once.
    pub(crate) fn fail_all(&self) {
        let mut ledger = self.ledger.borrow_mut();
        ledger.closed = true;
        ledger.outbound.clear();
        let pending: Vec<_> = ledger.pending.drain().collect();
        for (call, sender) in pending {
            ledger.settle(call, CallState::Failed);
            let _ = sender.send(Err(CapabilityError::ChannelClosed));
        }
    }
}

/// Future of one capability call.
#[must_use = "capability calls do nothing useful unless awaited"]
pub struct CapabilityCall {
    call: CallId,
    receiver: oneshot::Receiver<Outcome>,
}

impl CapabilityCall {
    pub fn id(&self) -> CallId {
        self.call
    }
}

impl Future for CapabilityCall {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.receiver).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(CapabilityError::ChannelClosed)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::CapabilityOutcome;
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn test_request_then_fulfil() {
        let client = CapabilityClient::new();
        let call = client.exec(CapabilityId(3), json!({"path": "/tmp"}));
        let id = call.id();

        let requests = client.take_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].repository_id, CapabilityId(3));
        assert_eq!(client.state(id), Some(CallState::Requested));

        client.resolve(CapabilityResult {
            call: id,
            repository_id: CapabilityId(3),
            outcome: CapabilityOutcome::Fulfilled(json!("ok")),
        });
        assert_eq!(block_on(call), Ok(json!("ok")));
        assert_eq!(client.state(id), Some(CallState::Fulfilled));
        assert_eq!(client.in_flight(), 0);
    }

    #[test]
    fn test_failure_is_delivered() {
        let client = CapabilityClient::new();
        let call = client.exec(CapabilityId(9), Value::Null);
        client.resolve(CapabilityResult {
            call: call.id(),
            repository_id: CapabilityId(9),
            outcome: CapabilityOutcome::Failed(CapabilityError::UnknownCapability(CapabilityId(9))),
        });
        let id = call.id();
        assert_eq!(block_on(call), Err(CapabilityError::UnknownCapability(CapabilityId(9))));
        assert_eq!(client.state(id), Some(CallState::Failed));
    }

    #[test]
    fn test_close_fails_pending_and_future_calls() {
        let client = CapabilityClient::new();
        let pending = client.exec(CapabilityId(1), Value::Null);
        client.fail_all();

        assert_eq!(block_on(pending), Err(CapabilityError::ChannelClosed));
        let late = client.exec(CapabilityId(1), Value::Null);
        assert!(client.take_requests().is_empty());
        assert_eq!(block_on(late), Err(CapabilityError::ChannelClosed));
    }

    #[test]
    fn test_call_ids_are_unique() {
        let client = CapabilityClient::new();
        let a = client.exec(CapabilityId(1), Value::Null).id();
        let b = client.clone().exec(CapabilityId(1), Value::Null).id();
        assert_ne!(a, b);
    }

    #[test]
    fn test_settled_history_is_bounded() {
        let client = CapabilityClient::new();
        let calls: Vec<_> = (0..SETTLED_HISTORY + 10)
            .map(|n| client.exec(CapabilityId(1), json!(n)).id())
            .collect();
        client.take_requests();
        for call in &calls {
            client.resolve(CapabilityResult {
                call: *call,
                repository_id: CapabilityId(1),
                outcome: CapabilityOutcome::Fulfilled(Value::Null),
            });
        }

        assert_eq!(client.in_flight(), 0);
        assert_eq!(client.ledger.borrow().settled.len(), SETTLED_HISTORY);
        assert_eq!(client.state(calls[0]), None);
        assert_eq!(client.state(calls[calls.len() - 1]), Some(CallState::Fulfilled));
    }
}
