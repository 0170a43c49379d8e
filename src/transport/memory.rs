//! In-process transport for cooperative single-threaded loops.
//!
//! Both endpoints share one pair of queues. Nothing is delivered until the
//! receiving side calls [`Transport::try_recv`], which keeps the "asynchronous
//! delivery" contract even though no thread is involved.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use super::{Transport, TransportClosed};

struct Shared {
    /// `inboxes[i]` holds messages waiting for endpoint `i`.
    inboxes: [RefCell<VecDeque<String>>; 2],
    closed: Cell<bool>,
}

/// One end of a [`pair`].
pub struct MemoryEndpoint {
    shared: Rc<Shared>,
    index: usize,
}

/// Create two connected endpoints.
pub fn pair() -> (MemoryEndpoint, MemoryEndpoint) {
    let shared = Rc::new(Shared {
        inboxes: [RefCell::new(VecDeque::new()), RefCell::new(VecDeque::new())],
        closed: Cell::new(false),
    });
    (
        MemoryEndpoint { shared: shared.clone(), index: 0 },
        MemoryEndpoint { shared, index: 1 },
    )
}

impl MemoryEndpoint {
    /// Messages posted by the peer that this endpoint has not read yet.
    pub fn inbox_len(&self) -> usize {
        self.shared.inboxes[self.index].borrow().len()
    }
}

impl Transport for MemoryEndpoint {
    fn post(&self, message: String) -> Result<(), TransportClosed> {
        if self.shared.closed.get() {
            return Err(TransportClosed);
        }
        self.shared.inboxes[1 - self.index]
            .borrow_mut()
            .push_back(message);
        Ok(())
    }

    fn try_recv(&self) -> Result<Option<String>, TransportClosed> {
        if self.shared.closed.get() {
            return Err(TransportClosed);
        }
        Ok(self.shared.inboxes[self.index].borrow_mut().pop_front())
    }

    fn close(&self) {
        self.shared.closed.set(true);
        for inbox in &self.shared.inboxes {
            inbox.borrow_mut().clear();
        }
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.get()
    }
}
