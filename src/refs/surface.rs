//! Public API surface of a reference manager.
//!
//! On the host every declared reference gets a [`RefSurface`] that trusted
//! host code can subscribe to. On the worker the public API is opaque: there
//! is nothing displayable to subscribe to.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::coordinate::Coordinate;
use crate::protocol::EventProjection;
use crate::types::{RefId, RefKind};

/// Host-side listener for events on one reference (any instance).
pub type RefListener = Rc<dyn Fn(&Coordinate, &EventProjection)>;

#[derive(Clone)]
pub struct RefSurface {
    id: RefId,
    kind: RefKind,
    listeners: Rc<RefCell<Vec<(String, RefListener)>>>,
}

impl RefSurface {
    pub(crate) fn new(id: RefId, kind: RefKind) -> Self {
        Self {
            id,
            kind,
            listeners: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub fn id(&self) -> RefId {
        self.id
    }

    pub fn kind(&self) -> RefKind {
        self.kind
    }

    /// Listen for `event` on every instance of this reference.
    pub fn on(&self, event: impl Into<String>, listener: impl Fn(&Coordinate, &EventProjection) + 'static) {
        self.listeners
            .borrow_mut()
            .push((event.into(), Rc::new(listener)));
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Invoke every listener registered for `projection.kind`.
    pub(crate) fn notify(&self, coordinate: &Coordinate, projection: &EventProjection) -> usize {
        // Listeners may subscribe more listeners; don't hold the borrow.
        let matching: Vec<RefListener> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(event, _)| *event == projection.kind)
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in &matching {
            listener(coordinate, projection);
        }
        matching.len()
    }
}

impl fmt::Debug for RefSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefSurface")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// What `ReferenceManager::public_api` hands out.
#[derive(Debug, Clone)]
pub enum PublicApi {
    Host(IndexMap<String, RefSurface>),
    Opaque,
}

impl PublicApi {
    pub fn get(&self, name: &str) -> Option<&RefSurface> {
        match self {
            PublicApi::Host(surfaces) => surfaces.get(name),
            PublicApi::Opaque => None,
        }
    }

    pub fn is_opaque(&self) -> bool {
        matches!(self, PublicApi::Opaque)
    }

    pub fn names(&self) -> Vec<&str> {
        match self {
            PublicApi::Host(surfaces) => surfaces.keys().map(String::as_str).collect(),
            PublicApi::Opaque => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ShapeId;
    use std::cell::Cell;

    #[test]
    fn test_notify_filters_by_event_kind() {
        let surface = RefSurface::new(RefId::new(ShapeId(0), 0), RefKind::Collection);
        let clicks = Rc::new(Cell::new(0));
        let seen = clicks.clone();
        surface.on("click", move |coordinate, _| {
            assert_eq!(coordinate.last(), Some("b"));
            seen.set(seen.get() + 1);
        });
        surface.on("input", |_, _| panic!("wrong event kind"));

        let coordinate = Coordinate::new(["b"]);
        assert_eq!(surface.notify(&coordinate, &EventProjection::new("click")), 1);
        assert_eq!(clicks.get(), 1);
    }

    #[test]
    fn test_clones_share_listeners() {
        let surface = RefSurface::new(RefId::new(ShapeId(0), 0), RefKind::Static);
        let handle = surface.clone();
        handle.on("click", |_, _| {});
        assert_eq!(surface.listener_count(), 1);
    }
}
