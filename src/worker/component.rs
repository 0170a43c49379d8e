//! Component contract on the worker side.
//!
//! A component is built by a factory that receives its props as a signal and
//! a [`Refs`] object for wiring handlers. It keeps its own state in signals,
//! and the worker bridge asks it to `render()` a plain JSON view state after
//! every turn.
//!
//! ```ignore
//! let components = Components::new().register("Counter", |_props, refs| {
//!     let count = signal(0);
//!     let clicked = count.clone();
//!     refs.on("button", "click", move |_| clicked.set(clicked.get() + 1));
//!     Box::new(move || json!({ "count": count.get() }))
//! });
//! ```

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::executor::LocalSpawner;
use futures::task::LocalSpawnExt;
use serde_json::Value;
use spark_signals::Signal;
use tracing::warn;

use super::{CapabilityCall, CapabilityClient};
use crate::coordinate::Coordinate;
use crate::error::BridgeError;
use crate::protocol::EventProjection;
use crate::refs::ReferenceManager;
use crate::types::{CapabilityId, RefId};

/// Props of a component instance. Set by the parent on every render pass.
pub type Props = Signal<Value>;

pub trait Component {
    /// Current view state. Object fields feed the template's bindings and
    /// keyed groups.
    fn render(&self) -> Value;
}

impl<F: Fn() -> Value> Component for F {
    fn render(&self) -> Value {
        self()
    }
}

pub type Handler = Rc<dyn Fn(&HandlerContext<'_>)>;

pub type ComponentFactory = Rc<dyn Fn(Props, &mut Refs<'_>) -> Box<dyn Component>>;

/// Factories by template name.
#[derive(Clone, Default)]
pub struct Components {
    factories: HashMap<String, ComponentFactory>,
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        name: impl Into<String>,
        factory: impl Fn(Props, &mut Refs<'_>) -> Box<dyn Component> + 'static,
    ) -> Self {
        self.factories.insert(name.into(), Rc::new(factory));
        self
    }

    pub fn get(&self, name: &str) -> Option<ComponentFactory> {
        self.factories.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }
}

impl fmt::Debug for Components {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("Components").field("factories", &names).finish()
    }
}

/// A registered handler, keyed by reference and event kind.
pub(crate) struct HandlerEntry {
    pub reference: RefId,
    pub event: String,
    pub handler: Handler,
}

/// Handed to a component factory for wiring handlers to references.
///
/// References are looked up by name in the component's own scope and its
/// keyed groups. A name shared by two groups must be qualified with its group
/// path (`done/row`). A name that does not resolve is reported when the
/// factory returns.
pub struct Refs<'a> {
    manager: &'a ReferenceManager,
    capabilities: CapabilityClient,
    spawner: LocalSpawner,
    handlers: Vec<HandlerEntry>,
    errors: Vec<BridgeError>,
}

impl<'a> Refs<'a> {
    pub(crate) fn new(manager: &'a ReferenceManager, capabilities: CapabilityClient, spawner: LocalSpawner) -> Self {
        Self {
            manager,
            capabilities,
            spawner,
            handlers: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Run `handler` when `event` fires on any instance of `reference`.
    pub fn on(
        &mut self,
        reference: &str,
        event: impl Into<String>,
        handler: impl Fn(&HandlerContext<'_>) + 'static,
    ) -> &mut Self {
        match self.manager.lookup(reference) {
            Ok(entry) => self.handlers.push(HandlerEntry {
                reference: entry.id,
                event: event.into(),
                handler: Rc::new(handler),
            }),
            Err(err) => self.errors.push(err),
        }
        self
    }

    /// Capability access for work started outside a handler.
    pub fn capabilities(&self) -> CapabilityClient {
        self.capabilities.clone()
    }

    pub fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        spawn_task(&self.spawner, task);
    }

    pub fn component(&self) -> &str {
        self.manager.component()
    }

    pub(crate) fn finish(self) -> Result<Vec<HandlerEntry>, BridgeError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(self.handlers),
        }
    }
}

/// What a handler sees when its event fires.
pub struct HandlerContext<'a> {
    pub(crate) coordinate: &'a Coordinate,
    pub(crate) item_key: Option<&'a str>,
    pub(crate) event: &'a EventProjection,
    pub(crate) capabilities: &'a CapabilityClient,
    pub(crate) spawner: &'a LocalSpawner,
}

impl HandlerContext<'_> {
    /// Coordinate of the scope the event fired in.
    pub fn coordinate(&self) -> &Coordinate {
        self.coordinate
    }

    /// Key of the keyed item the event fired in, if any.
    pub fn item_key(&self) -> Option<&str> {
        self.item_key
    }

    pub fn event(&self) -> &EventProjection {
        self.event
    }

    pub fn exec(&self, id: CapabilityId, input: Value) -> CapabilityCall {
        self.capabilities.exec(id, input)
    }

    /// Run `task` on the worker's executor. It is polled at the end of the
    /// current turn and whenever a capability result arrives.
    pub fn spawn(&self, task: impl Future<Output = ()> + 'static) {
        spawn_task(self.spawner, task);
    }
}

fn spawn_task(spawner: &LocalSpawner, task: impl Future<Output = ()> + 'static) {
    if let Err(err) = spawner.spawn_local(task) {
        warn!(error = %err, "worker executor is shut down, task dropped");
    }
}
