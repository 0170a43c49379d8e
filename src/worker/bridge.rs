//! Worker bridge - runs components, diffs view state, resolves events.
//!
//! The worker walks the same templates as the host but builds no display
//! nodes. For every scope it only tracks what the host has already been told:
//!
//! ```text
//! render()  ──►  bound fields   ── changed? ──►  Patch.fields
//!           ──►  keyed groups   ── diff_keys ──►  Patch.lists (Remove/Insert/Move)
//!           ──►  child props    ── changed? ──►  props signal of the child instance
//! ```
//!
//! A scope's own patch is queued before any of its items' or children's
//! patches, so the host has mounted an item by the time that item's fields
//! arrive.

use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Instant;

use futures::executor::LocalPool;
use serde_json::Value;
use spark_signals::signal;
use tracing::{debug, trace, warn};

use super::{CapabilityClient, Component, Components, HandlerContext, HandlerEntry, Props, Refs};
use crate::channel::{Channel, ChannelState};
use crate::config::BridgeConfig;
use crate::coordinate::{Coordinate, InstanceTable, ScopeKind, with_scope};
use crate::error::{BridgeError, Result};
use crate::protocol::{
    Envelope, EventMessage, ListChange, ListOp, Outbox, Patch, ViewStateUpdate, diff_keys,
};
use crate::refs::ReferenceManager;
use crate::template::{Binding, ChildNode, ForEachNode, Node, PropsSource, TemplateRegistry, visit_scope};
use crate::transport::Transport;
use crate::types::{ShapeId, Side};

/// Counters for one worker bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub events_handled: usize,
    pub events_dropped: usize,
    pub updates_sent: usize,
}

/// A live component instance.
struct Instance {
    shape: ShapeId,
    component: Box<dyn Component>,
    props: Props,
    handlers: Vec<HandlerEntry>,
}

/// What the host currently shows for one scope.
#[derive(Debug, Default)]
struct ScopeMirror {
    fields: HashMap<String, Value>,
    lists: HashMap<String, Vec<String>>,
}

/// The parts of a scope's template the diff cares about.
struct ScopeLayout<'a> {
    fields: Vec<&'a str>,
    groups: Vec<&'a ForEachNode>,
    children: Vec<&'a ChildNode>,
}

impl<'a> ScopeLayout<'a> {
    fn of(nodes: &'a [Node]) -> Self {
        let mut layout = ScopeLayout {
            fields: Vec::new(),
            groups: Vec::new(),
            children: Vec::new(),
        };
        let mut seen = HashSet::new();
        let mut bind = |binding: &'a Binding, fields: &mut Vec<&'a str>| {
            if let Binding::Field(field) = binding {
                if seen.insert(field.as_str()) {
                    fields.push(field.as_str());
                }
            }
        };
        visit_scope(nodes, &mut |node| match node {
            Node::Element(element) => {
                if let Some(text) = &element.text {
                    bind(text, &mut layout.fields);
                }
                for (_, binding) in &element.attributes {
                    bind(binding, &mut layout.fields);
                }
            }
            Node::Text(binding) => bind(binding, &mut layout.fields),
            Node::ForEach(group) => layout.groups.push(group),
            Node::Child(child) => layout.children.push(child),
        });
        layout
    }
}

pub struct WorkerBridge<T: Transport> {
    channel: Channel<T>,
    registry: TemplateRegistry,
    roots: Vec<Rc<[Node]>>,
    managers: Vec<ReferenceManager>,
    components: Components,
    instances: InstanceTable,
    live: HashMap<Coordinate, Instance>,
    mirrors: HashMap<Coordinate, ScopeMirror>,
    outbox: Outbox,
    capabilities: CapabilityClient,
    pool: LocalPool,
    root: Option<Coordinate>,
    stats: WorkerStats,
}

impl<T: Transport> WorkerBridge<T> {
    pub fn new(transport: T, registry: TemplateRegistry, components: Components, config: BridgeConfig) -> Result<Self> {
        config.validate()?;
        let managers = registry.managers(Side::Worker)?;
        let channel = Channel::new(transport, Side::Worker, registry.manifest()?, config.clone());
        let roots: Vec<Rc<[Node]>> = registry
            .iter()
            .map(|(_, template)| Rc::from(template.root.clone()))
            .collect();
        Ok(Self {
            channel,
            registry,
            roots,
            managers,
            components,
            instances: InstanceTable::new(),
            live: HashMap::new(),
            mirrors: HashMap::new(),
            outbox: Outbox::new(config.batch_updates),
            capabilities: CapabilityClient::new(),
            pool: LocalPool::new(),
            root: None,
            stats: WorkerStats::default(),
        })
    }

    /// Send `Syn`. Either side may call this first.
    pub fn connect(&mut self) -> Result<()> {
        self.channel.connect()
    }

    pub fn channel_state(&self) -> ChannelState {
        self.channel.state()
    }

    pub fn check_handshake(&mut self, now: Instant) -> Result<()> {
        self.channel.check_handshake(now)
    }

    pub fn stats(&self) -> WorkerStats {
        self.stats
    }

    pub fn capabilities(&self) -> CapabilityClient {
        self.capabilities.clone()
    }

    pub fn is_mounted(&self, coordinate: &Coordinate) -> bool {
        self.instances.contains(coordinate)
    }

    /// Live component instances, the root included.
    pub fn instance_count(&self) -> usize {
        self.live.len()
    }

    /// Close the channel. Pending capability calls fail with `ChannelClosed`.
    pub fn close(&mut self) -> Vec<Envelope> {
        let undelivered = self.channel.close();
        self.capabilities.fail_all();
        self.pool.run_until_stalled();
        undelivered
    }

    /// Envelopes stranded when the host closed the channel first.
    pub fn take_undelivered(&mut self) -> Vec<Envelope> {
        self.channel.take_undelivered()
    }

    /// Construct the root component with `props` and queue its first render.
    pub fn mount_root(&mut self, component: &str, props: Value) -> Result<()> {
        if self.root.is_some() {
            return Err(BridgeError::Config("a root component is already mounted".into()));
        }
        let shape = self.registry.shape(component)?;
        let coordinate = Coordinate::root();
        self.instances
            .mount(coordinate.clone(), ScopeKind::Component, coordinate.clone());
        self.create_instance(&coordinate, shape, props)?;
        self.root = Some(coordinate);
        debug!(component, "worker root mounted");
        self.render()?;
        self.flush()
    }

    fn create_instance(&mut self, coordinate: &Coordinate, shape: ShapeId, props: Value) -> Result<()> {
        let name = self
            .registry
            .template(shape)
            .map(|template| template.name.clone())
            .ok_or_else(|| BridgeError::UnknownTemplate(shape.to_string()))?;
        let factory = self
            .components
            .get(&name)
            .ok_or_else(|| BridgeError::UnknownTemplate(name.clone()))?;

        let props = signal(props);
        let mut refs = Refs::new(
            &self.managers[shape.index()],
            self.capabilities.clone(),
            self.pool.spawner(),
        );
        let component = with_scope(coordinate.clone(), || factory(props.clone(), &mut refs));
        let handlers = refs.finish()?;

        trace!(%coordinate, component = %name, handlers = handlers.len(), "component constructed");
        self.live.insert(
            coordinate.clone(),
            Instance {
                shape,
                component,
                props,
                handlers,
            },
        );
        Ok(())
    }

    fn unmount(&mut self, coordinate: &Coordinate) {
        let removed = self.instances.unmount_subtree(coordinate);
        self.live.retain(|live, _| !live.starts_with(coordinate));
        self.mirrors.retain(|live, _| !live.starts_with(coordinate));
        debug!(%coordinate, scopes = removed.len(), "worker subtree unmounted");
    }

    // =========================================================================
    // Turn loop
    // =========================================================================

    /// Run one turn: handle inbound envelopes, drive spawned tasks, re-render
    /// and ship the resulting patches and capability requests.
    pub fn pump(&mut self) -> Result<usize> {
        let incoming = match self.channel.receive() {
            Ok(incoming) => incoming,
            Err(err) => {
                if self.channel.state() == ChannelState::Closed {
                    self.capabilities.fail_all();
                    self.pool.run_until_stalled();
                }
                return Err(err);
            }
        };

        let handled = incoming.len();
        for envelope in incoming {
            match envelope {
                Envelope::Event(message) => self.handle_event(message),
                Envelope::CapabilityResult(result) => self.capabilities.resolve(result),
                other => warn!(kind = other.kind(), "unexpected envelope from host"),
            }
        }

        self.pool.run_until_stalled();
        self.render()?;
        self.flush()?;
        Ok(handled)
    }

    fn flush(&mut self) -> Result<()> {
        for request in self.capabilities.take_requests() {
            self.outbox.push(Envelope::CapabilityRequest(request));
        }
        for envelope in self.outbox.drain() {
            self.channel.send(envelope)?;
        }
        Ok(())
    }

    fn handle_event(&mut self, message: EventMessage) {
        let scope = match self.instances.resolve(&message.coordinate, message.generation) {
            Ok(scope) => scope.clone(),
            Err(err) => {
                debug!(
                    reference = %message.reference,
                    generation = %message.generation,
                    error = %err,
                    "stale event dropped"
                );
                self.stats.events_dropped += 1;
                return;
            }
        };

        let handler = self.live.get(&scope.owner).and_then(|instance| {
            instance
                .handlers
                .iter()
                .find(|entry| entry.reference == message.reference && entry.event == message.projection.kind)
                .map(|entry| entry.handler.clone())
        });
        let Some(handler) = handler else {
            debug!(reference = %message.reference, kind = %message.projection.kind, "no handler for event");
            self.stats.events_dropped += 1;
            return;
        };

        let item_key = match scope.kind {
            ScopeKind::Item => message.coordinate.last(),
            ScopeKind::Component => None,
        };
        let spawner = self.pool.spawner();
        handler(&HandlerContext {
            coordinate: &message.coordinate,
            item_key,
            event: &message.projection,
            capabilities: &self.capabilities,
            spawner: &spawner,
        });
        self.stats.events_handled += 1;
    }

    // =========================================================================
    // Render pass
    // =========================================================================

    fn render(&mut self) -> Result<()> {
        match self.root.clone() {
            Some(root) => self.render_instance(&root),
            None => Ok(()),
        }
    }

    fn render_instance(&mut self, coordinate: &Coordinate) -> Result<()> {
        let Some(instance) = self.live.get(coordinate) else {
            return Ok(());
        };
        let shape = instance.shape;
        let state = instance.component.render();
        let nodes = self.roots[shape.index()].clone();
        self.sync_scope(coordinate, coordinate, &nodes, &state)
    }

    fn sync_scope(
        &mut self,
        coordinate: &Coordinate,
        owner: &Coordinate,
        nodes: &[Node],
        state: &Value,
    ) -> Result<()> {
        let layout = ScopeLayout::of(nodes);
        let mut patch = Patch::default();
        let mut taken: HashSet<String> = layout.children.iter().map(|child| child.reference.clone()).collect();
        let grouped: Vec<_> = layout
            .groups
            .iter()
            .map(|group| (*group, keyed_items(coordinate, group, state, &mut taken)))
            .collect();

        let mirror = self.mirrors.entry(coordinate.clone()).or_default();
        for field in &layout.fields {
            let value = state.get(*field).cloned().unwrap_or(Value::Null);
            if mirror.fields.get(*field).unwrap_or(&Value::Null) != &value {
                mirror.fields.insert(field.to_string(), value.clone());
                patch.fields.insert(field.to_string(), value);
            }
        }
        let previous: Vec<Vec<String>> = grouped
            .iter()
            .map(|(group, _)| mirror.lists.remove(&group.scope).unwrap_or_default())
            .collect();

        // A key can leave one group and join another in the same pass, so
        // every departed item is gone before anything is mounted.
        for (keys, (_, entries)) in previous.iter().zip(&grouped) {
            for key in keys {
                if !entries.iter().any(|(kept, _)| kept == key) {
                    self.unmount(&coordinate.child(key));
                }
            }
        }

        let mirror = self.mirrors.entry(coordinate.clone()).or_default();
        let mut items = Vec::with_capacity(grouped.len());
        for ((group, entries), previous) in grouped.into_iter().zip(previous) {
            let keys: Vec<String> = entries.iter().map(|(key, _)| key.clone()).collect();
            let instances = &mut self.instances;
            let ops = diff_keys(&previous, &keys, |key| {
                instances
                    .mount(coordinate.child(key), ScopeKind::Item, owner.clone())
                    .generation
            });
            mirror.lists.insert(group.scope.clone(), keys);
            if !ops.is_empty() {
                patch.lists.push(ListChange {
                    scope: group.scope.clone(),
                    ops,
                });
            }
            items.push((group, entries));
        }

        if !patch.is_empty() {
            trace!(%coordinate, fields = patch.fields.len(), lists = patch.lists.len(), "scope changed");
            self.stats.updates_sent += 1;
            self.outbox.push(Envelope::ViewStateUpdate(ViewStateUpdate {
                coordinate: coordinate.clone(),
                patch,
            }));
        }

        for (group, entries) in items {
            for (key, item) in entries {
                self.sync_scope(&coordinate.child(&key), owner, &group.body, item)?;
            }
        }

        for child in &layout.children {
            let props = match &child.props {
                PropsSource::Field(field) => state.get(field).cloned().unwrap_or(Value::Null),
                PropsSource::Scope => state.clone(),
            };
            let child_coordinate = coordinate.child(&child.reference);
            match self.live.get(&child_coordinate) {
                Some(instance) => {
                    if instance.props.get() != props {
                        instance.props.set(props);
                    }
                }
                None => {
                    let shape = self.registry.shape(&child.component)?;
                    self.instances.mount(
                        child_coordinate.clone(),
                        ScopeKind::Component,
                        child_coordinate.clone(),
                    );
                    self.create_instance(&child_coordinate, shape, props)?;
                }
            }
            self.render_instance(&child_coordinate)?;
        }
        Ok(())
    }
}

/// Items of `group` in `state`, keyed. Items without a usable key and
/// repeated keys are skipped with a warning.
///
/// Keys share one segment namespace with every other group and child
/// reference of the scope. `taken` holds the segments already claimed; a key
/// found there is skipped and this group's keys are added to it.
fn keyed_items<'s>(
    coordinate: &Coordinate,
    group: &ForEachNode,
    state: &'s Value,
    taken: &mut HashSet<String>,
) -> Vec<(String, &'s Value)> {
    let Some(items) = state.get(&group.items).and_then(Value::as_array) else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(items.len());
    for item in items {
        let key = match item.get(&group.key) {
            Some(Value::String(key)) => key.clone(),
            Some(Value::Number(key)) => key.to_string(),
            _ => {
                warn!(%coordinate, scope = %group.scope, "keyed item without a `{}` key skipped", group.key);
                continue;
            }
        };
        if !seen.insert(key.clone()) {
            warn!(%coordinate, scope = %group.scope, %key, "duplicate key skipped");
            continue;
        }
        if !taken.insert(key.clone()) {
            warn!(%coordinate, scope = %group.scope, %key, "key collides with a sibling group or child reference, skipped");
            continue;
        }
        entries.push((key, item));
    }
    entries
}
