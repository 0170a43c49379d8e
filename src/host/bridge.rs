//! Host bridge - builds the display tree, applies patches, relays events.
//!
//! The host walks the same templates as the worker, but builds real display
//! nodes as it goes:
//!
//! ```text
//! template node          host does
//! ─────────────          ─────────
//! element + reference    create element, bind reference, remember it as an event target
//! text_field / attr      create node, register a field binding for the scope
//! for_each               create an anchor group; items arrive later as list ops
//! component              mount a child scope at coordinate + [reference]
//! ```
//!
//! Every scope (component root or keyed item) gets its own display group, so
//! removing or moving an item is one display operation on that group.

use std::collections::HashMap;
use std::rc::Rc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, trace, warn};

use super::{DisplayTree, FunctionRepository, NativeEvent, NodeId};
use crate::channel::{Channel, ChannelState};
use crate::config::BridgeConfig;
use crate::coordinate::{Coordinate, InstanceTable, ScopeKind, with_scope};
use crate::error::{BridgeError, Result};
use crate::protocol::{
    CapabilityRequest, CapabilityResult, Envelope, EventMessage, ListChange, ListOp, Outbox,
    ViewStateUpdate, apply_list_ops,
};
use crate::refs::{BoundRef, PublicApi, ReferenceManager};
use crate::template::{Binding, Node, TemplateRegistry};
use crate::transport::Transport;
use crate::types::{ShapeId, Side};

/// Counters for one host bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostStats {
    pub events_sent: usize,
    pub events_dropped: usize,
    pub updates_applied: usize,
    pub updates_dropped: usize,
    pub capability_calls: usize,
}

#[derive(Debug)]
enum BindTarget {
    Text,
    Attribute(String),
}

#[derive(Debug)]
struct FieldBinding {
    field: String,
    node: NodeId,
    target: BindTarget,
}

#[derive(Debug)]
struct KeyedGroup {
    anchor: NodeId,
    body: Rc<[Node]>,
    keys: Vec<String>,
}

/// One mounted scope on the host.
#[derive(Debug)]
struct HostScope {
    shape: ShapeId,
    /// Nested scope names inside the shape's reference manager.
    path: Vec<String>,
    owner: Coordinate,
    /// Display group holding everything this scope built.
    node: NodeId,
    bindings: Vec<FieldBinding>,
    groups: HashMap<String, KeyedGroup>,
}

/// A referenced element that forwards native events.
#[derive(Debug)]
struct Target {
    bound: BoundRef,
    shape: ShapeId,
    path: Vec<String>,
    name: String,
    events: Vec<String>,
}

pub struct HostBridge<T: Transport, D: DisplayTree> {
    channel: Channel<T>,
    registry: TemplateRegistry,
    roots: Vec<Rc<[Node]>>,
    managers: Vec<ReferenceManager>,
    repository: FunctionRepository,
    display: D,
    instances: InstanceTable,
    scopes: HashMap<Coordinate, HostScope>,
    targets: HashMap<NodeId, Target>,
    outbox: Outbox,
    root: Option<Coordinate>,
    stats: HostStats,
}

impl<T: Transport, D: DisplayTree> HostBridge<T, D> {
    pub fn new(
        transport: T,
        registry: TemplateRegistry,
        repository: FunctionRepository,
        display: D,
        config: BridgeConfig,
    ) -> Result<Self> {
        config.validate()?;
        let managers = registry.managers(Side::Host)?;
        let channel = Channel::new(transport, Side::Host, registry.manifest()?, config.clone());
        let roots: Vec<Rc<[Node]>> = registry
            .iter()
            .map(|(_, template)| Rc::from(template.root.clone()))
            .collect();
        Ok(Self {
            channel,
            registry,
            roots,
            managers,
            repository,
            display,
            instances: InstanceTable::new(),
            scopes: HashMap::new(),
            targets: HashMap::new(),
            outbox: Outbox::new(config.batch_updates),
            root: None,
            stats: HostStats::default(),
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

    /// Close the channel. Returns envelopes that never left the host.
    pub fn close(&mut self) -> Vec<Envelope> {
        self.channel.close()
    }

    /// Envelopes stranded when the worker closed the channel first.
    pub fn take_undelivered(&mut self) -> Vec<Envelope> {
        self.channel.take_undelivered()
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn stats(&self) -> HostStats {
        self.stats
    }

    pub fn is_mounted(&self, coordinate: &Coordinate) -> bool {
        self.scopes.contains_key(coordinate)
    }

    /// Subscription surface of the root scope of `component`.
    pub fn public_api(&self, component: &str) -> Result<PublicApi> {
        let shape = self.registry.shape(component)?;
        Ok(self.managers[shape.index()].public_api())
    }

    /// Display node bound to `reference` at `coordinate`, if it is live.
    pub fn find_node(&self, reference: &str, coordinate: &Coordinate) -> Option<NodeId> {
        self.targets
            .iter()
            .filter(|(_, target)| target.name == reference && target.bound.coordinate == *coordinate)
            .map(|(node, _)| *node)
            .min()
    }

    /// Build the root component's static structure under the display root.
    pub fn mount_root(&mut self, component: &str) -> Result<()> {
        if self.root.is_some() {
            return Err(BridgeError::Config("a root component is already mounted".into()));
        }
        let shape = self.registry.shape(component)?;
        let coordinate = Coordinate::root();
        self.instances
            .mount(coordinate.clone(), ScopeKind::Component, coordinate.clone());
        let container = self.mount_scope(coordinate.clone(), shape, Vec::new(), coordinate.clone())?;
        let root = self.display.root();
        self.display.append_child(root, container);
        self.root = Some(coordinate);
        debug!(component, "host root mounted");
        Ok(())
    }

    // =========================================================================
    // Tree construction
    // =========================================================================

    /// Build one scope into a fresh, detached display group.
    fn mount_scope(
        &mut self,
        coordinate: Coordinate,
        shape: ShapeId,
        path: Vec<String>,
        owner: Coordinate,
    ) -> Result<NodeId> {
        let nodes = if path.is_empty() {
            self.roots[shape.index()].clone()
        } else {
            self.group_body(&coordinate, &path)?
        };
        let container = self.display.create_group();
        let mut scope = HostScope {
            shape,
            path,
            owner,
            node: container,
            bindings: Vec::new(),
            groups: HashMap::new(),
        };
        with_scope(coordinate.clone(), || self.build_nodes(&mut scope, container, &nodes))?;
        trace!(%coordinate, bindings = scope.bindings.len(), "host scope mounted");
        self.scopes.insert(coordinate, scope);
        Ok(container)
    }

    /// Item template of the keyed group that `coordinate` is an item of.
    fn group_body(&self, coordinate: &Coordinate, path: &[String]) -> Result<Rc<[Node]>> {
        let stale = || BridgeError::StaleAddress {
            coordinate: coordinate.clone(),
        };
        let parent = coordinate.parent().ok_or_else(stale)?;
        let scope_name = path.last().ok_or_else(stale)?;
        let group = self
            .scopes
            .get(&parent)
            .and_then(|scope| scope.groups.get(scope_name))
            .ok_or_else(stale)?;
        Ok(group.body.clone())
    }

    fn build_nodes(&mut self, scope: &mut HostScope, parent: NodeId, nodes: &[Node]) -> Result<()> {
        for node in nodes {
            match node {
                Node::Element(element) => {
                    let id = self.display.create_element(&element.tag);
                    self.display.append_child(parent, id);
                    if let Some(name) = &element.reference {
                        let binder = self.managers[scope.shape.index()]
                            .descend(&scope.path)?
                            .binder(name)?;
                        self.targets.insert(
                            id,
                            Target {
                                bound: binder.bind(),
                                shape: scope.shape,
                                path: scope.path.clone(),
                                name: name.clone(),
                                events: element.events.clone(),
                            },
                        );
                    }
                    for (attribute, binding) in &element.attributes {
                        match binding {
                            Binding::Static(value) => self.display.set_attribute(id, attribute, value),
                            Binding::Field(field) => scope.bindings.push(FieldBinding {
                                field: field.clone(),
                                node: id,
                                target: BindTarget::Attribute(attribute.clone()),
                            }),
                        }
                    }
                    if let Some(text) = &element.text {
                        self.build_text(scope, id, text);
                    }
                    self.build_nodes(scope, id, &element.children)?;
                }
                Node::Text(binding) => self.build_text(scope, parent, binding),
                Node::ForEach(group) => {
                    let anchor = self.display.create_group();
                    self.display.append_child(parent, anchor);
                    scope.groups.insert(
                        group.scope.clone(),
                        KeyedGroup {
                            anchor,
                            body: Rc::from(group.body.clone()),
                            keys: Vec::new(),
                        },
                    );
                }
                Node::Child(child) => {
                    let shape = self.registry.shape(&child.component)?;
                    let binder = self.managers[scope.shape.index()]
                        .descend(&scope.path)?
                        .binder(&child.reference)?;
                    let coordinate = binder.bind().coordinate.child(&child.reference);
                    self.instances
                        .mount(coordinate.clone(), ScopeKind::Component, coordinate.clone());
                    let container = self.mount_scope(coordinate.clone(), shape, Vec::new(), coordinate)?;
                    self.display.append_child(parent, container);
                }
            }
        }
        Ok(())
    }

    fn build_text(&mut self, scope: &mut HostScope, parent: NodeId, binding: &Binding) {
        match binding {
            Binding::Static(content) => {
                let id = self.display.create_text(content);
                self.display.append_child(parent, id);
            }
            Binding::Field(field) => {
                let id = self.display.create_text("");
                self.display.append_child(parent, id);
                scope.bindings.push(FieldBinding {
                    field: field.clone(),
                    node: id,
                    target: BindTarget::Text,
                });
            }
        }
    }

    /// Drop `coordinate` and every scope under it.
    fn unmount(&mut self, coordinate: &Coordinate) {
        let removed = self.instances.unmount_subtree(coordinate);
        if let Some(scope) = self.scopes.get(coordinate) {
            self.display.remove(scope.node);
        }
        self.scopes.retain(|live, _| !live.starts_with(coordinate));
        self.targets
            .retain(|_, target| !target.bound.coordinate.starts_with(coordinate));
        debug!(%coordinate, scopes = removed.len(), "host subtree unmounted");
    }

    // =========================================================================
    // Inbound: patches and capability requests
    // =========================================================================

    /// Process everything the worker has sent. Returns the number of
    /// envelopes handled.
    pub fn pump(&mut self) -> Result<usize> {
        let incoming = self.channel.receive()?;
        let handled = incoming.len();
        for envelope in incoming {
            match envelope {
                Envelope::ViewStateUpdate(update) => self.apply_update(update)?,
                Envelope::CapabilityRequest(request) => self.answer(request),
                other => warn!(kind = other.kind(), "unexpected envelope from worker"),
            }
        }
        for envelope in self.outbox.drain() {
            self.channel.send(envelope)?;
        }
        Ok(handled)
    }

    fn apply_update(&mut self, update: ViewStateUpdate) -> Result<()> {
        let ViewStateUpdate { coordinate, patch } = update;
        let Some(scope) = self.scopes.get(&coordinate) else {
            debug!(%coordinate, "update for an unmounted scope dropped");
            self.stats.updates_dropped += 1;
            return Ok(());
        };

        for binding in &scope.bindings {
            let Some(value) = patch.fields.get(&binding.field) else {
                continue;
            };
            let text = display_text(value);
            match &binding.target {
                BindTarget::Text => self.display.set_text(binding.node, &text),
                BindTarget::Attribute(name) => self.display.set_attribute(binding.node, name, &text),
            }
        }

        for change in patch.lists {
            self.apply_list_change(&coordinate, change)?;
        }
        self.stats.updates_applied += 1;
        Ok(())
    }

    fn apply_list_change(&mut self, coordinate: &Coordinate, change: ListChange) -> Result<()> {
        let Some((anchor, shape, owner, path)) = self.scopes.get(coordinate).and_then(|scope| {
            let group = scope.groups.get(&change.scope)?;
            let mut path = scope.path.clone();
            path.push(change.scope.clone());
            Some((group.anchor, scope.shape, scope.owner.clone(), path))
        }) else {
            warn!(%coordinate, scope = %change.scope, "list change for an unknown keyed group");
            return Ok(());
        };

        for op in &change.ops {
            let item = coordinate.child(op.key());
            match op {
                ListOp::Remove { .. } => self.unmount(&item),
                ListOp::Insert { index, generation, .. } => {
                    if self.scopes.contains_key(&item) {
                        self.unmount(&item);
                    }
                    self.instances
                        .adopt(item.clone(), ScopeKind::Item, owner.clone(), *generation);
                    let container = self.mount_scope(item, shape, path.clone(), owner.clone())?;
                    self.display.insert_child(anchor, *index, container);
                }
                ListOp::Move { index, .. } => match self.scopes.get(&item) {
                    Some(scope) => self.display.insert_child(anchor, *index, scope.node),
                    None => warn!(%item, "move of an unmounted item"),
                },
            }
        }

        if let Some(group) = self
            .scopes
            .get_mut(coordinate)
            .and_then(|scope| scope.groups.get_mut(&change.scope))
        {
            apply_list_ops(&mut group.keys, &change.ops);
        }
        Ok(())
    }

    fn answer(&mut self, request: CapabilityRequest) {
        let outcome = self.repository.execute(request.repository_id, &request.input);
        trace!(call = %request.call, capability = %request.repository_id, "capability answered");
        self.stats.capability_calls += 1;
        self.outbox.push(Envelope::CapabilityResult(CapabilityResult {
            call: request.call,
            repository_id: request.repository_id,
            outcome,
        }));
    }

    // =========================================================================
    // Outbound: events
    // =========================================================================

    /// Forward a native event to the worker.
    ///
    /// Returns `false` when the event was dropped: its target is not a
    /// referenced element, the element does not forward this kind, or its
    /// scope has been unmounted.
    pub fn dispatch_native(&mut self, event: &NativeEvent) -> Result<bool> {
        let Some(target) = self.targets.get(&event.target) else {
            debug!(node = event.target.index(), kind = %event.kind, "event on an unreferenced node dropped");
            self.stats.events_dropped += 1;
            return Ok(false);
        };
        if !target.events.iter().any(|kind| *kind == event.kind) {
            debug!(reference = %target.bound.id, kind = %event.kind, "event kind not forwarded");
            self.stats.events_dropped += 1;
            return Ok(false);
        }
        let coordinate = target.bound.coordinate.clone();
        let Some(scope) = self.instances.get(&coordinate) else {
            debug!(%coordinate, "event for an unmounted scope dropped");
            self.stats.events_dropped += 1;
            return Ok(false);
        };

        let projection = event.project();
        if let Some(surface) = self.managers[target.shape.index()]
            .descend(&target.path)
            .ok()
            .and_then(|manager| manager.surface(&target.name))
        {
            surface.notify(&coordinate, &projection);
        }

        let message = EventMessage {
            reference: target.bound.id,
            coordinate,
            generation: scope.item_generation,
            projection,
        };
        trace!(reference = %message.reference, coordinate = %message.coordinate, generation = %message.generation, "event sent");
        self.channel.send(Envelope::Event(message))?;
        self.stats.events_sent += 1;
        Ok(true)
    }
}

/// Render a view-state value for a text node or attribute.
fn display_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
