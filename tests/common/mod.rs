//! Shared harness for the end-to-end bridge tests.
//!
//! A host and a worker talk over an in-memory transport pair. Nothing moves
//! until one side pumps, so each test controls exactly which side sees what,
//! and when.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Value, json};
use spark_signals::{Signal, signal};

use spark_sandbox::host::Mutation;
use spark_sandbox::template::{component, element, for_each, text_field};
use spark_sandbox::transport::memory::{self, MemoryEndpoint};
use spark_sandbox::{
    BridgeConfig, CapabilityId, ChannelState, ComponentTemplate, Components, Coordinate, FunctionRepository, HostBridge,
    MemoryDisplay, NativeEvent, NodeId, RefDeclaration, TemplateRegistry, WorkerBridge,
};

pub type Host = HostBridge<MemoryEndpoint, MemoryDisplay>;
pub type Worker = WorkerBridge<MemoryEndpoint>;

// =============================================================================
// PAIR
// =============================================================================

pub struct Pair {
    pub host: Host,
    pub worker: Worker,
}

impl Pair {
    /// Build both sides from the same template source. Nothing is connected
    /// or mounted yet.
    pub fn new(templates: fn() -> Vec<ComponentTemplate>, components: Components, repository: FunctionRepository) -> Self {
        let (near, far) = memory::pair();
        let host = HostBridge::new(
            near,
            TemplateRegistry::new(templates()).unwrap(),
            repository,
            MemoryDisplay::recording(),
            BridgeConfig::default(),
        )
        .unwrap();
        let worker = WorkerBridge::new(far, TemplateRegistry::new(templates()).unwrap(), components, BridgeConfig::default())
            .unwrap();
        Self { host, worker }
    }

    /// Mount `root` on both sides, connect from the host and settle.
    pub fn start(&mut self, root: &str, props: Value) {
        self.host.mount_root(root).unwrap();
        self.worker.mount_root(root, props).unwrap();
        self.host.connect().unwrap();
        self.settle();
        self.host.display_mut().take_mutations();
    }

    /// Pump both sides until both channels are open and a full round moves
    /// nothing.
    pub fn settle(&mut self) {
        for _ in 0..64 {
            let worker = self.worker.pump().unwrap();
            let host = self.host.pump().unwrap();
            let open = self.host.channel_state() == ChannelState::Open
                && self.worker.channel_state() == ChannelState::Open;
            if open && worker == 0 && host == 0 {
                return;
            }
        }
        panic!("bridge did not settle");
    }

    pub fn node(&self, reference: &str, coordinate: &[&str]) -> NodeId {
        self.host
            .find_node(reference, &Coordinate::new(coordinate.iter().copied()))
            .unwrap_or_else(|| panic!("no `{reference}` at {coordinate:?}"))
    }

    /// Dispatch a click on `reference` at `coordinate`. Does not settle.
    pub fn click(&mut self, reference: &str, coordinate: &[&str]) -> bool {
        let node = self.node(reference, coordinate);
        self.host.dispatch_native(&NativeEvent::click(node)).unwrap()
    }

    pub fn render(&self) -> String {
        self.host.display().render()
    }

    pub fn mutations(&mut self) -> Vec<Mutation> {
        self.host.display_mut().take_mutations()
    }
}

// =============================================================================
// KEYED LIST FIXTURE
// =============================================================================

pub fn todo_templates() -> Vec<ComponentTemplate> {
    vec![ComponentTemplate::new(
        "TodoList",
        RefDeclaration::new()
            .element("title")
            .nested("items", RefDeclaration::new().collection("itemButton")),
        vec![
            element("h1").reference("title").child(text_field("title")).into(),
            element("ul")
                .child(
                    for_each("items", "items", "id")
                        .child(element("li").reference("itemButton").on("click").child(text_field("text"))),
                )
                .into(),
        ],
    )]
}

/// Worker-side handles into the todo list.
#[derive(Clone)]
pub struct TodoState {
    /// Items as `{id, text}` objects.
    pub items: Signal<Value>,
    /// Keys whose click handler ran, in order.
    pub clicked: Rc<RefCell<Vec<String>>>,
}

impl TodoState {
    pub fn new(keys: &[&str]) -> Self {
        let state = Self {
            items: signal(Value::Null),
            clicked: Rc::new(RefCell::new(Vec::new())),
        };
        state.set_keys(keys);
        state
    }

    pub fn set_keys(&self, keys: &[&str]) {
        let items: Vec<Value> = keys.iter().map(|key| json!({"id": key, "text": key})).collect();
        self.items.set(Value::Array(items));
    }

    pub fn clicked(&self) -> Vec<String> {
        self.clicked.borrow().clone()
    }
}

/// Clicking an item marks it done.
pub fn todo_components(state: &TodoState) -> Components {
    let state = state.clone();
    Components::new().register("TodoList", move |props, refs| {
        let done: Signal<Vec<String>> = signal(Vec::new());

        let clicked = state.clicked.clone();
        let marked = done.clone();
        refs.on("itemButton", "click", move |ctx| {
            let Some(key) = ctx.item_key() else { return };
            clicked.borrow_mut().push(key.to_string());
            let mut keys = marked.get();
            keys.push(key.to_string());
            marked.set(keys);
        });

        let items = state.items.clone();
        Box::new(move || {
            let done = done.get();
            let items: Vec<Value> = items
                .get()
                .as_array()
                .map(|items| {
                    items
                        .iter()
                        .map(|item| {
                            let id = item["id"].as_str().unwrap_or_default();
                            if done.iter().any(|key| key == id) {
                                json!({"id": id, "text": "done"})
                            } else {
                                item.clone()
                            }
                        })
                        .collect()
                })
                .unwrap_or_default();
            json!({"title": props.get()["title"], "items": items})
        })
    })
}

pub fn todo_pair(keys: &[&str]) -> (Pair, TodoState) {
    let state = TodoState::new(keys);
    let mut pair = Pair::new(todo_templates, todo_components(&state), FunctionRepository::empty());
    pair.start("TodoList", json!({"title": "Todos"}));
    (pair, state)
}

// =============================================================================
// TREE (recursive)
// =============================================================================

pub fn tree_templates() -> Vec<ComponentTemplate> {
    vec![ComponentTemplate::new(
        "Tree",
        RefDeclaration::new()
            .element("label")
            .nested("children", RefDeclaration::new().collection_component("node")),
        vec![
            element("span").reference("label").on("click").child(text_field("name")).into(),
            element("ul")
                .child(for_each("children", "children", "id").child(element("li").child(component("node", "Tree"))))
                .into(),
        ],
    )]
}

/// Every label click records the coordinate it fired at.
pub fn tree_components(log: Rc<RefCell<Vec<Coordinate>>>) -> Components {
    Components::new().register("Tree", move |props, refs| {
        let log = log.clone();
        refs.on("label", "click", move |ctx| log.borrow_mut().push(ctx.coordinate().clone()));
        Box::new(move || {
            let node = props.get();
            json!({"name": node["name"], "children": node["children"]})
        })
    })
}

// =============================================================================
// FILES (capabilities)
// =============================================================================

pub const DOUBLE: CapabilityId = CapabilityId(1);
pub const EXPLODE: CapabilityId = CapabilityId(2);
pub const MISSING: CapabilityId = CapabilityId(7);

pub fn files_templates() -> Vec<ComponentTemplate> {
    vec![ComponentTemplate::new(
        "Files",
        RefDeclaration::new().element("double").element("explode").element("missing"),
        vec![
            element("button").reference("double").on("click").text("double").into(),
            element("button").reference("explode").on("click").text("explode").into(),
            element("button").reference("missing").on("click").text("missing").into(),
            element("p").text_field("status").into(),
        ],
    )]
}

pub fn files_repository() -> FunctionRepository {
    FunctionRepository::builder()
        .register(DOUBLE, "double", |input| {
            input
                .as_i64()
                .map(|n| json!(n * 2))
                .ok_or_else(|| "expected a number".to_string())
        })
        .register(EXPLODE, "explode", |_| panic!("disk on fire"))
        .build()
        .unwrap()
}

/// Each button runs its capability and shows the outcome in `status`.
pub fn files_components() -> Components {
    Components::new().register("Files", |_props, refs| {
        let status = signal(String::from("idle"));
        for (reference, capability, input) in [
            ("double", DOUBLE, json!(21)),
            ("explode", EXPLODE, json!(null)),
            ("missing", MISSING, json!(null)),
        ] {
            let status = status.clone();
            refs.on(reference, "click", move |ctx| {
                let call = ctx.exec(capability, input.clone());
                let status = status.clone();
                ctx.spawn(async move {
                    let shown = match call.await {
                        Ok(value) => format!("ok: {value}"),
                        Err(err) => format!("error: {err}"),
                    };
                    status.set(shown);
                });
            });
        }
        Box::new(move || json!({"status": status.get()}))
    })
}
