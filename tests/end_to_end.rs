//! End-to-end behaviour of a host and a worker over the in-memory transport.
//!
//! Run with: cargo test --test end_to_end

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use spark_signals::{Signal, signal};

use common::*;
use spark_sandbox::host::Mutation;
use spark_sandbox::template::{component, element, for_each, text_field};
use spark_sandbox::{ComponentTemplate, Components, Coordinate, FunctionRepository, RefDeclaration};

// =============================================================================
// KEYED LISTS
// =============================================================================

#[test]
fn click_patches_only_the_clicked_item() {
    let (mut pair, state) = todo_pair(&["a", "b", "c"]);
    assert_eq!(
        pair.render(),
        "<h1>Todos</h1><ul><li>a</li><li>b</li><li>c</li></ul>"
    );

    let before = pair.host.stats().updates_applied;
    assert!(pair.click("itemButton", &["b"]));
    pair.settle();

    assert_eq!(state.clicked(), vec!["b".to_string()]);
    assert_eq!(pair.host.stats().updates_applied, before + 1);
    let mutations = pair.mutations();
    assert_eq!(mutations.len(), 1);
    assert!(matches!(&mutations[0], Mutation::SetText { content, .. } if content == "done"));
    assert_eq!(
        pair.render(),
        "<h1>Todos</h1><ul><li>a</li><li>done</li><li>c</li></ul>"
    );
}

#[test]
fn event_for_a_removed_item_is_dropped() {
    let (mut pair, state) = todo_pair(&["a", "b", "c"]);

    // The worker removes b; the host has not heard yet and still shows it.
    state.set_keys(&["a", "c"]);
    pair.worker.pump().unwrap();
    assert!(pair.click("itemButton", &["b"]));
    pair.settle();

    assert!(state.clicked().is_empty());
    assert_eq!(pair.worker.stats().events_dropped, 1);
    assert_eq!(pair.render(), "<h1>Todos</h1><ul><li>a</li><li>c</li></ul>");
    assert!(!pair.host.is_mounted(&Coordinate::new(["b"])));
}

#[test]
fn event_from_a_reused_key_is_dropped() {
    let (mut pair, state) = todo_pair(&["a", "b"]);

    // b is removed and re-added before the host catches up.
    state.set_keys(&["a"]);
    pair.worker.pump().unwrap();
    state.set_keys(&["a", "b"]);
    pair.worker.pump().unwrap();

    assert!(pair.click("itemButton", &["b"]));
    pair.settle();
    assert!(state.clicked().is_empty());
    assert_eq!(pair.worker.stats().events_dropped, 1);

    // The fresh b is a different instance and handles clicks normally.
    assert!(pair.click("itemButton", &["b"]));
    pair.settle();
    assert_eq!(state.clicked(), vec!["b".to_string()]);
    assert_eq!(pair.render(), "<h1>Todos</h1><ul><li>a</li><li>done</li></ul>");
}

#[test]
fn reorder_moves_items_without_recreating_them() {
    let (mut pair, state) = todo_pair(&["a", "b", "c"]);
    let node_a = pair.node("itemButton", &["a"]);

    state.set_keys(&["c", "a", "b"]);
    pair.settle();

    assert_eq!(
        pair.render(),
        "<h1>Todos</h1><ul><li>c</li><li>a</li><li>b</li></ul>"
    );
    assert_eq!(pair.node("itemButton", &["a"]), node_a);
    assert!(
        pair.mutations()
            .iter()
            .all(|mutation| matches!(mutation, Mutation::Insert { .. }))
    );

    assert!(pair.click("itemButton", &["a"]));
    pair.settle();
    assert_eq!(state.clicked(), vec!["a".to_string()]);
}

#[test]
fn inserted_items_render_with_their_fields() {
    let (mut pair, state) = todo_pair(&["a"]);
    state.set_keys(&["z", "a", "m"]);
    pair.settle();

    assert_eq!(
        pair.render(),
        "<h1>Todos</h1><ul><li>z</li><li>a</li><li>m</li></ul>"
    );
    assert!(pair.host.is_mounted(&Coordinate::new(["m"])));
    assert!(pair.worker.is_mounted(&Coordinate::new(["m"])));
}

// =============================================================================
// SIBLING GROUPS
// =============================================================================

/// Two keyed groups in one scope, both placing a reference named `row`.
fn board_templates() -> Vec<ComponentTemplate> {
    let rows = |scope: &str| {
        for_each(scope, scope, "id").child(element("li").reference("row").on("click").child(text_field("text")))
    };
    vec![ComponentTemplate::new(
        "Board",
        RefDeclaration::new()
            .nested("todo", RefDeclaration::new().collection("row"))
            .nested("done", RefDeclaration::new().collection("row")),
        vec![
            element("ul").child(rows("todo")).into(),
            element("ol").child(rows("done")).into(),
        ],
    )]
}

/// Clicks are logged as `group:key`.
fn board_pair(lists: Value) -> (Pair, Signal<Value>, Rc<RefCell<Vec<String>>>) {
    let board = signal(lists);
    let clicked = Rc::new(RefCell::new(Vec::new()));
    let components = {
        let board = board.clone();
        let clicked = clicked.clone();
        Components::new().register("Board", move |_props, refs| {
            for (reference, group) in [("todo/row", "todo"), ("done/row", "done")] {
                let clicked = clicked.clone();
                refs.on(reference, "click", move |ctx| {
                    let key = ctx.item_key().unwrap_or_default();
                    clicked.borrow_mut().push(format!("{group}:{key}"));
                });
            }
            let board = board.clone();
            Box::new(move || board.get())
        })
    };
    let mut pair = Pair::new(board_templates, components, FunctionRepository::empty());
    pair.start("Board", json!({}));
    (pair, board, clicked)
}

#[test]
fn key_shared_by_sibling_groups_goes_to_the_first() {
    let (mut pair, board, clicked) = board_pair(json!({
        "todo": [{"id": 1, "text": "write"}],
        "done": [{"id": 1, "text": "read"}],
    }));
    assert_eq!(pair.render(), "<ul><li>write</li></ul><ol></ol>");

    // The skipped item is not re-sent on every turn.
    let sent = pair.worker.stats().updates_sent;
    pair.worker.pump().unwrap();
    pair.settle();
    assert_eq!(pair.worker.stats().updates_sent, sent);
    assert_eq!(pair.host.stats().updates_dropped, 0);

    assert!(pair.click("row", &["1"]));
    pair.settle();
    assert_eq!(*clicked.borrow(), vec!["todo:1".to_string()]);

    // Once the first group lets go, the key moves to the second.
    board.set(json!({"todo": [], "done": [{"id": 1, "text": "read"}]}));
    pair.settle();
    assert_eq!(pair.render(), "<ul></ul><ol><li>read</li></ol>");

    assert!(pair.click("row", &["1"]));
    pair.settle();
    assert_eq!(*clicked.borrow(), vec!["todo:1".to_string(), "done:1".to_string()]);
}

#[test]
fn same_reference_name_in_two_groups_gets_both_handlers() {
    let (mut pair, _board, clicked) = board_pair(json!({
        "todo": [{"id": "a", "text": "write"}],
        "done": [{"id": "b", "text": "read"}],
    }));
    assert_eq!(pair.render(), "<ul><li>write</li></ul><ol><li>read</li></ol>");

    assert!(pair.click("row", &["b"]));
    assert!(pair.click("row", &["a"]));
    pair.settle();

    assert_eq!(*clicked.borrow(), vec!["done:b".to_string(), "todo:a".to_string()]);
    assert_eq!(pair.worker.stats().events_dropped, 0);
}

// =============================================================================
// NESTED COLLECTIONS
// =============================================================================

fn order_templates() -> Vec<ComponentTemplate> {
    let lines = for_each("lines", "lines", "id")
        .child(element("button").reference("lineButton").on("click").child(text_field("label")));
    let orders = for_each("orders", "orders", "id")
        .child(element("li").child(text_field("name")).child(element("ol").child(lines)));
    vec![
        ComponentTemplate::new(
            "Orders",
            RefDeclaration::new().component("summary").nested(
                "orders",
                RefDeclaration::new().nested("lines", RefDeclaration::new().collection("lineButton")),
            ),
            vec![
                component("summary", "Summary").props_field("summary").into(),
                element("ul").child(orders).into(),
            ],
        ),
        ComponentTemplate::new("Summary", RefDeclaration::new(), vec![element("p").text_field("total").into()]),
    ]
}

/// Clicking a line removes it from its order.
fn order_components(orders: Signal<Value>, clicked: Rc<RefCell<Vec<Coordinate>>>) -> Components {
    Components::new()
        .register("Orders", move |_props, refs| {
            let clicked = clicked.clone();
            let edited = orders.clone();
            refs.on("lineButton", "click", move |ctx| {
                clicked.borrow_mut().push(ctx.coordinate().clone());
                let [order, line] = ctx.coordinate().segments() else { return };
                let mut next = edited.get();
                for entry in next.as_array_mut().into_iter().flatten() {
                    if entry["id"] == order.as_str() {
                        if let Some(lines) = entry["lines"].as_array_mut() {
                            lines.retain(|item| item["id"] != line.as_str());
                        }
                    }
                }
                edited.set(next);
            });

            let orders = orders.clone();
            Box::new(move || {
                let orders = orders.get();
                let total: usize = orders
                    .as_array()
                    .map(|all| all.iter().map(|order| order["lines"].as_array().map_or(0, Vec::len)).sum())
                    .unwrap_or(0);
                json!({"summary": {"total": format!("{total} lines")}, "orders": orders})
            })
        })
        .register("Summary", |props, _refs| Box::new(move || json!({"total": props.get()["total"]})))
}

#[test]
fn nested_items_address_both_keys() {
    let orders = signal(json!([
        {"id": "o1", "name": "A", "lines": [{"id": "l1", "label": "x"}, {"id": "l2", "label": "y"}]},
        {"id": "o2", "name": "B", "lines": [{"id": "l1", "label": "z"}]},
    ]));
    let clicked = Rc::new(RefCell::new(Vec::new()));
    let mut pair = Pair::new(
        order_templates,
        order_components(orders.clone(), clicked.clone()),
        FunctionRepository::empty(),
    );
    pair.start("Orders", json!({}));

    assert_eq!(
        pair.render(),
        "<p>3 lines</p><ul><li>A<ol><button>x</button><button>y</button></ol></li><li>B<ol><button>z</button></ol></li></ul>"
    );
    assert_ne!(pair.node("lineButton", &["o1", "l1"]), pair.node("lineButton", &["o2", "l1"]));

    assert!(pair.click("lineButton", &["o2", "l1"]));
    pair.settle();

    assert_eq!(*clicked.borrow(), vec![Coordinate::new(["o2", "l1"])]);
    assert_eq!(
        pair.render(),
        "<p>2 lines</p><ul><li>A<ol><button>x</button><button>y</button></ol></li><li>B<ol></ol></li></ul>"
    );
    assert!(!pair.host.is_mounted(&Coordinate::new(["o2", "l1"])));
    assert!(pair.host.is_mounted(&Coordinate::new(["o1", "l1"])));
}

#[test]
fn child_props_follow_the_parent_after_mount() {
    let orders = signal(json!([{"id": "o1", "name": "A", "lines": []}]));
    let mut pair = Pair::new(
        order_templates,
        order_components(orders.clone(), Rc::new(RefCell::new(Vec::new()))),
        FunctionRepository::empty(),
    );
    pair.start("Orders", json!({}));
    assert_eq!(pair.render(), "<p>0 lines</p><ul><li>A<ol></ol></li></ul>");
    let instances = pair.worker.instance_count();

    orders.set(json!([{"id": "o1", "name": "A", "lines": [{"id": "l1", "label": "x"}]}]));
    pair.settle();

    assert_eq!(pair.render(), "<p>1 lines</p><ul><li>A<ol><button>x</button></ol></li></ul>");
    // The summary was updated in place, not rebuilt.
    assert_eq!(pair.worker.instance_count(), instances);
    assert!(
        pair.mutations()
            .iter()
            .any(|mutation| matches!(mutation, Mutation::SetText { content, .. } if content == "1 lines"))
    );
}

// =============================================================================
// RECURSION
// =============================================================================

#[test]
fn recursive_tree_resolves_deep_coordinates() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut pair = Pair::new(tree_templates, tree_components(log.clone()), FunctionRepository::empty());
    pair.start(
        "Tree",
        json!({
            "name": "root",
            "children": [{
                "id": "a", "name": "A",
                "children": [{
                    "id": "b", "name": "B",
                    "children": [{"id": "c", "name": "C", "children": []}]
                }]
            }]
        }),
    );

    assert_eq!(
        pair.render(),
        "<span>root</span><ul><li><span>A</span><ul><li><span>B</span><ul><li><span>C</span><ul></ul></li></ul></li></ul></li></ul>"
    );
    assert_eq!(pair.worker.instance_count(), 4);

    let deepest = ["a", "node", "b", "node", "c", "node"];
    assert!(pair.click("label", &deepest));
    assert!(pair.click("label", &[]));
    pair.settle();

    assert_eq!(
        *log.borrow(),
        vec![Coordinate::new(deepest), Coordinate::root()]
    );
}

// =============================================================================
// CAPABILITIES
// =============================================================================

fn files_pair() -> Pair {
    let mut pair = Pair::new(files_templates, files_components(), files_repository());
    pair.start("Files", json!({}));
    pair
}

#[test]
fn capability_result_reaches_the_component() {
    let mut pair = files_pair();
    assert!(pair.render().ends_with("<p>idle</p>"));

    pair.click("double", &[]);
    pair.settle();

    assert!(pair.render().ends_with("<p>ok: 42</p>"), "{}", pair.render());
    assert_eq!(pair.host.stats().capability_calls, 1);
    assert_eq!(pair.worker.capabilities().in_flight(), 0);
}

#[test]
fn unknown_capability_fails_the_call() {
    let mut pair = files_pair();
    pair.click("missing", &[]);
    pair.settle();

    assert!(
        pair.render().ends_with("<p>error: capability fn#7 is not registered</p>"),
        "{}",
        pair.render()
    );
}

#[test]
fn panicking_capability_is_rejected() {
    let mut pair = files_pair();
    pair.click("explode", &[]);
    pair.settle();

    assert!(
        pair.render().ends_with("<p>error: capability rejected the call: disk on fire</p>"),
        "{}",
        pair.render()
    );
}

#[test]
fn closing_fails_calls_in_flight() {
    let mut pair = files_pair();
    pair.click("double", &[]);
    // The worker issues the request, but the host never answers.
    pair.worker.pump().unwrap();
    assert_eq!(pair.worker.capabilities().in_flight(), 1);

    pair.host.close();
    assert!(pair.worker.pump().is_err());
    assert_eq!(pair.worker.capabilities().in_flight(), 0);
}
