//! Display tree abstraction and an arena-backed in-memory implementation.
//!
//! [`NodeId`] is a host-only handle. It is deliberately not serializable:
//! nothing that leaves the host can name a display node.

use indexmap::IndexMap;
use tracing::warn;

/// Handle to a node of a [`DisplayTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// The mutable display tree owned by the host.
///
/// Only the host bridge calls these. Operations on a node that no longer
/// exists are ignored.
pub trait DisplayTree {
    fn root(&self) -> NodeId;

    fn create_element(&mut self, tag: &str) -> NodeId;

    fn create_text(&mut self, content: &str) -> NodeId;

    /// Invisible container. Only its children are displayed.
    fn create_group(&mut self) -> NodeId;

    fn append_child(&mut self, parent: NodeId, child: NodeId);

    /// Place `child` at `index` among the children of `parent`, detaching it
    /// from wherever it is first. Moving an attached node keeps its subtree.
    fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId);

    /// Detach `node` and destroy it together with its subtree.
    fn remove(&mut self, node: NodeId);

    fn set_text(&mut self, node: NodeId, content: &str);

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);
}

/// One recorded mutation of a [`MemoryDisplay`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Insert { parent: NodeId, index: usize, node: NodeId },
    Remove { node: NodeId },
    SetText { node: NodeId, content: String },
    SetAttribute { node: NodeId, name: String, value: String },
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attributes: IndexMap<String, String>,
    },
    Text(String),
    Group,
}

#[derive(Debug, Clone)]
struct Slot {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

// =============================================================================
// MemoryDisplay
// =============================================================================

/// Arena display tree. Freed indices go to a pool and are reused.
///
/// Mutations are only logged by a display built with [`MemoryDisplay::recording`].
#[derive(Debug)]
pub struct MemoryDisplay {
    slots: Vec<Option<Slot>>,
    free: Vec<usize>,
    root: NodeId,
    mutations: Option<Vec<Mutation>>,
}

impl Default for MemoryDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDisplay {
    pub fn new() -> Self {
        let mut display = Self {
            slots: Vec::new(),
            free: Vec::new(),
            root: NodeId(0),
            mutations: None,
        };
        display.root = display.allocate(NodeData::Group);
        display
    }

    /// A display that logs every mutation until [`take_mutations`] drains it.
    ///
    /// [`take_mutations`]: MemoryDisplay::take_mutations
    pub fn recording() -> Self {
        Self {
            mutations: Some(Vec::new()),
            ..Self::new()
        }
    }

    fn record(&mut self, mutation: Mutation) {
        if let Some(log) = &mut self.mutations {
            log.push(mutation);
        }
    }

    fn allocate(&mut self, data: NodeData) -> NodeId {
        let slot = Slot {
            data,
            parent: None,
            children: Vec::new(),
        };
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(slot);
                NodeId(index)
            }
            None => {
                self.slots.push(Some(slot));
                NodeId(self.slots.len() - 1)
            }
        }
    }

    fn slot(&self, node: NodeId) -> Option<&Slot> {
        self.slots.get(node.0).and_then(Option::as_ref)
    }

    fn slot_mut(&mut self, node: NodeId) -> Option<&mut Slot> {
        self.slots.get_mut(node.0).and_then(Option::as_mut)
    }

    fn detach(&mut self, node: NodeId) {
        let parent = self.slot_mut(node).and_then(|slot| slot.parent.take());
        if let Some(parent) = parent.and_then(|parent| self.slot_mut(parent)) {
            parent.children.retain(|child| *child != node);
        }
    }

    fn release(&mut self, node: NodeId) {
        let Some(slot) = self.slots.get_mut(node.0).and_then(Option::take) else {
            return;
        };
        for child in slot.children {
            self.release(child);
        }
        self.free.push(node.0);
    }

    pub fn is_live(&self, node: NodeId) -> bool {
        self.slot(node).is_some()
    }

    /// Live nodes, the root group included.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.slot(node).map(|slot| slot.children.as_slice()).unwrap_or(&[])
    }

    pub fn tag(&self, node: NodeId) -> Option<&str> {
        match &self.slot(node)?.data {
            NodeData::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.slot(node)?.data {
            NodeData::Element { attributes, .. } => attributes.get(name).map(String::as_str),
            _ => None,
        }
    }

    /// Concatenated text of the subtree under `node`.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        let Some(slot) = self.slot(node) else { return };
        if let NodeData::Text(content) = &slot.data {
            out.push_str(content);
        }
        for child in &slot.children {
            self.collect_text(*child, out);
        }
    }

    /// Elements with `tag`, in document order.
    pub fn elements(&self, tag: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        self.collect_elements(self.root, tag, &mut found);
        found
    }

    fn collect_elements(&self, node: NodeId, tag: &str, found: &mut Vec<NodeId>) {
        if self.tag(node) == Some(tag) {
            found.push(node);
        }
        for child in self.children(node) {
            self.collect_elements(*child, tag, found);
        }
    }

    /// Markup of the whole tree. Groups are transparent.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_node(self.root, &mut out);
        out
    }

    fn render_node(&self, node: NodeId, out: &mut String) {
        let Some(slot) = self.slot(node) else { return };
        match &slot.data {
            NodeData::Text(content) => out.push_str(content),
            NodeData::Group => {
                for child in &slot.children {
                    self.render_node(*child, out);
                }
            }
            NodeData::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push_str(&format!(" {name}=\"{value}\""));
                }
                out.push('>');
                for child in &slot.children {
                    self.render_node(*child, out);
                }
                out.push_str(&format!("</{tag}>"));
            }
        }
    }

    /// Mutations recorded since the last call. Always empty unless the
    /// display is recording.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        self.mutations.as_mut().map(std::mem::take).unwrap_or_default()
    }
}

impl DisplayTree for MemoryDisplay {
    fn root(&self) -> NodeId {
        self.root
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.allocate(NodeData::Element {
            tag: tag.to_string(),
            attributes: IndexMap::new(),
        })
    }

    fn create_text(&mut self, content: &str) -> NodeId {
        self.allocate(NodeData::Text(content.to_string()))
    }

    fn create_group(&mut self) -> NodeId {
        self.allocate(NodeData::Group)
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let index = self.children(parent).len();
        self.insert_child(parent, index, child);
    }

    fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        if !self.is_live(parent) || !self.is_live(child) || parent == child {
            warn!(parent = parent.0, child = child.0, "insert on a dead node ignored");
            return;
        }
        self.detach(child);
        let Some(parent_slot) = self.slot_mut(parent) else { return };
        let index = index.min(parent_slot.children.len());
        parent_slot.children.insert(index, child);
        if let Some(child_slot) = self.slot_mut(child) {
            child_slot.parent = Some(parent);
        }
        self.record(Mutation::Insert {
            parent,
            index,
            node: child,
        });
    }

    fn remove(&mut self, node: NodeId) {
        if node == self.root || !self.is_live(node) {
            return;
        }
        self.detach(node);
        self.release(node);
        self.record(Mutation::Remove { node });
    }

    fn set_text(&mut self, node: NodeId, content: &str) {
        match self.slot_mut(node).map(|slot| &mut slot.data) {
            Some(NodeData::Text(text)) => {
                if text.as_str() == content {
                    return;
                }
                *text = content.to_string();
            }
            _ => {
                warn!(node = node.0, "set_text on a node that is not text");
                return;
            }
        }
        self.record(Mutation::SetText {
            node,
            content: content.to_string(),
        });
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        match self.slot_mut(node).map(|slot| &mut slot.data) {
            Some(NodeData::Element { attributes, .. }) => {
                if attributes.get(name).map(String::as_str) == Some(value) {
                    return;
                }
                attributes.insert(name.to_string(), value.to_string());
            }
            _ => {
                warn!(node = node.0, "set_attribute on a node that is not an element");
                return;
            }
        }
        self.record(Mutation::SetAttribute {
            node,
            name: name.to_string(),
            value: value.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_with_transparent_groups() {
        let mut display = MemoryDisplay::new();
        let list = display.create_element("ul");
        display.set_attribute(list, "class", "todo");
        let group = display.create_group();
        let item = display.create_element("li");
        let text = display.create_text("milk");

        display.append_child(display.root(), list);
        display.append_child(list, group);
        display.append_child(group, item);
        display.append_child(item, text);

        assert_eq!(display.render(), r#"<ul class="todo"><li>milk</li></ul>"#);
        assert_eq!(display.text_content(list), "milk");
    }

    #[test]
    fn test_insert_child_moves_existing_node() {
        let mut display = MemoryDisplay::new();
        let root = display.root();
        let nodes: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|label| {
                let text = display.create_text(label);
                display.append_child(root, text);
                text
            })
            .collect();

        display.insert_child(root, 0, nodes[2]);
        assert_eq!(display.render(), "cab");
        assert_eq!(display.children(root).len(), 3);
    }

    #[test]
    fn test_remove_frees_subtree_and_reuses_indices() {
        let mut display = MemoryDisplay::new();
        let root = display.root();
        let item = display.create_element("li");
        let text = display.create_text("x");
        display.append_child(root, item);
        display.append_child(item, text);
        assert_eq!(display.live_count(), 3);

        display.remove(item);
        assert!(!display.is_live(item));
        assert!(!display.is_live(text));
        assert_eq!(display.live_count(), 1);
        assert_eq!(display.render(), "");

        let reused = display.create_element("p");
        assert!(reused == item || reused == text);
    }

    #[test]
    fn test_unchanged_writes_are_not_recorded() {
        let mut display = MemoryDisplay::recording();
        let text = display.create_text("same");
        display.take_mutations();

        display.set_text(text, "same");
        assert!(display.take_mutations().is_empty());

        display.set_text(text, "new");
        assert_eq!(
            display.take_mutations(),
            vec![Mutation::SetText { node: text, content: "new".into() }]
        );
    }

    #[test]
    fn test_plain_display_keeps_no_log() {
        let mut display = MemoryDisplay::new();
        let root = display.root();
        for label in ["a", "b", "c"] {
            let text = display.create_text(label);
            display.append_child(root, text);
            display.set_text(text, "changed");
        }
        assert!(display.take_mutations().is_empty());
        assert_eq!(display.render(), "changedchangedchanged");
    }
}
