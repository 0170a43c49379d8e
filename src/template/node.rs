//! Template nodes and their builders.

/// Where a text or attribute value comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Static(String),
    /// A field of the current scope's view state.
    Field(String),
}

/// How a child component receives its props from the enclosing scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropsSource {
    /// One field of the enclosing scope's view state.
    Field(String),
    /// The enclosing scope's whole view state (typically a keyed item).
    Scope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementNode {
    pub tag: String,
    pub reference: Option<String>,
    pub text: Option<Binding>,
    pub attributes: Vec<(String, Binding)>,
    /// Event kinds forwarded from this element. Requires a reference.
    pub events: Vec<String>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForEachNode {
    /// Name of the nested reference scope for the item template.
    pub scope: String,
    /// View-state field holding the item array.
    pub items: String,
    /// Item field holding the key.
    pub key: String,
    pub body: Vec<Node>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildNode {
    pub reference: String,
    /// Template name of the child component.
    pub component: String,
    pub props: PropsSource,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(ElementNode),
    Text(Binding),
    ForEach(ForEachNode),
    Child(ChildNode),
}

// =============================================================================
// Builders
// =============================================================================

pub fn element(tag: impl Into<String>) -> ElementNode {
    ElementNode {
        tag: tag.into(),
        reference: None,
        text: None,
        attributes: Vec::new(),
        events: Vec::new(),
        children: Vec::new(),
    }
}

/// Static text node.
pub fn text(content: impl Into<String>) -> Node {
    Node::Text(Binding::Static(content.into()))
}

/// Text node bound to a view-state field.
pub fn text_field(field: impl Into<String>) -> Node {
    Node::Text(Binding::Field(field.into()))
}

pub fn for_each(scope: impl Into<String>, items: impl Into<String>, key: impl Into<String>) -> ForEachNode {
    ForEachNode {
        scope: scope.into(),
        items: items.into(),
        key: key.into(),
        body: Vec::new(),
    }
}

/// Child component boundary. Receives the enclosing scope as props unless
/// [`ChildNode::props_field`] narrows it.
pub fn component(reference: impl Into<String>, component: impl Into<String>) -> ChildNode {
    ChildNode {
        reference: reference.into(),
        component: component.into(),
        props: PropsSource::Scope,
    }
}

impl ElementNode {
    pub fn reference(mut self, name: impl Into<String>) -> Self {
        self.reference = Some(name.into());
        self
    }

    pub fn text(mut self, content: impl Into<String>) -> Self {
        self.text = Some(Binding::Static(content.into()));
        self
    }

    pub fn text_field(mut self, field: impl Into<String>) -> Self {
        self.text = Some(Binding::Field(field.into()));
        self
    }

    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), Binding::Static(value.into())));
        self
    }

    pub fn attr_field(mut self, name: impl Into<String>, field: impl Into<String>) -> Self {
        self.attributes.push((name.into(), Binding::Field(field.into())));
        self
    }

    pub fn on(mut self, event: impl Into<String>) -> Self {
        self.events.push(event.into());
        self
    }

    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.children.push(node.into());
        self
    }
}

impl ForEachNode {
    pub fn child(mut self, node: impl Into<Node>) -> Self {
        self.body.push(node.into());
        self
    }
}

impl ChildNode {
    pub fn props_field(mut self, field: impl Into<String>) -> Self {
        self.props = PropsSource::Field(field.into());
        self
    }
}

impl From<ElementNode> for Node {
    fn from(node: ElementNode) -> Self {
        Node::Element(node)
    }
}

impl From<ForEachNode> for Node {
    fn from(node: ForEachNode) -> Self {
        Node::ForEach(node)
    }
}

impl From<ChildNode> for Node {
    fn from(node: ChildNode) -> Self {
        Node::Child(node)
    }
}

// =============================================================================
// Scope traversal
// =============================================================================

/// Visit every node that belongs to the scope of `nodes`: element children
/// are descended into, keyed-group bodies are not (they are their own scope).
pub fn visit_scope<'a>(nodes: &'a [Node], visit: &mut impl FnMut(&'a Node)) {
    for node in nodes {
        visit(node);
        if let Node::Element(element) = node {
            visit_scope(&element.children, visit);
        }
    }
}
