//! Reference declarations, as emitted by the template compiler.

use indexmap::IndexMap;

/// Ordered reference names of one scope of a component template.
///
/// The root scope of a component declares `elements` and `components`. Each
/// keyed group gets a nested declaration that declares `collections` and
/// `collection_components` for the positions repeated once per item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefDeclaration {
    pub elements: Vec<String>,
    pub collections: Vec<String>,
    pub components: Vec<String>,
    pub collection_components: Vec<String>,
    pub nested: IndexMap<String, RefDeclaration>,
}

impl RefDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn element(mut self, name: impl Into<String>) -> Self {
        self.elements.push(name.into());
        self
    }

    pub fn collection(mut self, name: impl Into<String>) -> Self {
        self.collections.push(name.into());
        self
    }

    pub fn component(mut self, name: impl Into<String>) -> Self {
        self.components.push(name.into());
        self
    }

    pub fn collection_component(mut self, name: impl Into<String>) -> Self {
        self.collection_components.push(name.into());
        self
    }

    /// Declare the nested scope of the keyed group `scope`.
    pub fn nested(mut self, scope: impl Into<String>, declaration: RefDeclaration) -> Self {
        self.nested.insert(scope.into(), declaration);
        self
    }

    /// Total number of references, nested scopes included.
    pub fn len(&self) -> usize {
        self.elements.len()
            + self.collections.len()
            + self.components.len()
            + self.collection_components.len()
            + self.nested.values().map(RefDeclaration::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
