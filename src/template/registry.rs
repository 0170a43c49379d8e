//! Template Registry - the shared source both halves are built from.
//!
//! Registration order defines shape ids: the first template is shape 0, the
//! second shape 1, and so on. Host and worker must construct their registries
//! from the same list; the handshake manifest catches it when they don't.

use std::collections::HashMap;

use super::{Node, visit_scope};
use crate::error::{BridgeError, Result};
use crate::refs::{RefDeclaration, ReferenceManager, ShapeManifest};
use crate::types::{ShapeId, Side};

/// One compiled component: its reference declaration and its node tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentTemplate {
    pub name: String,
    pub declaration: RefDeclaration,
    pub root: Vec<Node>,
}

impl ComponentTemplate {
    pub fn new(name: impl Into<String>, declaration: RefDeclaration, root: Vec<Node>) -> Self {
        Self {
            name: name.into(),
            declaration,
            root,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: Vec<ComponentTemplate>,
    by_name: HashMap<String, ShapeId>,
}

impl TemplateRegistry {
    /// Register `templates` in order, checking every template's reference
    /// usage against its declaration.
    pub fn new(templates: Vec<ComponentTemplate>) -> Result<Self> {
        let mut by_name = HashMap::with_capacity(templates.len());
        for (index, template) in templates.iter().enumerate() {
            let shape = ShapeId(index as u32);
            if by_name.insert(template.name.clone(), shape).is_some() {
                return Err(BridgeError::shape_mismatch(
                    template.name.clone(),
                    "component template registered more than once",
                ));
            }
        }

        let registry = Self { templates, by_name };
        for (index, template) in registry.templates.iter().enumerate() {
            let manager = ReferenceManager::new(
                Side::Worker,
                ShapeId(index as u32),
                &template.name,
                &template.declaration,
            )?;
            registry.check_scope(&manager, &template.root)?;
        }
        Ok(registry)
    }

    /// Every reference of `manager` is placed exactly once in `nodes`, every
    /// placement names a declared reference of the right kind, and every keyed
    /// group has a nested declaration.
    fn check_scope(&self, manager: &ReferenceManager, nodes: &[Node]) -> Result<()> {
        let mut placed: HashMap<&str, usize> = HashMap::new();
        let mut groups: HashMap<&str, usize> = HashMap::new();
        let mut first_error = None;

        visit_scope(nodes, &mut |node| {
            if first_error.is_some() {
                return;
            }
            let outcome = match node {
                Node::Element(element) => match &element.reference {
                    Some(name) => {
                        *placed.entry(name.as_str()).or_default() += 1;
                        self.check_kind(manager, name, false)
                    }
                    None if !element.events.is_empty() => Err(BridgeError::shape_mismatch(
                        manager.label(),
                        format!("<{}> forwards events without a reference", element.tag),
                    )),
                    None => Ok(()),
                },
                Node::Child(child) => {
                    *placed.entry(child.reference.as_str()).or_default() += 1;
                    self.check_kind(manager, &child.reference, true).and_then(|_| {
                        self.shape(&child.component).map(|_| ())
                    })
                }
                Node::ForEach(group) => {
                    *groups.entry(group.scope.as_str()).or_default() += 1;
                    manager
                        .nested(&group.scope)
                        .map_err(|_| {
                            BridgeError::shape_mismatch(
                                manager.qualify(&group.scope),
                                "keyed group has no nested declaration",
                            )
                        })
                        .and_then(|nested| self.check_scope(nested, &group.body))
                }
                Node::Text(_) => Ok(()),
            };
            if let Err(err) = outcome {
                first_error = Some(err);
            }
        });

        if let Some(err) = first_error {
            return Err(err);
        }

        for entry in manager.entries() {
            match placed.get(entry.name.as_str()).copied().unwrap_or(0) {
                1 => {}
                0 => {
                    return Err(BridgeError::shape_mismatch(
                        manager.qualify(&entry.name),
                        "declared but never placed in the template",
                    ));
                }
                n => {
                    return Err(BridgeError::shape_mismatch(
                        manager.qualify(&entry.name),
                        format!("placed {n} times in one scope"),
                    ));
                }
            }
        }
        for (scope, _) in manager.nested_scopes() {
            if groups.get(scope).copied().unwrap_or(0) != 1 {
                return Err(BridgeError::shape_mismatch(
                    manager.qualify(scope),
                    "nested scope must back exactly one keyed group",
                ));
            }
        }
        Ok(())
    }

    fn check_kind(&self, manager: &ReferenceManager, name: &str, component: bool) -> Result<()> {
        let entry = manager.entry(name).ok_or_else(|| {
            BridgeError::shape_mismatch(manager.qualify(name), "used by the template but never declared")
        })?;
        if entry.kind.is_component() != component {
            let used_as = if component { "a child component" } else { "an element" };
            return Err(BridgeError::shape_mismatch(
                manager.qualify(name),
                format!("declared as {} reference but used as {used_as}", entry.kind),
            ));
        }
        Ok(())
    }

    /// Shape id of the template `name`.
    pub fn shape(&self, name: &str) -> Result<ShapeId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| BridgeError::UnknownTemplate(name.to_string()))
    }

    pub fn get(&self, name: &str) -> Option<&ComponentTemplate> {
        self.by_name.get(name).and_then(|shape| self.template(*shape))
    }

    pub fn template(&self, shape: ShapeId) -> Option<&ComponentTemplate> {
        self.templates.get(shape.index())
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ShapeId, &ComponentTemplate)> {
        self.templates
            .iter()
            .enumerate()
            .map(|(index, template)| (ShapeId(index as u32), template))
    }

    /// One reference manager per registered shape, indexed by shape id.
    pub fn managers(&self, side: Side) -> Result<Vec<ReferenceManager>> {
        self.iter()
            .map(|(shape, template)| ReferenceManager::new(side, shape, &template.name, &template.declaration))
            .collect()
    }

    /// Concatenated manifest of every shape, exchanged during the handshake.
    pub fn manifest(&self) -> Result<ShapeManifest> {
        let mut manifest = ShapeManifest::new();
        for manager in self.managers(Side::Worker)? {
            manifest.extend(manager.manifest());
        }
        Ok(manifest)
    }
}
