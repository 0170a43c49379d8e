//! Reference Manager - allocation table, binders, nested scopes.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::{ManifestEntry, PublicApi, RefDeclaration, RefSurface, ShapeManifest};
use crate::coordinate::{Coordinate, current_coordinate};
use crate::error::{BridgeError, Result};
use crate::types::{RefId, RefKind, ShapeId, Side};

/// One allocated reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    pub id: RefId,
    pub kind: RefKind,
    /// Name as declared, unique within its scope.
    pub name: String,
}

/// Reference factory handed to tree-construction code.
///
/// Captures the identity of one reference. Tree construction calls
/// [`Binder::bind`] once per concrete instance it creates (once per item for
/// collection references); each call records the coordinate active at that
/// moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binder {
    id: RefId,
    kind: RefKind,
    name: String,
}

impl Binder {
    pub fn id(&self) -> RefId {
        self.id
    }

    pub fn kind(&self) -> RefKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind one concrete instance at the current coordinate.
    pub fn bind(&self) -> BoundRef {
        BoundRef {
            id: self.id,
            kind: self.kind,
            coordinate: current_coordinate(),
        }
    }
}

/// One concrete instance of a reference: identity plus coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundRef {
    pub id: RefId,
    pub kind: RefKind,
    pub coordinate: Coordinate,
}

/// Reference table of one component shape (or one nested scope of it).
///
/// Immutable once built. The root scope holds static references, every
/// keyed group of the template has a nested manager holding its collection
/// references.
#[derive(Debug)]
pub struct ReferenceManager {
    side: Side,
    shape: ShapeId,
    component: String,
    path: Vec<String>,
    entries: Vec<RefEntry>,
    surfaces: IndexMap<String, RefSurface>,
    nested: IndexMap<String, ReferenceManager>,
}

impl ReferenceManager {
    /// Build the manager for `component` from its declaration.
    pub fn new(side: Side, shape: ShapeId, component: &str, declaration: &RefDeclaration) -> Result<Self> {
        let mut next_slot = 0;
        Self::build(side, shape, component, Vec::new(), declaration, &mut next_slot)
    }

    fn build(
        side: Side,
        shape: ShapeId,
        component: &str,
        path: Vec<String>,
        declaration: &RefDeclaration,
        next_slot: &mut u32,
    ) -> Result<Self> {
        let qualify = |name: &str| qualified_name(component, &path, name);
        let keyed = !path.is_empty();

        let lists = [
            (&declaration.elements, RefKind::Static),
            (&declaration.collections, RefKind::Collection),
            (&declaration.components, RefKind::Component),
            (&declaration.collection_components, RefKind::CollectionComponent),
        ];

        let mut entries = Vec::with_capacity(declaration.len());
        let mut seen = HashSet::new();
        for (names, kind) in lists {
            for name in names {
                if kind.is_collection() != keyed {
                    let detail = if keyed {
                        format!("{kind} reference declared inside a keyed scope")
                    } else {
                        format!("{kind} reference declared outside any keyed scope")
                    };
                    return Err(BridgeError::shape_mismatch(qualify(name), detail));
                }
                if !seen.insert(name.as_str()) {
                    return Err(BridgeError::shape_mismatch(qualify(name), "declared more than once"));
                }
                entries.push(RefEntry {
                    id: RefId::new(shape, *next_slot),
                    kind,
                    name: name.clone(),
                });
                *next_slot += 1;
            }
        }

        let mut nested = IndexMap::with_capacity(declaration.nested.len());
        for (scope, child) in &declaration.nested {
            let mut child_path = path.clone();
            child_path.push(scope.clone());
            let manager = Self::build(side, shape, component, child_path, child, next_slot)?;
            nested.insert(scope.clone(), manager);
        }

        let surfaces = match side {
            Side::Host => entries
                .iter()
                .map(|entry| (entry.name.clone(), RefSurface::new(entry.id, entry.kind)))
                .collect(),
            Side::Worker => IndexMap::new(),
        };

        Ok(Self {
            side,
            shape,
            component: component.to_string(),
            path,
            entries,
            surfaces,
            nested,
        })
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn shape(&self) -> ShapeId {
        self.shape
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Nested scope names from the component root down to this manager.
    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// Human readable scope label, `Component` or `Component::items/tags`.
    pub fn label(&self) -> String {
        if self.path.is_empty() {
            self.component.clone()
        } else {
            format!("{}::{}", self.component, self.path.join("/"))
        }
    }

    /// Qualified name of `name` in this scope, as it appears in manifests.
    pub fn qualify(&self, name: &str) -> String {
        qualified_name(&self.component, &self.path, name)
    }

    /// References declared directly in this scope.
    pub fn entries(&self) -> &[RefEntry] {
        &self.entries
    }

    pub fn entry(&self, name: &str) -> Option<&RefEntry> {
        self.entries.iter().find(|entry| entry.name == name)
    }

    /// Reference factory for `name`, declared in this scope.
    pub fn binder(&self, name: &str) -> Result<Binder> {
        let entry = self
            .entry(name)
            .ok_or_else(|| BridgeError::unknown_reference(self.label(), name))?;
        Ok(Binder {
            id: entry.id,
            kind: entry.kind,
            name: entry.name.clone(),
        })
    }

    /// Manager of the keyed group `scope` declared in this scope.
    pub fn nested(&self, scope: &str) -> Result<&ReferenceManager> {
        self.nested
            .get(scope)
            .ok_or_else(|| BridgeError::unknown_reference(self.label(), scope))
    }

    /// Follow a path of nested scope names.
    pub fn descend(&self, path: &[String]) -> Result<&ReferenceManager> {
        path.iter().try_fold(self, |manager, scope| manager.nested(scope))
    }

    pub fn nested_scopes(&self) -> impl Iterator<Item = (&str, &ReferenceManager)> {
        self.nested.iter().map(|(scope, manager)| (scope.as_str(), manager))
    }

    /// Resolve a reference by name from this scope down.
    ///
    /// A bare name (`row`) must be unique across this scope and every nested
    /// scope below it. A path (`done/row`) names the nested scope explicitly.
    pub fn lookup(&self, name: &str) -> Result<&RefEntry> {
        let unknown = || BridgeError::unknown_reference(self.label(), name);
        if let Some((scopes, leaf)) = name.rsplit_once('/') {
            let path: Vec<String> = scopes.split('/').map(str::to_string).collect();
            return self
                .descend(&path)
                .ok()
                .and_then(|manager| manager.entry(leaf))
                .ok_or_else(unknown);
        }

        let mut found = Vec::new();
        self.collect_named(name, &mut found);
        match found.as_slice() {
            [] => Err(unknown()),
            [(_, entry)] => Ok(*entry),
            _ => Err(BridgeError::AmbiguousReference {
                scope: self.label(),
                name: name.to_string(),
                candidates: found
                    .iter()
                    .map(|(manager, entry)| relative_name(&manager.path[self.path.len()..], &entry.name))
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    fn collect_named<'s>(&'s self, name: &str, found: &mut Vec<(&'s ReferenceManager, &'s RefEntry)>) {
        if let Some(entry) = self.entry(name) {
            found.push((self, entry));
        }
        for manager in self.nested.values() {
            manager.collect_named(name, found);
        }
    }

    /// Subscription surface for trusted host code. Opaque on the worker.
    pub fn public_api(&self) -> PublicApi {
        match self.side {
            Side::Host => PublicApi::Host(self.surfaces.clone()),
            Side::Worker => PublicApi::Opaque,
        }
    }

    pub(crate) fn surface(&self, name: &str) -> Option<&RefSurface> {
        self.surfaces.get(name)
    }

    /// Every reference id of this scope and below, in allocation order.
    pub fn ids(&self) -> Vec<RefId> {
        self.manifest().entries().iter().map(|entry| entry.id).collect()
    }

    pub fn manifest(&self) -> ShapeManifest {
        let mut manifest = ShapeManifest::new();
        self.collect_manifest(&mut manifest);
        manifest
    }

    fn collect_manifest(&self, manifest: &mut ShapeManifest) {
        for entry in &self.entries {
            manifest.push(ManifestEntry {
                id: entry.id,
                kind: entry.kind,
                name: self.qualify(&entry.name),
            });
        }
        for manager in self.nested.values() {
            manager.collect_manifest(manifest);
        }
    }

    /// Check that `other` was built from the same declaration.
    pub fn verify_against(&self, other: &ReferenceManager) -> Result<()> {
        self.manifest().verify(&other.manifest())
    }
}

fn relative_name(path: &[String], name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{}/{name}", path.join("/"))
    }
}

fn qualified_name(component: &str, path: &[String], name: &str) -> String {
    if path.is_empty() {
        format!("{component}::{name}")
    } else {
        format!("{component}::{}/{name}", path.join("/"))
    }
}
