//! Core types for spark-sandbox.
//!
//! These identifiers are shared by both sides of the boundary. Everything that
//! crosses the wire is built from them, so they are small, `Copy` where
//! possible, and serialize to plain numbers.

use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Side
// =============================================================================

/// Which side of the trust boundary a piece of state lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Trusted context. Owns the display tree and the function repository.
    Host,
    /// Isolated context. Runs component logic, owns nothing displayable.
    Worker,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Host => f.write_str("host"),
            Side::Worker => f.write_str("worker"),
        }
    }
}

// =============================================================================
// Shapes and References
// =============================================================================

/// Index of a component template inside a [`TemplateRegistry`].
///
/// Both sides build their registry from the same compiled source, so a shape
/// id names the same component on both sides.
///
/// [`TemplateRegistry`]: crate::template::TemplateRegistry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShapeId(pub u32);

impl ShapeId {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ShapeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Opaque identifier of one addressable position in a component shape.
///
/// `slot` is allocated by walking the declaration in a fixed order, so two
/// managers built from the same declaration hand out identical ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RefId {
    pub shape: ShapeId,
    pub slot: u32,
}

impl RefId {
    pub const fn new(shape: ShapeId, slot: u32) -> Self {
        Self { shape, slot }
    }
}

impl fmt::Display for RefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}.{}", self.shape.0, self.slot)
    }
}

/// The four reference kinds a compiled template can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    /// Exactly one instance per component instance (a named element).
    Static,
    /// One instance per item of the enclosing keyed group.
    Collection,
    /// A non-repeated child component boundary.
    Component,
    /// A child component boundary repeated once per item.
    CollectionComponent,
}

impl RefKind {
    /// True for kinds that exist once per item of a keyed group.
    #[inline]
    pub const fn is_collection(self) -> bool {
        matches!(self, RefKind::Collection | RefKind::CollectionComponent)
    }

    /// True for kinds that mark a child component boundary.
    #[inline]
    pub const fn is_component(self) -> bool {
        matches!(self, RefKind::Component | RefKind::CollectionComponent)
    }
}

impl fmt::Display for RefKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RefKind::Static => "static",
            RefKind::Collection => "collection",
            RefKind::Component => "component",
            RefKind::CollectionComponent => "collection-component",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Generations
// =============================================================================

/// Monotonically increasing mount counter.
///
/// Every mounted scope receives a fresh generation. Two mounts at the same
/// coordinate never share one, which is what lets a reused key be told apart
/// from the instance it replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Generation(pub u64);

impl Generation {
    /// Generation of scopes that have no keyed item above them.
    pub const ROOT: Self = Self(0);

    #[inline]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

// =============================================================================
// Capabilities
// =============================================================================

/// Compile-time id of an entry in the host's function repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CapabilityId(pub u32);

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn#{}", self.0)
    }
}

/// Correlates a capability request with its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(pub u64);

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call#{}", self.0)
    }
}
