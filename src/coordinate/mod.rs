//! Coordinate addressing - tree position to stable path, and back.
//!
//! A [`Coordinate`] is the ordered list of item keys (and child-component
//! reference names) that leads from the root component to one concrete
//! instance. A reference plus a coordinate names one live UI affordance
//! anywhere in the tree.
//!
//! # Path construction
//!
//! Paths are accumulated structurally through a thread-local scope stack
//! ([`with_scope`], [`with_key`]). A binder simply records whatever coordinate
//! is active when it runs:
//!
//! ```text
//! root component            []
//! └─ each(items) key "b"    [b]
//!    └─ child "node"        [b, node]
//!       └─ each key "x"     [b, node, x]      <- same component, deeper path
//! ```
//!
//! Recursive components need no special case: a component that renders
//! itself just keeps extending the same path.
//!
//! # Resolution
//!
//! [`InstanceTable`] maps coordinates of live scopes to the generation they
//! were mounted with. Resolution fails for removed scopes and for reused keys
//! whose generation no longer matches.

mod context;
mod instances;
mod path;

pub use context::*;
pub use instances::*;
pub use path::*;
