//! Compiled template contract.
//!
//! The template compiler is not part of this crate; this module is the shape
//! of what it hands over. A [`ComponentTemplate`] pairs a component's
//! [`RefDeclaration`] with the node tree both bridge halves walk:
//!
//! ```text
//! element("ul")
//! └─ for_each("items", items: "items", key: "id")       nested scope "items"
//!    └─ element("li").reference("itemButton")            collection ref
//!       ├─ text_field("text")
//!       └─ component("badge", "Badge")                   collection-component ref
//! ```
//!
//! The host walks it to build display nodes, the worker walks it to build
//! nothing but references. Both see the same tree, so both allocate the same
//! ids and accumulate the same coordinates.
//!
//! [`RefDeclaration`]: crate::refs::RefDeclaration

mod node;
mod registry;

pub use node::*;
pub use registry::*;
