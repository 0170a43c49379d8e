//! Wire protocol - envelopes, patches, event projections, batching.
//!
//! Everything in this module is a plain value type. Envelopes are serialized
//! to JSON before they reach a transport, so nothing is ever shared across
//! the boundary, only copied.
//!
//! ```text
//! host ──Handshake(Syn|Ack)──► worker      (either side first)
//! host ──Event──────────────► worker      native event, projected
//! host ◄─ViewStateUpdate──── worker      coordinate-scoped patch
//! host ◄─CapabilityRequest── worker      id from a closed table
//! host ──CapabilityResult───► worker      value or error
//! ```

mod batch;
mod envelope;
mod event;
mod patch;

pub use batch::*;
pub use envelope::*;
pub use event::*;
pub use patch::*;
