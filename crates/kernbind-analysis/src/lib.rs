//! Read-only analyses over kernbind IR modules.
//!
//! - [`classify`] maps a kernel parameter type to its [`ArgKind`].
//! - [`CallGraph`] and [`level_order`] give a deterministic caller-first
//!   traversal of every function reachable from a kernel.
//! - [`DiscriminantMap`] numbers kernel arguments by `(type, position)`.

pub mod arg_kind;
pub mod call_graph;
pub mod discriminant;

pub use arg_kind::{ArgKind, ClassifyError, classify};
pub use call_graph::{CallGraph, level_order};
pub use discriminant::{Discriminant, DiscriminantMap, buffer_discriminants};
