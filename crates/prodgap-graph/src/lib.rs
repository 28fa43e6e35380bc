//! Equipment flow graph and path tracing.
//!
//! [`EquipmentGraph`] holds equipment nodes and directed, typed connections.
//! [`tracer::trace`] walks it from a source node, downstream along outgoing
//! edges or upstream along incoming ones, producing a nested [`PathTree`].
//!
//! The graph itself is not synchronised; callers share it behind a
//! read/write lock so that concurrent traces read a consistent snapshot.

pub mod store;
pub mod tracer;

#[cfg(test)]
mod tests;

pub use store::EquipmentGraph;
pub use tracer::{trace, Direction, PathNode, PathTree, TraceRequest};
