//! Graph module - Core types and dynamic attribute access
//!
//! The behavior graph data model:
//! - Nodes with schemaless content/metadata bags
//! - Directed weighted edges with a closed kind vocabulary
//! - Scope semantics (local / global, derived `both` for cross-scope edges)

mod behavior;
mod node;
pub mod value;

pub use behavior::BehaviorView;
pub use node::{
    derive_edge_scope, AttrMap, BehaviorKind, Direction, Edge, EdgeKind, EdgeScope, NewEdge,
    NewNode, Node, Scope,
};
