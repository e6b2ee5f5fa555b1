//! Embedded property graph
//!
//! This module implements the graph model the loader writes into when no
//! external store is configured:
//! - Nodes with a label and a sparse property map
//! - Directed, typed edges without properties
//! - Merge (upsert) semantics keyed by a match property per label
//! - Hash-based label, edge-type and unique property indices

pub mod edge;
pub mod node;
pub mod property;
pub mod store;
pub mod types;

// Re-export main types
pub use edge::Edge;
pub use node::Node;
pub use property::{PropertyMap, PropertyValue};
pub use store::{GraphError, GraphResult, GraphStore, Merge};
pub use types::{EdgeId, EdgeType, Label, NodeId};
