//! Directed, typed edges for the embedded store

use super::types::{EdgeId, EdgeType, NodeId};
use serde::{Deserialize, Serialize};

/// A directed edge. Loader-created edges carry no properties; identity
/// under merge is `(source, target, edge_type)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,

    /// Edge goes FROM this node
    pub source: NodeId,

    /// Edge goes TO this node
    pub target: NodeId,

    pub edge_type: EdgeType,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,
}

impl Edge {
    pub fn new(id: EdgeId, source: NodeId, target: NodeId, edge_type: impl Into<EdgeType>) -> Self {
        Edge {
            id,
            source,
            target,
            edge_type: edge_type.into(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// True when this edge is the `(source)-[edge_type]->(target)` relationship
    pub fn is(&self, source: NodeId, target: NodeId, edge_type: &EdgeType) -> bool {
        self.source == source && self.target == target && &self.edge_type == edge_type
    }
}
