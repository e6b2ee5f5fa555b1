//! In-memory graph storage with merge (upsert) semantics
//!
//! Layout:
//! - nodes: NodeId -> Node
//! - edges: EdgeId -> Edge
//! - outgoing / incoming: NodeId -> Vec<EdgeId> (adjacency lists)
//! - label_index: Label -> set of NodeId
//! - edge_type_index: EdgeType -> set of EdgeId
//! - property_index: unique (label, property) indices used to resolve match keys
//!
//! Nodes are addressed from the outside by `(label, match_key, value)`,
//! never by `NodeId`. Matching works without a declared index (label scan)
//! and becomes a hash lookup once `create_index` has been called.

use super::edge::Edge;
use super::node::Node;
use super::property::{PropertyMap, PropertyValue};
use super::types::{EdgeId, EdgeType, Label, NodeId};
use crate::index::IndexManager;
use rustc_hash::{FxHashMap, FxHashSet};
use thiserror::Error;

/// Errors that can occur during graph operations
#[derive(Error, Debug, PartialEq)]
pub enum GraphError {
    #[error("Node {0} not found")]
    NodeNotFound(NodeId),

    #[error("Merge on :{label} requires property '{key}'")]
    MissingMatchKey { label: String, key: String },

    #[error("Property '{key}' on :{label} cannot be a match key (got {type_name})")]
    InvalidMatchKey {
        label: String,
        key: String,
        type_name: &'static str,
    },

    #[error("Invalid edge: source node {0} does not exist")]
    InvalidEdgeSource(NodeId),

    #[error("Invalid edge: target node {0} does not exist")]
    InvalidEdgeTarget(NodeId),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// Result of a merge: whether the entity had to be created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Merge<T> {
    Created(T),
    Matched(T),
}

impl<T: Copy> Merge<T> {
    pub fn id(&self) -> T {
        match self {
            Merge::Created(id) | Merge::Matched(id) => *id,
        }
    }

    pub fn created(&self) -> bool {
        matches!(self, Merge::Created(_))
    }
}

#[derive(Debug, Default)]
pub struct GraphStore {
    nodes: FxHashMap<NodeId, Node>,

    edges: FxHashMap<EdgeId, Edge>,

    outgoing: FxHashMap<NodeId, Vec<EdgeId>>,

    incoming: FxHashMap<NodeId, Vec<EdgeId>>,

    label_index: FxHashMap<Label, FxHashSet<NodeId>>,

    edge_type_index: FxHashMap<EdgeType, FxHashSet<EdgeId>>,

    property_index: IndexManager,

    next_node_id: u64,

    next_edge_id: u64,
}

impl GraphStore {
    pub fn new() -> Self {
        GraphStore {
            next_node_id: 1,
            next_edge_id: 1,
            ..Default::default()
        }
    }

    /// Declare a unique index on (label, property). Create-if-absent: calling
    /// it again is a no-op. A new index is backfilled from existing nodes.
    /// Returns `true` if the index was created by this call.
    pub fn create_index(&mut self, label: impl Into<Label>, property: &str) -> bool {
        let label = label.into();
        if !self.property_index.create_index(&label, property) {
            return false;
        }

        if let Some(ids) = self.label_index.get(&label) {
            for id in ids {
                let key = self
                    .nodes
                    .get(id)
                    .and_then(|node| node.get_property(property))
                    .and_then(PropertyValue::index_key);
                if let Some(key) = key {
                    self.property_index.index_insert(&label, property, key, *id);
                }
            }
        }
        true
    }

    pub fn has_index(&self, label: &Label, property: &str) -> bool {
        self.property_index.has_index(label, property)
    }

    /// Resolve a node by `(label, key = value)`
    pub fn find_node(&self, label: &Label, key: &str, value: &str) -> Option<NodeId> {
        if let Some(index) = self.property_index.get_index(label, key) {
            return index.get(value);
        }

        self.label_index.get(label)?.iter().copied().find(|id| {
            self.nodes
                .get(id)
                .and_then(|node| node.get_property(key))
                .and_then(PropertyValue::index_key)
                .as_deref()
                == Some(value)
        })
    }

    /// `MERGE (n:label {key: props.key}) SET n += props`
    pub fn merge_node(
        &mut self,
        label: impl Into<Label>,
        key: &str,
        properties: PropertyMap,
    ) -> GraphResult<Merge<NodeId>> {
        let label = label.into();
        let match_value = match properties.get(key) {
            None | Some(PropertyValue::Null) => {
                return Err(GraphError::MissingMatchKey {
                    label: label.to_string(),
                    key: key.to_string(),
                })
            }
            Some(value) => value.index_key().ok_or_else(|| GraphError::InvalidMatchKey {
                label: label.to_string(),
                key: key.to_string(),
                type_name: value.type_name(),
            })?,
        };

        if let Some(id) = self.find_node(&label, key, &match_value) {
            self.update_node(id, properties)?;
            return Ok(Merge::Matched(id));
        }

        let id = NodeId::new(self.next_node_id);
        self.next_node_id += 1;

        let indexed: Vec<(String, String)> = self
            .property_index
            .indexed_properties(&label)
            .filter_map(|prop| {
                properties
                    .get(prop)
                    .and_then(PropertyValue::index_key)
                    .map(|value| (prop.to_string(), value))
            })
            .collect();
        for (prop, value) in indexed {
            self.property_index.index_insert(&label, &prop, value, id);
        }

        self.label_index.entry(label.clone()).or_default().insert(id);
        self.nodes.insert(id, Node::new(id, label, properties));
        Ok(Merge::Created(id))
    }

    fn update_node(&mut self, id: NodeId, properties: PropertyMap) -> GraphResult<()> {
        let node = self.nodes.get_mut(&id).ok_or(GraphError::NodeNotFound(id))?;

        // Keep secondary indices in step with changed values
        let mut reindex = Vec::new();
        for label in &node.labels {
            for prop in self.property_index.indexed_properties(label) {
                let Some(new_value) = properties.get(prop) else {
                    continue;
                };
                let old_key = node.get_property(prop).and_then(PropertyValue::index_key);
                let new_key = new_value.index_key();
                if old_key != new_key {
                    reindex.push((label.clone(), prop.to_string(), old_key, new_key));
                }
            }
        }

        node.merge_properties(properties);

        for (label, prop, old_key, new_key) in reindex {
            if let Some(old) = old_key {
                self.property_index.index_remove(&label, &prop, &old, id);
            }
            if let Some(new) = new_key {
                self.property_index.index_insert(&label, &prop, new, id);
            }
        }
        Ok(())
    }

    /// `MERGE (source)-[:edge_type]->(target)` between existing nodes
    pub fn merge_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: impl Into<EdgeType>,
    ) -> GraphResult<Merge<EdgeId>> {
        if !self.nodes.contains_key(&source) {
            return Err(GraphError::InvalidEdgeSource(source));
        }
        if !self.nodes.contains_key(&target) {
            return Err(GraphError::InvalidEdgeTarget(target));
        }

        let edge_type = edge_type.into();
        if let Some(existing) = self.find_edge(source, target, &edge_type) {
            return Ok(Merge::Matched(existing));
        }

        let id = EdgeId::new(self.next_edge_id);
        self.next_edge_id += 1;

        self.outgoing.entry(source).or_default().push(id);
        self.incoming.entry(target).or_default().push(id);
        self.edge_type_index
            .entry(edge_type.clone())
            .or_default()
            .insert(id);
        self.edges.insert(id, Edge::new(id, source, target, edge_type));
        Ok(Merge::Created(id))
    }

    pub fn find_edge(&self, source: NodeId, target: NodeId, edge_type: &EdgeType) -> Option<EdgeId> {
        self.outgoing
            .get(&source)?
            .iter()
            .copied()
            .find(|id| {
                self.edges
                    .get(id)
                    .map(|edge| edge.is(source, target, edge_type))
                    .unwrap_or(false)
            })
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn get_edge(&self, id: EdgeId) -> Option<&Edge> {
        self.edges.get(&id)
    }

    pub fn get_outgoing_edges(&self, node_id: NodeId) -> Vec<&Edge> {
        self.adjacent(&self.outgoing, node_id)
    }

    pub fn get_incoming_edges(&self, node_id: NodeId) -> Vec<&Edge> {
        self.adjacent(&self.incoming, node_id)
    }

    fn adjacent(&self, lists: &FxHashMap<NodeId, Vec<EdgeId>>, node_id: NodeId) -> Vec<&Edge> {
        lists
            .get(&node_id)
            .map(|ids| ids.iter().filter_map(|id| self.edges.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn get_nodes_by_label(&self, label: &Label) -> Vec<&Node> {
        self.label_index
            .get(label)
            .map(|ids| ids.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn get_edges_by_type(&self, edge_type: &EdgeType) -> Vec<&Edge> {
        self.edge_type_index
            .get(edge_type)
            .map(|ids| ids.iter().filter_map(|id| self.edges.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// `MATCH (n) DETACH DELETE n`. Index declarations survive, their
    /// entries do not.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.outgoing.clear();
        self.incoming.clear();
        self.label_index.clear();
        self.edge_type_index.clear();
        self.property_index.clear_entries();
        self.next_node_id = 1;
        self.next_edge_id = 1;
    }
}
