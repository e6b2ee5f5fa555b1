//! Unique property index: match-key value -> node
//!
//! Merge semantics make every indexed (label, property) pair unique, so one
//! slot per value is enough.

use crate::graph::NodeId;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Default)]
pub struct PropertyIndex {
    entries: FxHashMap<String, NodeId>,
}

impl PropertyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or repoint a value. Returns the previous owner, if any.
    pub fn insert(&mut self, value: String, node_id: NodeId) -> Option<NodeId> {
        self.entries.insert(value, node_id)
    }

    /// Remove a value only if it still points at `node_id`
    pub fn remove(&mut self, value: &str, node_id: NodeId) {
        if self.entries.get(value) == Some(&node_id) {
            self.entries.remove(value);
        }
    }

    pub fn get(&self, value: &str) -> Option<NodeId> {
        self.entries.get(value).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
