//! Registry of property indices keyed by (label, property)

use super::property_index::PropertyIndex;
use crate::graph::{Label, NodeId};
use rustc_hash::FxHashMap;

/// Key for identifying a property index
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PropertyIndexKey {
    pub label: Label,
    pub property: String,
}

impl PropertyIndexKey {
    pub fn new(label: &Label, property: &str) -> Self {
        Self {
            label: label.clone(),
            property: property.to_string(),
        }
    }
}

/// Owns every property index of one graph. Lives inside the store, which is
/// itself behind a lock, so no interior locking here.
#[derive(Debug, Default)]
pub struct IndexManager {
    indices: FxHashMap<PropertyIndexKey, PropertyIndex>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create-if-absent. Returns `true` when a new (empty) index was created
    /// and the caller has to backfill it.
    pub fn create_index(&mut self, label: &Label, property: &str) -> bool {
        let key = PropertyIndexKey::new(label, property);
        if self.indices.contains_key(&key) {
            return false;
        }
        self.indices.insert(key, PropertyIndex::new());
        true
    }

    pub fn has_index(&self, label: &Label, property: &str) -> bool {
        self.indices
            .contains_key(&PropertyIndexKey::new(label, property))
    }

    pub fn get_index(&self, label: &Label, property: &str) -> Option<&PropertyIndex> {
        self.indices.get(&PropertyIndexKey::new(label, property))
    }

    /// Point `value` at `node_id` in the index for (label, property), if one exists
    pub fn index_insert(&mut self, label: &Label, property: &str, value: String, node_id: NodeId) {
        if let Some(index) = self.indices.get_mut(&PropertyIndexKey::new(label, property)) {
            index.insert(value, node_id);
        }
    }

    pub fn index_remove(&mut self, label: &Label, property: &str, value: &str, node_id: NodeId) {
        if let Some(index) = self.indices.get_mut(&PropertyIndexKey::new(label, property)) {
            index.remove(value, node_id);
        }
    }

    /// Every indexed property name for a label
    pub fn indexed_properties<'a>(&'a self, label: &'a Label) -> impl Iterator<Item = &'a str> + 'a {
        self.indices
            .keys()
            .filter(move |key| &key.label == label)
            .map(|key| key.property.as_str())
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn clear_entries(&mut self) {
        for index in self.indices.values_mut() {
            *index = PropertyIndex::new();
        }
    }
}
