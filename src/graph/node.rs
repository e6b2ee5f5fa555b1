//! Node representation for the embedded store

use super::property::{PropertyMap, PropertyValue};
use super::types::{Label, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A labelled node with a sparse property map
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,

    pub labels: HashSet<Label>,

    pub properties: PropertyMap,

    /// Creation timestamp (Unix milliseconds)
    pub created_at: i64,

    /// Last merge timestamp (Unix milliseconds)
    pub updated_at: i64,
}

impl Node {
    pub fn new(id: NodeId, label: impl Into<Label>, properties: PropertyMap) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let mut labels = HashSet::new();
        labels.insert(label.into());

        Node {
            id,
            labels,
            properties,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_label(&self, label: &Label) -> bool {
        self.labels.contains(label)
    }

    pub fn get_property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// `SET n += props`: supplied keys overwrite, others are left alone.
    /// Returns the number of keys whose value actually changed.
    pub fn merge_properties(&mut self, properties: PropertyMap) -> usize {
        let mut changed = 0;
        for (key, value) in properties {
            if self.properties.get(&key) != Some(&value) {
                self.properties.insert(key, value);
                changed += 1;
            }
        }
        if changed > 0 {
            self.touch();
        }
        changed
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    fn touch(&mut self) {
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Node {}
