//! Property indexing
//!
//! Unique (label, property) indices that make merge-by-key lookups O(1) in
//! the embedded store.

pub mod manager;
pub mod property_index;

pub use manager::{IndexManager, PropertyIndexKey};
pub use property_index::PropertyIndex;
