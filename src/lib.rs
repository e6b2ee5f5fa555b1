//! Biblio Graph
//!
//! Bulk loader that turns an archive of bibliographic JSON records into a
//! property graph: documents and authors become nodes, citations and
//! authorships become relationships.
//!
//! # Architecture
//!
//! - `hashing`: deterministic content fingerprints (author identity,
//!   database names)
//! - `archive`: lazy zip decoding into node and edge descriptors
//! - `batch`: order-preserving, kind-partitioned chunking
//! - `gateway`: idempotent merge writes against Neo4j (Bolt) or the
//!   embedded store
//! - `loader`: bounded-concurrency relationship writes with linear retry
//! - `pipeline`: node pass, barrier, relationship pass
//! - `graph`, `index`, `catalog`: the embedded property graph
//!
//! # Graph schema
//!
//! | Entity | Label / type | Match key |
//! |---|---|---|
//! | document | `doi` | `name` |
//! | author | `author` | `id_hash` |
//! | citation | `reference` (doi → doi) | |
//! | authorship | `author` (both directions) | |
//!
//! ## Example Usage
//!
//! ```rust
//! use biblio_graph::graph::{GraphStore, Label, PropertyMap};
//!
//! let mut store = GraphStore::new();
//! store.create_index("doi", "name");
//!
//! let mut paper = PropertyMap::new();
//! paper.insert("name".to_string(), "10.1/a".into());
//! let a = store.merge_node("doi", "name", paper.clone()).unwrap();
//!
//! // Merging the same key again matches the existing node
//! let again = store.merge_node("doi", "name", paper).unwrap();
//! assert_eq!(a.id(), again.id());
//! assert_eq!(store.find_node(&Label::new("doi"), "name", "10.1/a"), Some(a.id()));
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod archive;
pub mod batch;
pub mod catalog;
pub mod config;
pub mod error;
pub mod gateway;
pub mod graph;
pub mod hashing;
pub mod index;
pub mod loader;
pub mod pipeline;
pub mod schema;

// Re-export main types for convenience
pub use graph::{
    Edge, EdgeId, EdgeType, GraphError, GraphResult, GraphStore, Label, Node, NodeId,
    PropertyMap, PropertyValue,
};

pub use archive::{ArchiveDecoder, DecodeCounters, DecodeError, DecodeResult, DocumentRecord};

pub use catalog::{CatalogError, CatalogResult, DatabaseCatalog, DEFAULT_DATABASE};

pub use config::{ConfigError, ConfigResult, ConnectionConfig, IngestConfig};

pub use error::{IngestError, IngestResult};

pub use gateway::{
    ConnectivityPolicy, EmbeddedGateway, GatewayError, GatewayResult, GraphGateway, Neo4jGateway,
};

pub use hashing::{content_fingerprint, database_name_for};

pub use loader::{ConcurrentLoader, LoadReport, LoaderConfig, RetryPolicy};

pub use pipeline::{IngestReport, Pipeline, PipelineOptions};

pub use schema::{EdgeKind, EdgePair, EdgeSpec, NodeKind};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, "0.1.0");
    }
}
