//! Graph store gateway
//!
//! One trait, two backends:
//! - `EmbeddedGateway`: the in-process store (tests, dry runs, validating
//!   an archive without a server)
//! - `Neo4jGateway`: a Bolt connection pool to a Neo4j server
//!
//! Upserts are idempotent merges, so re-running a load is safe. The gateway
//! never retries on its own; that is the loader's job.

pub mod connectivity;
pub mod embedded;
pub mod neo4j;

pub use connectivity::{verify_connectivity, ConnectivityPolicy};
pub use embedded::EmbeddedGateway;
pub use neo4j::Neo4jGateway;

use crate::graph::{GraphError, PropertyMap};
use crate::schema::{EdgePair, EdgeSpec};
use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Gateway errors
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Label, key, type or database name that cannot be safely interpolated
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Database not found: {0}")]
    DatabaseNotFound(String),

    /// Embedded store rejected the write
    #[error("Store error: {0}")]
    Store(#[from] GraphError),

    /// Bolt driver error
    #[error("Driver error: {0}")]
    Driver(#[from] neo4rs::Error),

    /// Store temporarily unreachable, or the gateway was closed
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Unified write interface to a graph store.
///
/// Shared across loader tasks behind an `Arc`, hence `Send + Sync`.
#[async_trait]
pub trait GraphGateway: Send + Sync {
    /// Name of the target database
    fn database(&self) -> &str;

    /// Create the target database if it does not exist
    async fn ensure_database(&self) -> GatewayResult<()>;

    /// Cheap round trip against the target database
    async fn ping(&self) -> GatewayResult<()>;

    /// Create-if-absent index on (label, property)
    async fn ensure_index(&self, label: &str, property: &str) -> GatewayResult<()>;

    /// Merge each node by `match_key`, then overwrite/add the supplied
    /// properties. Returns the number of nodes in the batch.
    async fn upsert_nodes(
        &self,
        label: &str,
        match_key: &str,
        batch: &[PropertyMap],
    ) -> GatewayResult<usize>;

    /// Match both endpoints of every pair and merge the relationship (and
    /// its reverse when `spec.bidirectional` is set). Pairs with a missing
    /// endpoint are no-ops. Returns the number of pairs whose endpoints
    /// both matched.
    async fn upsert_edge_batch(&self, spec: &EdgeSpec, batch: &[EdgePair]) -> GatewayResult<usize>;

    /// Detach-delete every node in the target database
    async fn clear(&self) -> GatewayResult<()>;

    /// Release connections. Further calls fail with `Unavailable`.
    async fn close(&self) -> GatewayResult<()>;
}

fn identifier_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,127}$").expect("identifier pattern"))
}

fn database_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9.\-]{2,63}$").expect("database name pattern"))
}

/// Accept a label, property key or relationship type for interpolation
pub fn validate_identifier(name: &str) -> GatewayResult<&str> {
    if identifier_pattern().is_match(name) {
        Ok(name)
    } else {
        Err(GatewayError::InvalidIdentifier(name.to_string()))
    }
}

/// Accept a database name: 3-64 chars, letters, digits, dots and dashes,
/// starting with a letter
pub fn validate_database_name(name: &str) -> GatewayResult<&str> {
    if database_pattern().is_match(name) {
        Ok(name)
    } else {
        Err(GatewayError::InvalidIdentifier(name.to_string()))
    }
}

pub(crate) fn validate_edge_spec(spec: &EdgeSpec) -> GatewayResult<()> {
    validate_identifier(spec.edge_type)?;
    validate_identifier(spec.source.label)?;
    validate_identifier(spec.source.key)?;
    validate_identifier(spec.target.label)?;
    validate_identifier(spec.target.key)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::database_name_for;

    #[test]
    fn test_identifier_validation() {
        for ok in ["doi", "author", "id_hash", "_private", "Label2"] {
            assert!(validate_identifier(ok).is_ok(), "{ok}");
        }
        for bad in ["", "2fast", "a b", "x`) DETACH DELETE n //", "n.name", "ünicode"] {
            assert!(matches!(validate_identifier(bad), Err(GatewayError::InvalidIdentifier(_))), "{bad}");
        }
    }

    #[test]
    fn test_database_name_validation() {
        assert!(validate_database_name("neo4j").is_ok());
        assert!(validate_database_name("papers-2024.v1").is_ok());
        assert!(validate_database_name(&database_name_for("dump.zip")).is_ok());
        assert!(validate_database_name("ab").is_err());
        assert!(validate_database_name("1abc").is_err());
        assert!(validate_database_name("drop database x").is_err());
    }
}
