//! Named databases for the embedded store
//!
//! Each database is an independent `GraphStore`. A default database always
//! exists and cannot be dropped; every other one is created on demand.

use crate::graph::GraphStore;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

/// Name of the database that always exists
pub const DEFAULT_DATABASE: &str = "neo4j";

pub type SharedGraph = Arc<RwLock<GraphStore>>;

/// Catalog errors
#[derive(Error, Debug, PartialEq)]
pub enum CatalogError {
    #[error("Database not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

pub struct DatabaseCatalog {
    databases: RwLock<HashMap<String, SharedGraph>>,
}

impl DatabaseCatalog {
    /// Create a catalog holding only the default database
    pub fn new() -> Self {
        let mut databases = HashMap::new();
        databases.insert(
            DEFAULT_DATABASE.to_string(),
            Arc::new(RwLock::new(GraphStore::new())),
        );

        info!("Database catalog initialized with default database");

        Self {
            databases: RwLock::new(databases),
        }
    }

    /// `CREATE DATABASE name IF NOT EXISTS`. Returns `true` if it was created.
    pub async fn create_if_not_exists(&self, name: &str) -> bool {
        let mut databases = self.databases.write().await;
        if databases.contains_key(name) {
            return false;
        }
        databases.insert(name.to_string(), Arc::new(RwLock::new(GraphStore::new())));

        info!("Created database: {}", name);

        true
    }

    pub async fn get(&self, name: &str) -> CatalogResult<SharedGraph> {
        self.databases
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    pub async fn exists(&self, name: &str) -> bool {
        self.databases.read().await.contains_key(name)
    }

    /// All database names, sorted
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    pub async fn drop_database(&self, name: &str) -> CatalogResult<()> {
        if name == DEFAULT_DATABASE {
            return Err(CatalogError::PermissionDenied(
                "Cannot drop the default database".to_string(),
            ));
        }

        if self.databases.write().await.remove(name).is_none() {
            return Err(CatalogError::NotFound(name.to_string()));
        }

        info!("Dropped database: {}", name);

        Ok(())
    }
}

impl Default for DatabaseCatalog {
    fn default() -> Self {
        Self::new()
    }
}
