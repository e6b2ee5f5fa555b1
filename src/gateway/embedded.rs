//! EmbeddedGateway — writes into the in-process graph store
//!
//! No network; each database of the catalog is an independent
//! `GraphStore` behind a `tokio::sync::RwLock`.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

use super::{
    validate_database_name, validate_edge_spec, validate_identifier, GatewayError, GatewayResult,
    GraphGateway,
};
use crate::catalog::{DatabaseCatalog, SharedGraph};
use crate::graph::{EdgeType, Label, PropertyMap};
use crate::schema::{EdgePair, EdgeSpec};

pub struct EmbeddedGateway {
    catalog: Arc<DatabaseCatalog>,
    database: String,
    closed: AtomicBool,
}

impl EmbeddedGateway {
    /// Gateway over a shared catalog
    pub fn new(catalog: Arc<DatabaseCatalog>, database: impl Into<String>) -> Self {
        Self {
            catalog,
            database: database.into(),
            closed: AtomicBool::new(false),
        }
    }

    /// Gateway over a fresh, private catalog
    pub fn in_memory(database: impl Into<String>) -> Self {
        Self::new(Arc::new(DatabaseCatalog::new()), database)
    }

    pub fn catalog(&self) -> &Arc<DatabaseCatalog> {
        &self.catalog
    }

    /// The target database's store (for inspection after a load)
    pub async fn graph(&self) -> GatewayResult<SharedGraph> {
        if self.closed.load(Ordering::Acquire) {
            return Err(GatewayError::Unavailable("gateway is closed".to_string()));
        }
        self.catalog
            .get(&self.database)
            .await
            .map_err(|_| GatewayError::DatabaseNotFound(self.database.clone()))
    }
}

#[async_trait]
impl GraphGateway for EmbeddedGateway {
    fn database(&self) -> &str {
        &self.database
    }

    async fn ensure_database(&self) -> GatewayResult<()> {
        validate_database_name(&self.database)?;
        if self.closed.load(Ordering::Acquire) {
            return Err(GatewayError::Unavailable("gateway is closed".to_string()));
        }
        self.catalog.create_if_not_exists(&self.database).await;
        Ok(())
    }

    async fn ping(&self) -> GatewayResult<()> {
        self.graph().await.map(|_| ())
    }

    async fn ensure_index(&self, label: &str, property: &str) -> GatewayResult<()> {
        validate_identifier(label)?;
        validate_identifier(property)?;
        let graph = self.graph().await?;
        if graph.write().await.create_index(label, property) {
            info!("Created index on :{}({})", label, property);
        }
        Ok(())
    }

    async fn upsert_nodes(
        &self,
        label: &str,
        match_key: &str,
        batch: &[PropertyMap],
    ) -> GatewayResult<usize> {
        validate_identifier(label)?;
        validate_identifier(match_key)?;
        let graph = self.graph().await?;
        let mut store = graph.write().await;

        let mut created = 0;
        for properties in batch {
            if store.merge_node(label, match_key, properties.clone())?.created() {
                created += 1;
            }
        }
        debug!("Merged {} :{} nodes ({} new)", batch.len(), label, created);
        Ok(batch.len())
    }

    async fn upsert_edge_batch(&self, spec: &EdgeSpec, batch: &[EdgePair]) -> GatewayResult<usize> {
        validate_edge_spec(spec)?;
        let graph = self.graph().await?;
        let mut store = graph.write().await;

        let source_label = Label::new(spec.source.label);
        let target_label = Label::new(spec.target.label);
        let edge_type = EdgeType::new(spec.edge_type);

        let mut matched = 0;
        for pair in batch {
            let source = store.find_node(&source_label, spec.source.key, &pair.start);
            let target = store.find_node(&target_label, spec.target.key, &pair.end);
            let (Some(source), Some(target)) = (source, target) else {
                continue;
            };

            store.merge_edge(source, target, edge_type.clone())?;
            if spec.bidirectional {
                store.merge_edge(target, source, edge_type.clone())?;
            }
            matched += 1;
        }
        debug!("Merged {}/{} [:{}] pairs", matched, batch.len(), spec.edge_type);
        Ok(matched)
    }

    async fn clear(&self) -> GatewayResult<()> {
        let graph = self.graph().await?;
        graph.write().await.clear();
        info!("Cleared database '{}'", self.database);
        Ok(())
    }

    async fn close(&self) -> GatewayResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::PropertyValue;
    use crate::schema::EdgeKind;

    fn doc(name: &str) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("name".to_string(), name.into());
        props
    }

    async fn gateway() -> EmbeddedGateway {
        let gateway = EmbeddedGateway::in_memory("papers");
        gateway.ensure_database().await.unwrap();
        gateway
    }

    #[tokio::test]
    async fn test_missing_database_is_reported() {
        let gateway = EmbeddedGateway::in_memory("papers");
        assert!(matches!(gateway.ping().await, Err(GatewayError::DatabaseNotFound(_))));

        gateway.ensure_database().await.unwrap();
        gateway.ensure_database().await.unwrap();
        assert!(gateway.ping().await.is_ok());
    }

    #[tokio::test]
    async fn test_upsert_nodes_is_idempotent() {
        let gateway = gateway().await;
        gateway.ensure_index("doi", "name").await.unwrap();

        let batch = vec![doc("a"), doc("b")];
        assert_eq!(gateway.upsert_nodes("doi", "name", &batch).await.unwrap(), 2);
        gateway.upsert_nodes("doi", "name", &batch).await.unwrap();

        let graph = gateway.graph().await.unwrap();
        assert_eq!(graph.read().await.node_count(), 2);
    }

    #[tokio::test]
    async fn test_edge_batch_skips_missing_endpoints() {
        let gateway = gateway().await;
        gateway.upsert_nodes("doi", "name", &[doc("a"), doc("b")]).await.unwrap();

        let spec = EdgeKind::Reference.spec();
        let pairs = vec![EdgePair::new("a", "b"), EdgePair::new("a", "ghost")];
        assert_eq!(gateway.upsert_edge_batch(&spec, &pairs).await.unwrap(), 1);
        assert_eq!(gateway.upsert_edge_batch(&spec, &pairs).await.unwrap(), 1);

        let graph = gateway.graph().await.unwrap();
        assert_eq!(graph.read().await.edge_count(), 1);
    }

    #[tokio::test]
    async fn test_bidirectional_edges() {
        let gateway = gateway().await;
        gateway.upsert_nodes("doi", "name", &[doc("a")]).await.unwrap();
        let mut author = PropertyMap::new();
        author.insert("id_hash".to_string(), PropertyValue::from("h1"));
        gateway.upsert_nodes("author", "id_hash", &[author]).await.unwrap();

        let spec = EdgeKind::Authorship.spec();
        gateway.upsert_edge_batch(&spec, &[EdgePair::new("h1", "a")]).await.unwrap();

        let graph = gateway.graph().await.unwrap();
        let store = graph.read().await;
        assert_eq!(store.edge_count(), 2);
        assert_eq!(store.get_edges_by_type(&EdgeType::new("author")).len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_identifiers_rejected_before_io() {
        let gateway = gateway().await;
        let err = gateway.upsert_nodes("doi` DETACH DELETE", "name", &[doc("a")]).await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidIdentifier(_)));

        let bad = EmbeddedGateway::in_memory("bad name");
        assert!(matches!(bad.ensure_database().await, Err(GatewayError::InvalidIdentifier(_))));
    }

    #[tokio::test]
    async fn test_clear_and_close() {
        let gateway = gateway().await;
        gateway.upsert_nodes("doi", "name", &[doc("a")]).await.unwrap();
        gateway.clear().await.unwrap();
        assert_eq!(gateway.graph().await.unwrap().read().await.node_count(), 0);

        gateway.close().await.unwrap();
        assert!(matches!(gateway.ping().await, Err(GatewayError::Unavailable(_))));
    }
}
