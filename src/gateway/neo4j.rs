//! Neo4jGateway — Bolt connection pool to a Neo4j server
//!
//! All writes are `UNWIND $batch` statements, one round trip per batch.
//! Labels, keys and types cannot be query parameters, so they are validated
//! and backtick-quoted before being interpolated.

use async_trait::async_trait;
use neo4rs::{query, BoltNull, BoltType, ConfigBuilder, Graph};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use super::{
    validate_database_name, validate_edge_spec, validate_identifier, GatewayError, GatewayResult,
    GraphGateway,
};
use crate::config::ConnectionConfig;
use crate::graph::{PropertyMap, PropertyValue};
use crate::schema::{EdgePair, EdgeSpec};

/// Database that administrative commands run against
const SYSTEM_DATABASE: &str = "system";

pub struct Neo4jGateway {
    graph: Graph,
    connection: ConnectionConfig,
    database: String,
    closed: AtomicBool,
}

impl Neo4jGateway {
    /// Build a pool of `pool_size` connections to `database`. Size the pool
    /// at least as large as the loader window.
    pub async fn connect(
        connection: &ConnectionConfig,
        database: &str,
        pool_size: usize,
    ) -> GatewayResult<Self> {
        validate_database_name(database)?;
        let graph = open(connection, database, pool_size).await?;
        info!(
            "Connected to {} (database '{}', pool size {})",
            connection.uri, database, pool_size
        );
        Ok(Self {
            graph,
            connection: connection.clone(),
            database: database.to_string(),
            closed: AtomicBool::new(false),
        })
    }

    fn check_open(&self) -> GatewayResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(GatewayError::Unavailable("gateway is closed".to_string()))
        } else {
            Ok(())
        }
    }
}

async fn open(connection: &ConnectionConfig, database: &str, pool_size: usize) -> GatewayResult<Graph> {
    let config = ConfigBuilder::default()
        .uri(connection.uri.as_str())
        .user(connection.username.as_str())
        .password(connection.password.as_str())
        .db(database)
        .max_connections(pool_size.max(1))
        .build()?;
    Ok(Graph::connect(config).await?)
}

fn quote(identifier: &str) -> String {
    format!("`{}`", identifier)
}

/// Convert a property value into a Bolt value
pub fn to_bolt(value: &PropertyValue) -> BoltType {
    match value {
        PropertyValue::String(s) => s.clone().into(),
        PropertyValue::Integer(i) => (*i).into(),
        PropertyValue::Float(f) => (*f).into(),
        PropertyValue::Boolean(b) => (*b).into(),
        PropertyValue::Array(items) => items.iter().map(to_bolt).collect::<Vec<BoltType>>().into(),
        PropertyValue::Null => BoltType::Null(BoltNull),
    }
}

fn node_rows(batch: &[PropertyMap]) -> Vec<HashMap<String, BoltType>> {
    batch
        .iter()
        .map(|properties| {
            properties
                .iter()
                .map(|(key, value)| (key.clone(), to_bolt(value)))
                .collect()
        })
        .collect()
}

fn edge_rows(batch: &[EdgePair]) -> Vec<HashMap<String, String>> {
    batch
        .iter()
        .map(|pair| {
            let mut row = HashMap::with_capacity(2);
            row.insert("start".to_string(), pair.start.clone());
            row.insert("end".to_string(), pair.end.clone());
            row
        })
        .collect()
}

/// `MERGE (n:label {key: props.key}) SET n += props` for a whole batch
pub fn node_upsert_statement(label: &str, match_key: &str) -> GatewayResult<String> {
    let label = quote(validate_identifier(label)?);
    let key = quote(validate_identifier(match_key)?);
    Ok(format!(
        "UNWIND $nodes AS props \
         MERGE (n:{label} {{{key}: props.{key}}}) \
         SET n += props"
    ))
}

/// Match both endpoints, merge the relationship(s), count matched pairs
pub fn edge_upsert_statement(spec: &EdgeSpec) -> GatewayResult<String> {
    validate_edge_spec(spec)?;
    let edge_type = quote(spec.edge_type);
    let mut statement = format!(
        "UNWIND $relationships AS rel \
         MATCH (start:{} {{{}: rel.start}}), (end:{} {{{}: rel.end}}) \
         MERGE (start)-[:{edge_type}]->(end)",
        quote(spec.source.label),
        quote(spec.source.key),
        quote(spec.target.label),
        quote(spec.target.key),
    );
    if spec.bidirectional {
        statement.push_str(&format!(" MERGE (end)-[:{edge_type}]->(start)"));
    }
    statement.push_str(" RETURN count(rel) AS matched");
    Ok(statement)
}

pub fn index_statement(label: &str, property: &str) -> GatewayResult<String> {
    validate_identifier(label)?;
    validate_identifier(property)?;
    Ok(format!(
        "CREATE INDEX {} IF NOT EXISTS FOR (n:{}) ON (n.{})",
        quote(&format!("{}_{}_index", label, property)),
        quote(label),
        quote(property)
    ))
}

#[async_trait]
impl GraphGateway for Neo4jGateway {
    fn database(&self) -> &str {
        &self.database
    }

    async fn ensure_database(&self) -> GatewayResult<()> {
        self.check_open()?;
        let name = validate_database_name(&self.database)?;
        let system = open(&self.connection, SYSTEM_DATABASE, 1).await?;
        system
            .run(query(&format!("CREATE DATABASE {} IF NOT EXISTS WAIT", quote(name))))
            .await?;
        info!("Ensured database '{}'", name);
        Ok(())
    }

    async fn ping(&self) -> GatewayResult<()> {
        self.check_open()?;
        let mut stream = self.graph.execute(query("RETURN 1 AS ok")).await?;
        while stream.next().await?.is_some() {}
        Ok(())
    }

    async fn ensure_index(&self, label: &str, property: &str) -> GatewayResult<()> {
        self.check_open()?;
        let statement = index_statement(label, property)?;
        self.graph.run(query(&statement)).await?;
        info!("Ensured index on :{}({})", label, property);
        Ok(())
    }

    async fn upsert_nodes(
        &self,
        label: &str,
        match_key: &str,
        batch: &[PropertyMap],
    ) -> GatewayResult<usize> {
        self.check_open()?;
        let statement = node_upsert_statement(label, match_key)?;
        if batch.is_empty() {
            return Ok(0);
        }
        self.graph
            .run(query(&statement).param("nodes", node_rows(batch)))
            .await?;
        debug!("Merged {} :{} nodes", batch.len(), label);
        Ok(batch.len())
    }

    async fn upsert_edge_batch(&self, spec: &EdgeSpec, batch: &[EdgePair]) -> GatewayResult<usize> {
        self.check_open()?;
        let statement = edge_upsert_statement(spec)?;
        if batch.is_empty() {
            return Ok(0);
        }
        let mut stream = self
            .graph
            .execute(query(&statement).param("relationships", edge_rows(batch)))
            .await?;
        let mut matched = 0;
        while let Some(row) = stream.next().await? {
            matched = row.get::<i64>("matched").unwrap_or(0).max(0) as usize;
        }
        debug!("Merged {}/{} [:{}] pairs", matched, batch.len(), spec.edge_type);
        Ok(matched)
    }

    async fn clear(&self) -> GatewayResult<()> {
        self.check_open()?;
        self.graph.run(query("MATCH (n) DETACH DELETE n")).await?;
        info!("Cleared database '{}'", self.database);
        Ok(())
    }

    async fn close(&self) -> GatewayResult<()> {
        // Pooled connections are dropped with the gateway
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EdgeKind, NodeKind};

    #[test]
    fn test_node_statement() {
        let statement = node_upsert_statement(NodeKind::Author.label(), NodeKind::Author.match_key()).unwrap();
        assert_eq!(
            statement,
            "UNWIND $nodes AS props MERGE (n:`author` {`id_hash`: props.`id_hash`}) SET n += props"
        );
    }

    #[test]
    fn test_edge_statements() {
        let reference = edge_upsert_statement(&EdgeKind::Reference.spec()).unwrap();
        assert!(reference.contains("MATCH (start:`doi` {`name`: rel.start}), (end:`doi` {`name`: rel.end})"));
        assert!(reference.contains("MERGE (start)-[:`reference`]->(end)"));
        assert!(!reference.contains("MERGE (end)"));

        let authorship = edge_upsert_statement(&EdgeKind::Authorship.spec()).unwrap();
        assert!(authorship.contains("(start:`author` {`id_hash`: rel.start})"));
        assert!(authorship.contains("MERGE (end)-[:`author`]->(start)"));
        assert!(authorship.ends_with("RETURN count(rel) AS matched"));
    }

    #[test]
    fn test_index_statement() {
        assert_eq!(
            index_statement("doi", "name").unwrap(),
            "CREATE INDEX `doi_name_index` IF NOT EXISTS FOR (n:`doi`) ON (n.`name`)"
        );
        assert!(index_statement("doi", "na`me").is_err());
    }

    #[test]
    fn test_bolt_conversion() {
        assert_eq!(to_bolt(&PropertyValue::Null), BoltType::Null(BoltNull));
        assert_eq!(to_bolt(&PropertyValue::from("x")), BoltType::from("x"));
        assert_eq!(to_bolt(&PropertyValue::Integer(3)), BoltType::from(3i64));
        let list = to_bolt(&PropertyValue::Array(vec!["a".into(), "b".into()]));
        assert!(matches!(list, BoltType::List(ref l) if l.value.len() == 2));
    }
}
