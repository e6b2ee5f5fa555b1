//! Two-pass ingest pipeline
//!
//! 1. prepare: ensure the database, verify connectivity, optionally clear,
//!    ensure the match-key indices
//! 2. node pass: stream node descriptors into per-kind batches, written one
//!    after another
//! 3. barrier: every node write has returned
//! 4. relationship pass: stream edge descriptors into per-kind batches,
//!    written through the concurrent loader
//!
//! Relationship merges match endpoints that must already exist, which is
//! why the node pass has to finish first.

use crate::archive::ArchiveDecoder;
use crate::batch::partitioned;
use crate::config::{BatchingConfig, IngestConfig};
use crate::error::{IngestError, IngestResult};
use crate::gateway::{verify_connectivity, ConnectivityPolicy, GatewayError, GraphGateway};
use crate::graph::PropertyMap;
use crate::loader::{ConcurrentLoader, LoadReport, LoaderConfig};
use crate::schema::{EdgePair, NodeKind};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Knobs for one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineOptions {
    pub batching: BatchingConfig,
    pub loader: LoaderConfig,
    pub connectivity: ConnectivityPolicy,
    pub create_database: bool,
    pub clear: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&IngestConfig::default())
    }
}

impl From<&IngestConfig> for PipelineOptions {
    fn from(config: &IngestConfig) -> Self {
        Self {
            batching: config.batching,
            loader: config.loader.loader_config(),
            connectivity: config.connectivity.policy(),
            create_database: config.connection.create_database,
            clear: config.clear,
        }
    }
}

/// Node pass totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeReport {
    pub batches: usize,
    /// Document node upserts, stand-ins included
    pub documents: usize,
    pub authors: usize,
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub database: String,
    pub entries_read: usize,
    pub entries_skipped: usize,
    pub nodes: NodeReport,
    pub relationships: LoadReport,
    pub elapsed: Duration,
}

impl fmt::Display for IngestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "database:          {}", self.database)?;
        writeln!(f, "entries read:      {}", self.entries_read)?;
        writeln!(f, "entries skipped:   {}", self.entries_skipped)?;
        writeln!(
            f,
            "node upserts:      {} documents, {} authors in {} batches",
            self.nodes.documents, self.nodes.authors, self.nodes.batches
        )?;
        writeln!(
            f,
            "relationships:     {}/{} pairs matched in {} batches ({} retries)",
            self.relationships.relationships,
            self.relationships.pairs,
            self.relationships.batches,
            self.relationships.retries
        )?;
        write!(f, "elapsed:           {:.2?}", self.elapsed)
    }
}

pub struct Pipeline {
    gateway: Arc<dyn GraphGateway>,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(gateway: Arc<dyn GraphGateway>, options: PipelineOptions) -> Self {
        Self { gateway, options }
    }

    pub fn gateway(&self) -> &Arc<dyn GraphGateway> {
        &self.gateway
    }

    /// Run both passes over `decoder`
    pub async fn run(&self, decoder: &ArchiveDecoder) -> IngestResult<IngestReport> {
        let started = Instant::now();
        self.prepare().await?;

        let (nodes, entries_read, entries_skipped) = self.load_nodes(decoder).await?;
        info!(
            "Node pass complete: {} document and {} author upserts; starting relationship pass",
            nodes.documents, nodes.authors
        );

        let relationships = self.load_relationships(decoder).await?;

        let report = IngestReport {
            database: self.gateway.database().to_string(),
            entries_read,
            entries_skipped,
            nodes,
            relationships,
            elapsed: started.elapsed(),
        };
        info!(
            "Ingest into '{}' finished in {:.2?} ({} entries skipped)",
            report.database, report.elapsed, report.entries_skipped
        );
        Ok(report)
    }

    async fn prepare(&self) -> IngestResult<()> {
        if self.options.create_database {
            match self.gateway.ensure_database().await {
                Ok(()) => {}
                Err(e @ GatewayError::InvalidIdentifier(_)) => return Err(e.into()),
                // Editions without multi-database support refuse CREATE DATABASE;
                // the connectivity check decides whether the target is usable
                Err(e) => warn!("Could not create database '{}': {}", self.gateway.database(), e),
            }
        }

        verify_connectivity(self.gateway.as_ref(), &self.options.connectivity).await?;

        if self.options.clear {
            self.gateway.clear().await?;
        }

        for kind in NodeKind::ALL {
            self.gateway.ensure_index(kind.label(), kind.match_key()).await?;
        }
        Ok(())
    }

    /// Pass 1. Returns the node totals and the entry counters of this pass.
    async fn load_nodes(&self, decoder: &ArchiveDecoder) -> IngestResult<(NodeReport, usize, usize)> {
        let stream = decoder.nodes();
        let counters = stream.counters();
        let mut report = NodeReport::default();

        let chunks = partitioned(stream, self.options.batching.node_chunk_size, |node| node.kind);
        for (kind, batch) in chunks {
            let rows: Vec<PropertyMap> = batch.into_iter().map(|node| node.properties).collect();
            let written = self
                .gateway
                .upsert_nodes(kind.label(), kind.match_key(), &rows)
                .await
                .map_err(IngestError::Gateway)?;

            report.batches += 1;
            match kind {
                NodeKind::Document => report.documents += written,
                NodeKind::Author => report.authors += written,
            }
            info!("Node batch {} ({} {} nodes) written", report.batches, written, kind);
        }

        Ok((report, counters.entries_read(), counters.entries_skipped()))
    }

    /// Pass 2
    async fn load_relationships(&self, decoder: &ArchiveDecoder) -> IngestResult<LoadReport> {
        let chunks = partitioned(
            decoder.edges(),
            self.options.batching.edge_chunk_size,
            |edge| edge.kind,
        )
        .map(|(kind, batch)| {
            let pairs: Vec<EdgePair> = batch.into_iter().map(|edge| edge.pair).collect();
            (kind.spec(), pairs)
        });

        ConcurrentLoader::new(Arc::clone(&self.gateway), self.options.loader)
            .load(chunks)
            .await
    }
}
