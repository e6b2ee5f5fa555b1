//! Concurrent relationship loader
//!
//! Relationship batches are written with at most `window` writes in flight.
//! Admission waits on a counting semaphore; each spawned task holds its
//! permit until its batch has succeeded or failed for good.
//!
//! Per batch: `pending -> in_flight -> succeeded`, or on error
//! `retrying -> in_flight` until `max_retries` attempts are used up, at
//! which point the batch is `failed_fatal`, every other in-flight batch is
//! aborted and the load returns the error. Completion order is
//! unspecified; merges make the whole load safe to re-run.

use crate::error::{IngestError, IngestResult};
use crate::gateway::{GatewayError, GraphGateway};
use crate::schema::{EdgePair, EdgeSpec};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

/// Per-batch retry behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per batch
    pub max_retries: u32,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 20,
            backoff_base: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based): linear in the attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoaderConfig {
    /// Maximum batches in flight
    pub window: usize,
    pub retry: RetryPolicy,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            window: 20,
            retry: RetryPolicy::default(),
        }
    }
}

/// Totals for one load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub batches: usize,
    /// Pairs submitted
    pub pairs: usize,
    /// Pairs whose endpoints both matched
    pub relationships: usize,
    /// Failed attempts that were retried
    pub retries: usize,
}

impl LoadReport {
    fn absorb(&mut self, outcome: BatchOutcome) {
        self.batches += 1;
        self.pairs += outcome.pairs;
        self.relationships += outcome.relationships;
        self.retries += outcome.retries;
    }
}

#[derive(Debug, Clone, Copy)]
struct BatchOutcome {
    pairs: usize,
    relationships: usize,
    retries: usize,
}

type BatchTask = IngestResult<BatchOutcome>;

pub struct ConcurrentLoader {
    gateway: Arc<dyn GraphGateway>,
    config: LoaderConfig,
}

impl ConcurrentLoader {
    pub fn new(gateway: Arc<dyn GraphGateway>, config: LoaderConfig) -> Self {
        Self { gateway, config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Write every batch. Returns once all batches succeeded, or with the
    /// first fatal error after aborting the rest.
    pub async fn load<I>(&self, batches: I) -> IngestResult<LoadReport>
    where
        I: IntoIterator<Item = (EdgeSpec, Vec<EdgePair>)>,
    {
        let window = self.config.window.max(1);
        let semaphore = Arc::new(Semaphore::new(window));
        let mut tasks: JoinSet<BatchTask> = JoinSet::new();
        let mut report = LoadReport::default();

        for (index, (spec, batch)) in batches.into_iter().enumerate() {
            // Wait for a slot, settling finished batches meanwhile so a
            // fatal failure stops admission right away
            let permit = loop {
                tokio::select! {
                    biased;
                    Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                        settle(joined, &mut tasks, &mut report)?;
                    }
                    permit = Arc::clone(&semaphore).acquire_owned() => {
                        break permit.map_err(|_| {
                            IngestError::Gateway(GatewayError::Unavailable("loader window closed".to_string()))
                        })?;
                    }
                }
            };

            let gateway = Arc::clone(&self.gateway);
            let retry = self.config.retry;
            debug!("Batch {} in flight ({} pairs, [:{}])", index, batch.len(), spec.edge_type);
            tasks.spawn(async move {
                let _permit = permit;
                write_with_retry(gateway.as_ref(), &spec, &batch, index, &retry).await
            });
        }

        while let Some(joined) = tasks.join_next().await {
            settle(joined, &mut tasks, &mut report)?;
        }

        info!(
            "Loaded {} batches: {}/{} pairs matched, {} retries",
            report.batches, report.relationships, report.pairs, report.retries
        );
        Ok(report)
    }
}

/// Fold one finished task into the report; on failure abort the rest
fn settle(
    joined: Result<BatchTask, JoinError>,
    tasks: &mut JoinSet<BatchTask>,
    report: &mut LoadReport,
) -> IngestResult<()> {
    let result = joined.map_err(IngestError::from).and_then(|outcome| outcome);
    match result {
        Ok(outcome) => {
            report.absorb(outcome);
            Ok(())
        }
        Err(e) => {
            error!("Aborting load, {} batches still in flight: {}", tasks.len(), e);
            tasks.abort_all();
            Err(e)
        }
    }
}

async fn write_with_retry(
    gateway: &dyn GraphGateway,
    spec: &EdgeSpec,
    batch: &[EdgePair],
    index: usize,
    policy: &RetryPolicy,
) -> BatchTask {
    let attempts = policy.max_retries.max(1);
    let mut attempt = 1;
    loop {
        match gateway.upsert_edge_batch(spec, batch).await {
            Ok(relationships) => {
                return Ok(BatchOutcome {
                    pairs: batch.len(),
                    relationships,
                    retries: (attempt - 1) as usize,
                })
            }
            // Retrying cannot fix a malformed statement
            Err(e @ GatewayError::InvalidIdentifier(_)) => return Err(IngestError::Gateway(e)),
            Err(e) if attempt >= attempts => {
                return Err(IngestError::RetriesExhausted {
                    batch: index,
                    attempts,
                    source: e,
                })
            }
            Err(e) => {
                warn!(
                    "Batch {} attempt {}/{} failed, retrying: {}",
                    index, attempt, attempts, e
                );
                tokio::time::sleep(policy.backoff(attempt)).await;
                attempt += 1;
            }
        }
    }
}
