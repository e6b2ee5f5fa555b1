use async_trait::async_trait;
use biblio_graph::gateway::{EmbeddedGateway, GatewayError, GatewayResult, GraphGateway};
use biblio_graph::graph::PropertyMap;
use biblio_graph::{
    ConcurrentLoader, EdgeKind, EdgePair, EdgeSpec, IngestError, LoaderConfig, RetryPolicy,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Wraps the embedded gateway, failing the first `failures` edge writes and
/// tracking how many edge writes overlap. Batches starting at `poisoned`
/// fail every time, without waiting out `hold`.
struct FlakyGateway {
    inner: EmbeddedGateway,
    failures: AtomicUsize,
    poisoned: Option<String>,
    calls: AtomicUsize,
    completed: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    hold: Duration,
}

impl FlakyGateway {
    async fn new(failures: usize, hold: Duration) -> Self {
        let inner = EmbeddedGateway::in_memory("papers");
        inner.ensure_database().await.unwrap();

        let docs: Vec<PropertyMap> = (0..10)
            .map(|i| {
                let mut props = PropertyMap::new();
                props.insert("name".to_string(), format!("10.1/{i}").into());
                props
            })
            .collect();
        inner.upsert_nodes("doi", "name", &docs).await.unwrap();

        Self {
            inner,
            failures: AtomicUsize::new(failures),
            poisoned: None,
            calls: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            hold,
        }
    }

    fn poisoned(mut self, start: &str) -> Self {
        self.poisoned = Some(start.to_string());
        self
    }
}

#[async_trait]
impl GraphGateway for FlakyGateway {
    fn database(&self) -> &str {
        self.inner.database()
    }

    async fn ensure_database(&self) -> GatewayResult<()> {
        self.inner.ensure_database().await
    }

    async fn ping(&self) -> GatewayResult<()> {
        self.inner.ping().await
    }

    async fn ensure_index(&self, label: &str, property: &str) -> GatewayResult<()> {
        self.inner.ensure_index(label, property).await
    }

    async fn upsert_nodes(
        &self,
        label: &str,
        match_key: &str,
        batch: &[PropertyMap],
    ) -> GatewayResult<usize> {
        self.inner.upsert_nodes(label, match_key, batch).await
    }

    async fn upsert_edge_batch(&self, spec: &EdgeSpec, batch: &[EdgePair]) -> GatewayResult<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if batch.iter().any(|p| Some(&p.start) == self.poisoned.as_ref()) {
            return Err(GatewayError::Unavailable("poisoned batch".to_string()));
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.hold).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(GatewayError::Unavailable("transient".to_string()));
        }
        let matched = self.inner.upsert_edge_batch(spec, batch).await?;
        self.completed.fetch_add(1, Ordering::SeqCst);
        Ok(matched)
    }

    async fn clear(&self) -> GatewayResult<()> {
        self.inner.clear().await
    }

    async fn close(&self) -> GatewayResult<()> {
        self.inner.close().await
    }
}

fn config(window: usize, max_retries: u32) -> LoaderConfig {
    LoaderConfig {
        window,
        retry: RetryPolicy {
            max_retries,
            backoff_base: Duration::from_millis(1),
        },
    }
}

fn reference_batches(count: usize) -> Vec<(EdgeSpec, Vec<EdgePair>)> {
    (0..count)
        .map(|i| {
            let pair = EdgePair::new(format!("10.1/{}", i % 10), format!("10.1/{}", (i + 1) % 10));
            (EdgeKind::Reference.spec(), vec![pair])
        })
        .collect()
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let gateway = Arc::new(FlakyGateway::new(3, Duration::ZERO).await);
    let loader = ConcurrentLoader::new(gateway.clone(), config(1, 20));

    let report = loader.load(reference_batches(2)).await.unwrap();

    assert_eq!(report.batches, 2);
    assert_eq!(report.retries, 3);
    assert_eq!(report.relationships, 2);
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 5);

    let graph = gateway.inner.graph().await.unwrap();
    assert_eq!(graph.read().await.edge_count(), 2);
}

#[tokio::test]
async fn test_exhausted_retries_are_fatal() {
    let gateway = Arc::new(FlakyGateway::new(usize::MAX, Duration::ZERO).await);
    let loader = ConcurrentLoader::new(gateway.clone(), config(1, 4));

    let err = loader.load(reference_batches(3)).await.unwrap_err();

    assert!(err.is_retries_exhausted());
    match err {
        IngestError::RetriesExhausted { batch, attempts, .. } => {
            assert_eq!(batch, 0);
            assert_eq!(attempts, 4);
        }
        other => panic!("unexpected error: {other}"),
    }
    // Window of one: nothing past the failing batch was admitted
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_failed_batch_stops_its_window_siblings() {
    let hold = Duration::from_secs(5);
    let gateway = Arc::new(FlakyGateway::new(0, hold).await.poisoned("10.1/0"));
    let loader = ConcurrentLoader::new(gateway.clone(), config(3, 2));

    let started = tokio::time::Instant::now();
    let err = loader.load(reference_batches(10)).await.unwrap_err();

    match err {
        IngestError::RetriesExhausted { batch, attempts, .. } => {
            assert_eq!(batch, 0);
            assert_eq!(attempts, 2);
        }
        other => panic!("unexpected error: {other}"),
    }
    // Batches 1 and 2 were in flight and got cut off mid-write
    assert!(started.elapsed() < hold, "load waited for in-flight siblings");
    assert_eq!(gateway.completed.load(Ordering::SeqCst), 0);
    // Two attempts at batch 0 plus one each for batches 1 and 2; nothing
    // past the first window was admitted
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 4);

    let graph = gateway.inner.graph().await.unwrap();
    assert_eq!(graph.read().await.edge_count(), 0);
}

#[tokio::test]
async fn test_window_bounds_concurrency() {
    let gateway = Arc::new(FlakyGateway::new(0, Duration::from_millis(5)).await);
    let loader = ConcurrentLoader::new(gateway.clone(), config(3, 20));

    let report = loader.load(reference_batches(20)).await.unwrap();

    assert_eq!(report.batches, 20);
    let peak = gateway.max_in_flight.load(Ordering::SeqCst);
    assert!(peak <= 3, "peak in-flight {peak} exceeded window");
    assert!(peak >= 2, "batches never overlapped");
}

#[tokio::test]
async fn test_invalid_identifier_is_not_retried() {
    let gateway = Arc::new(FlakyGateway::new(0, Duration::ZERO).await);
    let loader = ConcurrentLoader::new(gateway.clone(), config(2, 20));

    let bad = EdgeSpec {
        edge_type: "cites` DETACH DELETE",
        ..EdgeKind::Reference.spec()
    };
    let err = loader
        .load(vec![(bad, vec![EdgePair::new("10.1/0", "10.1/1")])])
        .await
        .unwrap_err();

    assert!(matches!(err, IngestError::Gateway(GatewayError::InvalidIdentifier(_))));
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_input_is_a_no_op() {
    let gateway = Arc::new(FlakyGateway::new(0, Duration::ZERO).await);
    let loader = ConcurrentLoader::new(gateway.clone(), config(4, 20));

    let report = loader.load(Vec::new()).await.unwrap();
    assert_eq!(report.batches, 0);
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
}
