//! Tests for metrics emission across the dispatcher and decorators.
//!
//! Uses `metrics_util::debugging::DebuggingRecorder` to capture and assert
//! on emitted metrics without needing a real exporter.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::MetricKind;
use metrics_util::debugging::{DebugValue, DebuggingRecorder};

use bifrost::telemetry;
use bifrost::{
    EndpointBuilder, Method, RawResponse, Result, RestClient, Transport,
};

// ============================================================================
// Mock transport
// ============================================================================

/// Answers with a scripted sequence of statuses, then 200 "ok" forever.
struct ScriptedTransport {
    statuses: Mutex<VecDeque<u16>>,
}

impl ScriptedTransport {
    fn new(statuses: &[u16]) -> Arc<Self> {
        Arc::new(Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
        })
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        _method: Method,
        _uri: &str,
        _headers: &[(String, String)],
    ) -> Result<RawResponse> {
        let status = self.statuses.lock().unwrap().pop_front().unwrap_or(200);
        Ok(RawResponse {
            status,
            headers: Vec::new(),
            body: "ok".to_owned(),
        })
    }
}

fn client_over(transport: Arc<ScriptedTransport>, endpoint: EndpointBuilder) -> RestClient {
    RestClient::builder()
        .endpoint(endpoint)
        .transport(transport)
        .cooldown_on_status(419, Duration::from_millis(10))
        .build()
        .unwrap()
}

// ============================================================================
// Snapshot type alias for readability
// ============================================================================

type SnapshotVec = Vec<(
    metrics_util::CompositeKey,
    Option<metrics::Unit>,
    Option<metrics::SharedString>,
    DebugValue,
)>;

// ============================================================================
// Helpers
// ============================================================================

/// Sum all counter values matching a given metric name.
fn counter_total(snapshot: &SnapshotVec, name: &str) -> u64 {
    snapshot
        .iter()
        .filter(|(key, _, _, _)| key.kind() == MetricKind::Counter && key.key().name() == name)
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(v) => *v,
            _ => 0,
        })
        .sum()
}

/// Check if any histogram entries exist for a given metric name.
fn has_histogram(snapshot: &SnapshotVec, name: &str) -> bool {
    snapshot
        .iter()
        .any(|(key, _, _, _)| key.kind() == MetricKind::Histogram && key.key().name() == name)
}

// ============================================================================
// Tests
// ============================================================================

/// Runs async code within a local recorder scope on the multi-thread runtime.
///
/// `block_in_place` ensures the sync `with_local_recorder` closure stays
/// on the current thread while `block_on` drives the inner async work.
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn successful_call_records_request_metrics() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let client = client_over(
                    ScriptedTransport::new(&[]),
                    EndpointBuilder::fixed("ping", "https://api.example.com/ping"),
                );
                client.call("ping", Vec::new()).await
            })
        })
    });
    assert!(result.is_ok());

    let snapshot = snapshotter.snapshot().into_vec();

    let count = counter_total(&snapshot, telemetry::REQUESTS_TOTAL);
    assert_eq!(count, 1, "expected 1 request counter");

    assert!(
        has_histogram(&snapshot, telemetry::REQUEST_DURATION_SECONDS),
        "expected a duration histogram entry"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn retries_and_cooldowns_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let _result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let client = client_over(
                    // first call: two retryable statuses, then the happy
                    // answer; second call: 419 through every attempt, so
                    // the final response trips the cooldown
                    ScriptedTransport::new(&[500, 500, 200, 419, 419, 419, 419]),
                    EndpointBuilder::fixed("flaky", "https://api.example.com/flaky")
                        .retry(3, &[500]),
                );
                client.call("flaky", Vec::new()).await.unwrap();
                let _ = client.call("flaky", Vec::new()).await;
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    // the 419 is retryable too (appended by the builder): 2 + 3 retries
    assert_eq!(counter_total(&snapshot, telemetry::RETRIES_TOTAL), 5);
    assert_eq!(counter_total(&snapshot, telemetry::COOLDOWNS_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::REQUESTS_TOTAL), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn cache_hits_and_misses_are_counted() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    let _result = metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let client = client_over(
                    ScriptedTransport::new(&[]),
                    EndpointBuilder::fixed("info", "https://api.example.com/info")
                        .cache(Duration::from_secs(60)),
                );
                client.call("info", Vec::new()).await.unwrap();
                client.call("info", Vec::new()).await.unwrap();
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();

    assert_eq!(counter_total(&snapshot, telemetry::CACHE_MISSES_TOTAL), 1);
    assert_eq!(counter_total(&snapshot, telemetry::CACHE_HITS_TOTAL), 1);
}

#[tokio::test]
async fn metrics_are_noop_without_recorder() {
    // Verify no panics when no recorder is installed.
    let client = client_over(
        ScriptedTransport::new(&[]),
        EndpointBuilder::fixed("ping", "https://api.example.com/ping"),
    );
    client.call("ping", Vec::new()).await.unwrap();
}
