//! Tests for [`Retrying`] — predicate-driven immediate retries.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use futures_util::FutureExt;

use bifrost::{BifrostError, Call, Operation, Retrying};
use bifrost::flow::{ErrorPredicate, ResultPredicate};

fn never_on_result<T>() -> ResultPredicate<T> {
    Arc::new(|_| false)
}

fn never_on_error() -> ErrorPredicate {
    Arc::new(|_| false)
}

/// Leaf failing with a transport error until `failures` attempts passed.
fn fail_then_succeed(calls: Arc<AtomicU32>, failures: u32) -> Arc<Call<u32, u32>> {
    Arc::new(Call::new(move |n: u32| {
        let calls = Arc::clone(&calls);
        async move {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= failures {
                Err(BifrostError::Transport("connection reset".into()))
            } else {
                Ok(n)
            }
        }
        .boxed()
    }))
}

#[tokio::test]
async fn recovers_from_transient_failures() {
    let calls = Arc::new(AtomicU32::new(0));
    let retrying = Retrying::new(
        fail_then_succeed(Arc::clone(&calls), 2),
        3,
        never_on_result(),
        Arc::new(BifrostError::is_transient),
    );

    assert_eq!(retrying.invoke(7).await.unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn gives_up_after_max_retries_and_returns_the_final_error() {
    let calls = Arc::new(AtomicU32::new(0));
    let retrying = Retrying::new(
        fail_then_succeed(Arc::clone(&calls), u32::MAX),
        2,
        never_on_result(),
        Arc::new(BifrostError::is_transient),
    );

    let err = retrying.invoke(1).await.unwrap_err();
    assert!(matches!(err, BifrostError::Transport(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 3, "max_retries + 1 attempts");
}

#[tokio::test]
async fn non_retryable_error_fails_immediately() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let leaf: Arc<Call<u32, u32>> = Arc::new(Call::new(move |_n: u32| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(BifrostError::Configuration("bad endpoint template".into()))
        }
        .boxed()
    }));
    let retrying = Retrying::new(
        leaf,
        5,
        never_on_result(),
        Arc::new(BifrostError::is_transient),
    );

    let err = retrying.invoke(1).await.unwrap_err();
    assert!(matches!(err, BifrostError::Configuration(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn result_predicate_triggers_retry() {
    // models "retry while the upstream answers a 5xx status"
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let leaf: Arc<Call<u32, u16>> = Arc::new(Call::new(move |_n: u32| {
        let counter = Arc::clone(&counter);
        async move {
            let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(if attempt < 3 { 500u16 } else { 200 })
        }
        .boxed()
    }));
    let retrying = Retrying::new(leaf, 5, Arc::new(|status: &u16| *status >= 500), never_on_error());

    assert_eq!(retrying.invoke(1).await.unwrap(), 200);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn persistently_retryable_result_is_returned_unchanged() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&calls);
    let leaf: Arc<Call<u32, u16>> = Arc::new(Call::new(move |_n: u32| {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(503u16)
        }
        .boxed()
    }));
    let retrying = Retrying::new(leaf, 2, Arc::new(|status: &u16| *status >= 500), never_on_error());

    assert_eq!(retrying.invoke(1).await.unwrap(), 503);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn retries_are_immediate() {
    // pacing is the rate gates' job; the retry loop itself never sleeps
    let calls = Arc::new(AtomicU32::new(0));
    let retrying = Retrying::new(
        fail_then_succeed(calls, 4),
        4,
        never_on_result(),
        Arc::new(BifrostError::is_transient),
    );

    let start = tokio::time::Instant::now();
    retrying.invoke(1).await.unwrap();
    assert_eq!(start.elapsed(), std::time::Duration::ZERO);
}
