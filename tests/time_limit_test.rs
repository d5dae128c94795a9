//! Tests for [`TimeRateLimited`] — minimum-interval admission spacing.
//!
//! All tests run with the tokio clock paused, so sleeps resolve
//! instantly and admission timestamps are exact.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::time::Instant;

use bifrost::{Call, Operation, TimeRateLimited};

fn noop_leaf() -> Arc<Call<u32, ()>> {
    Arc::new(Call::new(|_n: u32| async { Ok(()) }.boxed()))
}

#[tokio::test(start_paused = true)]
async fn concurrent_admissions_are_spaced_by_min_interval() {
    let interval = Duration::from_millis(100);
    let gate = Arc::new(TimeRateLimited::new(noop_leaf(), interval));

    let admissions: Arc<Mutex<Vec<Instant>>> = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&admissions);
    gate.signals().on_before(move |_| {
        log.lock().unwrap().push(Instant::now());
    });

    let mut tasks = Vec::new();
    for n in 0..5u32 {
        let gate = Arc::clone(&gate);
        tasks.push(tokio::spawn(async move { gate.invoke(n).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let mut times = admissions.lock().unwrap().clone();
    times.sort();
    assert_eq!(times.len(), 5);
    for pair in times.windows(2) {
        assert!(
            pair[1] - pair[0] >= interval,
            "admissions {:?} and {:?} closer than the minimum interval",
            pair[0],
            pair[1]
        );
    }
}

#[tokio::test(start_paused = true)]
async fn admitted_work_overlaps() {
    // two callers, 1s of work each, 100ms interval: if the gate were
    // held for the whole execution the pair would take 2s
    let leaf: Arc<Call<u32, ()>> = Arc::new(Call::new(|_n: u32| {
        async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(())
        }
        .boxed()
    }));
    let gate = Arc::new(TimeRateLimited::new(leaf, Duration::from_millis(100)));

    let start = Instant::now();
    let first = tokio::spawn({
        let gate = Arc::clone(&gate);
        async move { gate.invoke(1).await }
    });
    let second = tokio::spawn({
        let gate = Arc::clone(&gate);
        async move { gate.invoke(2).await }
    });
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(1));
    assert!(
        elapsed < Duration::from_millis(1500),
        "second caller should run while the first is still in flight, took {elapsed:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn deferred_caller_gets_delayed_signal() {
    let gate = Arc::new(TimeRateLimited::new(
        noop_leaf(),
        Duration::from_millis(100),
    ));
    let delayed = Arc::new(AtomicU32::new(0));
    let count = Arc::clone(&delayed);
    gate.signals().on_delayed(move |_| {
        count.fetch_add(1, Ordering::SeqCst);
    });

    gate.invoke(1).await.unwrap();
    assert_eq!(delayed.load(Ordering::SeqCst), 0, "first caller is not deferred");

    gate.invoke(2).await.unwrap();
    assert_eq!(delayed.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn bypass_skips_the_wait() {
    let gate = Arc::new(TimeRateLimited::with_bypass(
        noop_leaf(),
        Duration::from_secs(60),
        Arc::new(|_: &u32| true),
    ));

    let start = Instant::now();
    gate.invoke(1).await.unwrap();
    gate.invoke(2).await.unwrap();
    assert_eq!(start.elapsed(), Duration::ZERO, "bypassed calls never sleep");
    assert_eq!(gate.time_to_next_admission(&3), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn time_to_next_admission_counts_down() {
    let interval = Duration::from_millis(100);
    let gate = TimeRateLimited::new(noop_leaf(), interval);

    assert_eq!(gate.time_to_next_admission(&0), Duration::ZERO);

    gate.invoke(0).await.unwrap();
    assert_eq!(gate.time_to_next_admission(&0), interval);

    tokio::time::sleep(Duration::from_millis(40)).await;
    assert_eq!(gate.time_to_next_admission(&0), Duration::from_millis(60));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(gate.time_to_next_admission(&0), Duration::ZERO);
}
