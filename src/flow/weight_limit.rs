//! Weight-budget rate limiting decorator.
//!
//! [`WeightRateLimited`] draws abstract "weight" units from a shared
//! [`RateBudget`] — a rolling one-minute account kept in one-second
//! buckets. The budget is the one piece of state meant to be shared
//! across multiple pipelines (e.g. a provider-wide request quota), so it
//! is handed around as `Arc<RateBudget>` and tolerates concurrent use.
//!
//! An invocation is admitted once the remaining budget covers its
//! weight; the weight is recorded at the moment admission is confirmed.
//! When the budget is short, the gate emits *execution-delayed* and
//! polls again after a short fixed backoff — buckets age out
//! continuously, so computing an exact refill time buys nothing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use super::signal::{self, Signals};
use super::{Bypass, Operation};
use crate::telemetry;
use crate::Result;

/// How long a short-of-budget caller sleeps before re-evaluating.
///
/// Bounded and non-zero; precision beyond this is pointless because the
/// trailing window moves every second anyway.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Window width of the rolling budget, in one-second buckets.
const WINDOW_SECS: u64 = 60;

/// Shared rolling-window weight account.
///
/// Remaining budget is the configured per-minute ceiling minus the sum
/// of weights recorded in the trailing sixty one-second buckets
/// (current second included), floored at zero. The ceiling can be
/// adjusted at runtime, e.g. from server-reported limits in a response
/// body.
pub struct RateBudget {
    per_minute: AtomicU32,
    buckets: Mutex<HashMap<u64, u32>>,
}

impl RateBudget {
    /// Create a budget with the given per-minute weight ceiling.
    pub fn new(per_minute: u32) -> Self {
        Self {
            per_minute: AtomicU32::new(per_minute),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// The configured per-minute ceiling.
    pub fn per_minute(&self) -> u32 {
        self.per_minute.load(Ordering::Relaxed)
    }

    /// Adjust the per-minute ceiling.
    pub fn set_per_minute(&self, per_minute: u32) {
        self.per_minute.store(per_minute, Ordering::Relaxed);
    }

    /// Weight still available in the trailing window. Never negative.
    pub fn remaining(&self) -> u32 {
        let buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        self.per_minute()
            .saturating_sub(Self::used(&buckets, now_secs()))
    }

    /// Record weight against the current second without admission
    /// control, e.g. to account for spend reported by the server.
    pub fn record(&self, weight: u32) {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let now = now_secs();
        buckets.retain(|&second, _| second + WINDOW_SECS > now);
        let bucket = buckets.entry(now).or_insert(0);
        *bucket = bucket.saturating_add(weight);
    }

    /// Atomically admit-and-record: if the remaining budget covers
    /// `weight`, record it against the current second and return true.
    pub(crate) fn try_consume(&self, weight: u32) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let now = now_secs();
        buckets.retain(|&second, _| second + WINDOW_SECS > now);

        let remaining = self.per_minute().saturating_sub(Self::used(&buckets, now));
        if remaining >= weight {
            let bucket = buckets.entry(now).or_insert(0);
            *bucket = bucket.saturating_add(weight);
            true
        } else {
            false
        }
    }

    fn used(buckets: &HashMap<u64, u32>, now: u64) -> u32 {
        buckets
            .iter()
            .filter(|&(&second, _)| second + WINDOW_SECS > now)
            .fold(0u32, |total, (_, &weight)| total.saturating_add(weight))
    }
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Decorator that admits invocations against a shared [`RateBudget`].
pub struct WeightRateLimited<A, T> {
    inner: Arc<dyn Operation<A, T>>,
    weight: u32,
    budget: Arc<RateBudget>,
    poll_interval: Duration,
    gate: tokio::sync::Mutex<()>,
    bypass: Option<Bypass<A>>,
    signals: Arc<Signals<A, T>>,
}

impl<A, T> WeightRateLimited<A, T>
where
    A: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Wrap an operation with a weight gate drawing from `budget`.
    pub fn new(inner: Arc<dyn Operation<A, T>>, weight: u32, budget: Arc<RateBudget>) -> Self {
        Self::build(inner, weight, budget, None)
    }

    /// Same, with a bypass predicate (zero delay when it holds).
    pub fn with_bypass(
        inner: Arc<dyn Operation<A, T>>,
        weight: u32,
        budget: Arc<RateBudget>,
        bypass: Bypass<A>,
    ) -> Self {
        Self::build(inner, weight, budget, Some(bypass))
    }

    fn build(
        inner: Arc<dyn Operation<A, T>>,
        weight: u32,
        budget: Arc<RateBudget>,
        bypass: Option<Bypass<A>>,
    ) -> Self {
        let signals = Arc::new(Signals::new());
        signal::forward(inner.signals(), &signals);

        Self {
            inner,
            weight,
            budget,
            poll_interval: DEFAULT_POLL_INTERVAL,
            gate: tokio::sync::Mutex::new(()),
            bypass,
            signals,
        }
    }

    /// Override the fixed backoff between budget re-evaluations.
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// The budget this gate draws from.
    pub fn budget(&self) -> &Arc<RateBudget> {
        &self.budget
    }

    /// Time until the next invocation would be admitted: zero when the
    /// budget covers the weight (or the bypass predicate holds), one
    /// poll interval otherwise.
    pub fn time_to_next_admission(&self, args: &A) -> Duration {
        if let Some(bypass) = &self.bypass {
            if bypass(args) {
                return Duration::ZERO;
            }
        }
        if self.budget.remaining() >= self.weight {
            Duration::ZERO
        } else {
            self.poll_interval
        }
    }

    fn bypassed(&self, args: &A) -> bool {
        self.bypass.as_ref().is_some_and(|bypass| bypass(args))
    }
}

#[async_trait]
impl<A, T> Operation<A, T> for WeightRateLimited<A, T>
where
    A: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    async fn invoke(&self, args: A) -> Result<T> {
        loop {
            // Bypassed calls are expected to be served upstream without
            // network spend, so they consume no budget.
            if self.bypassed(&args) {
                break;
            }
            {
                let _slot = self.gate.lock().await;
                if self.budget.try_consume(self.weight) {
                    break;
                }
            }
            metrics::counter!(telemetry::RATE_DELAYS_TOTAL, "gate" => "weight").increment(1);
            tracing::debug!(
                weight = self.weight,
                remaining = self.budget.remaining(),
                "weight gate deferring"
            );
            self.signals.emit_delayed(&args);
            tokio::time::sleep(self.poll_interval).await;
        }

        self.inner.invoke(args).await
    }

    fn signals(&self) -> &Signals<A, T> {
        &self.signals
    }
}
