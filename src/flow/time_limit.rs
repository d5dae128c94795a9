//! Minimum-interval rate limiting decorator.
//!
//! [`TimeRateLimited`] enforces a minimum wall-clock interval between
//! successive *admitted* invocations. Admission is the moment the
//! wrapped chain actually begins executing (its before-execution signal
//! fires), not the moment a caller clears the wait — under contention
//! the two differ, and gate state couples to real admission.
//!
//! Callers queue on a single-slot fair gate, so admission is strict
//! FIFO per instance. The gate is released as soon as the current
//! admission is confirmed, which lets admitted work overlap; completion
//! order is not guaranteed.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::signal::{self, Signals};
use super::{Bypass, Operation};
use crate::telemetry;
use crate::Result;

/// Decorator that spaces admissions at least `min_interval` apart.
pub struct TimeRateLimited<A, T> {
    inner: Arc<dyn Operation<A, T>>,
    min_interval: Duration,
    last_admitted: Arc<Mutex<Option<Instant>>>,
    gate: tokio::sync::Mutex<()>,
    bypass: Option<Bypass<A>>,
    signals: Arc<Signals<A, T>>,
}

impl<A, T> TimeRateLimited<A, T>
where
    A: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Wrap an operation with a minimum-interval gate.
    pub fn new(inner: Arc<dyn Operation<A, T>>, min_interval: Duration) -> Self {
        Self::build(inner, min_interval, None)
    }

    /// Same, with a bypass predicate: when it evaluates true for the
    /// given arguments the gate reports zero delay unconditionally
    /// (e.g. "the result is already cached upstream").
    pub fn with_bypass(
        inner: Arc<dyn Operation<A, T>>,
        min_interval: Duration,
        bypass: Bypass<A>,
    ) -> Self {
        Self::build(inner, min_interval, Some(bypass))
    }

    fn build(
        inner: Arc<dyn Operation<A, T>>,
        min_interval: Duration,
        bypass: Option<Bypass<A>>,
    ) -> Self {
        let signals = Arc::new(Signals::new());
        signal::forward(inner.signals(), &signals);

        let last_admitted = Arc::new(Mutex::new(None));
        let stamp = Arc::clone(&last_admitted);
        inner.signals().on_before(move |_| {
            *stamp.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        });

        Self {
            inner,
            min_interval,
            last_admitted,
            gate: tokio::sync::Mutex::new(()),
            bypass,
            signals,
        }
    }

    /// The configured minimum interval between admissions.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Time left until the next invocation would be admitted.
    ///
    /// Zero when the interval has passed, nothing was admitted yet, or
    /// the bypass predicate holds for these arguments.
    pub fn time_to_next_admission(&self, args: &A) -> Duration {
        if let Some(bypass) = &self.bypass {
            if bypass(args) {
                return Duration::ZERO;
            }
        }
        let last = *self
            .last_admitted
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match last {
            Some(at) => (at + self.min_interval).saturating_duration_since(Instant::now()),
            None => Duration::ZERO,
        }
    }
}

#[async_trait]
impl<A, T> Operation<A, T> for TimeRateLimited<A, T>
where
    A: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    async fn invoke(&self, args: A) -> Result<T> {
        let mut slot = Some(self.gate.lock().await);

        loop {
            let delay = self.time_to_next_admission(&args);
            if delay.is_zero() {
                break;
            }
            metrics::counter!(telemetry::RATE_DELAYS_TOTAL, "gate" => "time").increment(1);
            tracing::debug!(delay_ms = delay.as_millis() as u64, "time gate deferring");
            self.signals.emit_delayed(&args);
            tokio::time::sleep(delay).await;
        }

        // Hold the gate until the inner chain confirms admission, so the
        // next caller computes its delay from an up-to-date timestamp. A
        // cache hit below never confirms; the gate is then held until
        // the result comes back.
        let mut admitted = self.inner.signals().before_watch();
        let fut = self.inner.invoke(args);
        tokio::pin!(fut);

        let result = loop {
            tokio::select! {
                biased;
                _ = &mut admitted, if slot.is_some() => {
                    slot.take();
                }
                result = &mut fut => break result,
            }
        };
        drop(slot);
        result
    }

    fn signals(&self) -> &Signals<A, T> {
        &self.signals
    }
}
