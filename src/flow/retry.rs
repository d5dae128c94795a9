//! Retry-on-predicate decorator.
//!
//! [`Retrying`] re-invokes the wrapped operation when a caller-supplied
//! predicate flags the outcome as retryable — either a predicate over
//! the error or one over a returned result (e.g. "status 500 or 520").
//! Retries are immediate; there is no backoff here. Pipelines place the
//! retry decorator inside the rate gates, so every physical attempt is
//! itself rate-governed and the gates provide the pacing. A standalone
//! `Retrying` does not throttle at all.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use super::signal::{self, Signals};
use super::Operation;
use crate::telemetry;
use crate::{BifrostError, Result};

/// Predicate over a returned result.
pub type ResultPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;
/// Predicate over a failure.
pub type ErrorPredicate = Arc<dyn Fn(&BifrostError) -> bool + Send + Sync>;

/// Decorator that retries the wrapped operation up to `max_retries`
/// additional times. The final result or error is returned unchanged.
pub struct Retrying<A, T> {
    inner: Arc<dyn Operation<A, T>>,
    max_retries: u32,
    retry_on_result: ResultPredicate<T>,
    retry_on_error: ErrorPredicate,
    signals: Arc<Signals<A, T>>,
}

impl<A, T> Retrying<A, T>
where
    A: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Wrap an operation with retry logic.
    ///
    /// `max_retries` counts additional attempts: an operation that is
    /// always flagged retryable runs `max_retries + 1` times in total.
    pub fn new(
        inner: Arc<dyn Operation<A, T>>,
        max_retries: u32,
        retry_on_result: ResultPredicate<T>,
        retry_on_error: ErrorPredicate,
    ) -> Self {
        let signals = Arc::new(Signals::new());
        signal::forward(inner.signals(), &signals);

        Self {
            inner,
            max_retries,
            retry_on_result,
            retry_on_error,
            signals,
        }
    }

    /// The configured maximum number of additional attempts.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

#[async_trait]
impl<A, T> Operation<A, T> for Retrying<A, T>
where
    A: Clone + Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    async fn invoke(&self, args: A) -> Result<T> {
        let mut attempt = 0u32;
        loop {
            let may_retry = attempt < self.max_retries;
            match self.inner.invoke(args.clone()).await {
                Ok(result) if may_retry && (self.retry_on_result)(&result) => {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        "result flagged retryable; retrying"
                    );
                }
                Err(err) if may_retry && (self.retry_on_error)(&err) => {
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        error = %err,
                        "retrying after retryable failure"
                    );
                }
                outcome => return outcome,
            }
            metrics::counter!(telemetry::RETRIES_TOTAL).increment(1);
            attempt += 1;
        }
    }

    fn signals(&self) -> &Signals<A, T> {
        &self.signals
    }
}
