//! Name-keyed endpoint dispatcher with a shared cooldown.
//!
//! [`RestClient`] owns an immutable table of endpoint pipelines built
//! once at construction. Every call first waits out the dispatcher-wide
//! cooldown deadline, then runs the named pipeline. Every response is
//! inspected with the configured rate-limit predicate; a match raises a
//! [`RateLimitNotice`] and pushes the cooldown deadline forward,
//! delaying **all** endpoints — the cooldown models a provider-wide
//! throttle, not a per-endpoint one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::Instant;
use tracing::warn;

use super::args::Args;
use super::builder::RestClientBuilder;
use super::endpoint::Endpoint;
use super::transport::RawResponse;
use crate::flow::signal::Signals;
use crate::telemetry;
use crate::{BifrostError, Result};

/// Predicate detecting the provider's rate-limit-exceeded signal in a
/// raw response.
pub type RateLimitSignal = Arc<dyn Fn(&RawResponse) -> bool + Send + Sync>;

/// Broadcast to subscribers whenever a response trips the cooldown.
#[derive(Debug, Clone)]
pub struct RateLimitNotice {
    /// Endpoint whose response carried the signal.
    pub endpoint: String,
    /// Status code of that response.
    pub status: u16,
}

/// Dispatcher over a fixed set of endpoint pipelines.
pub struct RestClient {
    endpoints: HashMap<String, Endpoint>,
    rate_limited_when: RateLimitSignal,
    cooldown_delay: Duration,
    cooldown_until: Mutex<Option<Instant>>,
    notices: broadcast::Sender<RateLimitNotice>,
}

impl RestClient {
    /// Start configuring a dispatcher.
    pub fn builder() -> RestClientBuilder {
        RestClientBuilder::new()
    }

    pub(crate) fn new(
        endpoints: HashMap<String, Endpoint>,
        rate_limited_when: RateLimitSignal,
        cooldown_delay: Duration,
    ) -> Self {
        let (notices, _) = broadcast::channel(16);
        Self {
            endpoints,
            rate_limited_when,
            cooldown_delay,
            cooldown_until: Mutex::new(None),
            notices,
        }
    }

    /// Call the named endpoint and return the response body.
    ///
    /// Waits out the shared cooldown first, then runs the endpoint's
    /// pipeline. A response carrying the rate-limit signal trips the
    /// cooldown and is then handled like any other: 2xx yields the
    /// body, anything else surfaces as
    /// [`BifrostError::UnsuccessfulResponse`].
    pub async fn call(&self, name: &str, args: Args) -> Result<String> {
        self.wait_for_cooldown().await;

        let endpoint = self
            .endpoints
            .get(name)
            .ok_or_else(|| BifrostError::UnknownEndpoint(name.to_owned()))?;

        let started = Instant::now();
        let outcome = endpoint.execute(args).await;
        let status_label = if outcome.is_ok() { "ok" } else { "error" };
        metrics::counter!(telemetry::REQUESTS_TOTAL,
            "endpoint" => name.to_owned(),
            "status" => status_label,
        )
        .increment(1);
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "endpoint" => name.to_owned(),
        )
        .record(started.elapsed().as_secs_f64());

        let response = outcome?;

        if let Some(hook) = endpoint.after_response() {
            hook(&response).await;
        }

        if (self.rate_limited_when)(&response) {
            self.trip_cooldown();
            warn!(
                endpoint = name,
                status = response.status,
                delay_ms = self.cooldown_delay.as_millis() as u64,
                "rate limit signaled; cooling down all endpoints"
            );
            metrics::counter!(telemetry::COOLDOWNS_TOTAL).increment(1);
            let _ = self.notices.send(RateLimitNotice {
                endpoint: name.to_owned(),
                status: response.status,
            });
        }

        if response.is_success() {
            Ok(response.body)
        } else {
            Err(BifrostError::UnsuccessfulResponse {
                status: response.status,
                body: response.body,
            })
        }
    }

    /// Call the named endpoint and parse the body as JSON.
    pub async fn call_json(&self, name: &str, args: Args) -> Result<serde_json::Value> {
        let body = self.call(name, args).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Subscribe to rate-limit notices.
    pub fn rate_limit_notices(&self) -> broadcast::Receiver<RateLimitNotice> {
        self.notices.subscribe()
    }

    /// Whether a fresh cache entry exists for the given call. False for
    /// unknown endpoints and endpoints without a cache.
    pub fn is_cached(&self, name: &str, args: &Args) -> bool {
        self.endpoints
            .get(name)
            .is_some_and(|endpoint| endpoint.is_cached(args))
    }

    /// Time until the named endpoint would admit this call, not
    /// counting the shared cooldown. Zero for unknown endpoints.
    pub fn time_until_next_admission(&self, name: &str, args: &Args) -> Duration {
        self.endpoints
            .get(name)
            .map(|endpoint| endpoint.time_to_next_admission(args))
            .unwrap_or(Duration::ZERO)
    }

    /// The configured minimum call interval of an endpoint.
    pub fn max_interval(&self, name: &str) -> Duration {
        self.endpoints
            .get(name)
            .map(|endpoint| endpoint.max_interval())
            .unwrap_or(Duration::ZERO)
    }

    /// The lifecycle signal hub of an endpoint's pipeline, for
    /// attaching before/after/delayed listeners.
    pub fn signals(&self, name: &str) -> Option<&Signals<Args, RawResponse>> {
        self.endpoints.get(name).map(|endpoint| endpoint.signals())
    }

    /// Remaining shared cooldown, zero when none is active.
    pub fn cooldown_remaining(&self) -> Duration {
        let until = *self
            .cooldown_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        until
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::ZERO)
    }

    async fn wait_for_cooldown(&self) {
        loop {
            let deadline = *self
                .cooldown_until
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            match deadline {
                Some(deadline) if deadline > Instant::now() => {
                    tokio::time::sleep_until(deadline).await;
                }
                _ => return,
            }
        }
    }

    /// Push the cooldown deadline to `now + delay`, never backwards.
    fn trip_cooldown(&self) {
        let mut until = self
            .cooldown_until
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let deadline = Instant::now() + self.cooldown_delay;
        if until.is_none_or(|current| current < deadline) {
            *until = Some(deadline);
        }
    }
}
