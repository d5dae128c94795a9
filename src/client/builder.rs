//! Builder for configuring dispatcher instances.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::dispatcher::{RateLimitSignal, RestClient};
use super::endpoint::EndpointBuilder;
use super::transport::{HttpTransport, RawResponse, Transport};
use crate::{BifrostError, Result};

/// Default cooldown after a rate-limit signal.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(5);

/// Builder for [`RestClient`] instances.
pub struct RestClientBuilder {
    endpoints: Vec<EndpointBuilder>,
    transport: Option<Arc<dyn Transport>>,
    cooldown_status: Option<u16>,
    cooldown_when: Option<RateLimitSignal>,
    cooldown_delay: Duration,
}

impl RestClientBuilder {
    pub fn new() -> Self {
        Self {
            endpoints: Vec::new(),
            transport: None,
            cooldown_status: None,
            cooldown_when: None,
            cooldown_delay: DEFAULT_COOLDOWN,
        }
    }

    /// Add an endpoint definition.
    pub fn endpoint(mut self, endpoint: EndpointBuilder) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Use a custom transport (tests, proxies, instrumentation).
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Treat responses with this status code as the provider's
    /// rate-limit-exceeded signal and cool down for `delay`. The status
    /// is also appended to every endpoint's retryable set.
    pub fn cooldown_on_status(mut self, status: u16, delay: Duration) -> Self {
        self.cooldown_status = Some(status);
        self.cooldown_delay = delay;
        self
    }

    /// Detect the rate-limit signal with a custom predicate over the
    /// raw response (e.g. a structured error code in the body).
    pub fn cooldown_when(
        mut self,
        predicate: impl Fn(&RawResponse) -> bool + Send + Sync + 'static,
        delay: Duration,
    ) -> Self {
        self.cooldown_when = Some(Arc::new(predicate));
        self.cooldown_delay = delay;
        self
    }

    /// Build the dispatcher, assembling every endpoint pipeline.
    pub fn build(self) -> Result<RestClient> {
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new()));

        let rate_limited_when: RateLimitSignal = match (self.cooldown_when, self.cooldown_status) {
            (Some(predicate), _) => predicate,
            (None, Some(status)) => Arc::new(move |response: &RawResponse| response.status == status),
            (None, None) => Arc::new(|_: &RawResponse| false),
        };

        let mut endpoints = HashMap::new();
        for endpoint in self.endpoints {
            let name = endpoint.name().to_owned();
            if endpoints.contains_key(&name) {
                return Err(BifrostError::Configuration(format!(
                    "duplicate endpoint name: {name}"
                )));
            }
            let built = endpoint.build(Arc::clone(&transport), self.cooldown_status);
            endpoints.insert(name, built);
        }

        Ok(RestClient::new(
            endpoints,
            rate_limited_when,
            self.cooldown_delay,
        ))
    }
}

impl Default for RestClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
