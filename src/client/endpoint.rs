//! Endpoint definitions and pipeline assembly.
//!
//! An [`EndpointBuilder`] describes one logical endpoint: how to build
//! its URI from positional arguments, which headers and query
//! parameters to resolve (possibly asynchronously, e.g. request
//! signing), and the resilience policy — retry, cache, minimum
//! interval, weight. [`RestClientBuilder`](super::RestClientBuilder)
//! turns each definition into an immutable [`Endpoint`] at dispatcher
//! construction time.
//!
//! Pipeline order, innermost out:
//!
//! ```text
//! transport call → Retrying → Cached → TimeRateLimited → WeightRateLimited
//! ```
//!
//! Retry sits inside the gates so every physical attempt is itself
//! rate-governed, and the cache short-circuits everything below it. The
//! cache-presence predicate is wired into both gates as their bypass,
//! so a guaranteed hit never waits on a rate limit. URI building and
//! header resolution happen inside the leaf, which means each retry
//! re-resolves them — signing parameters stay fresh across attempts.

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use url::Url;

use super::args::Args;
use super::transport::{Method, RawResponse, Transport};
use crate::flow::retry::ErrorPredicate;
use crate::flow::signal::Signals;
use crate::flow::{
    Bypass, CacheTime, Cached, Call, Operation, RateBudget, Retrying, TimeRateLimited,
    WeightRateLimited,
};
use crate::{BifrostError, Result};

/// Builds the base URI from the positional arguments.
pub type UriBuilder = Arc<dyn Fn(&Args) -> String + Send + Sync>;
/// Resolves one query parameter, given the arguments and the URI built
/// so far (request signing needs the latter). May be asynchronous.
pub type QueryResolver =
    Arc<dyn Fn(&Args, &Url) -> BoxFuture<'static, Result<(String, String)>> + Send + Sync>;
/// Resolves one request header.
pub type HeaderResolver = Arc<dyn Fn() -> (String, String) + Send + Sync>;
/// Runs against every raw response before error handling, e.g. to
/// recompute a [`RateBudget`] ceiling from server-reported limits.
pub type ResponseHook = Arc<dyn Fn(&RawResponse) -> BoxFuture<'static, ()> + Send + Sync>;

/// Definition of one logical endpoint and its resilience policy.
pub struct EndpointBuilder {
    name: String,
    uri_builder: UriBuilder,
    method: Method,
    query_resolvers: Vec<QueryResolver>,
    header_resolvers: Vec<HeaderResolver>,
    max_interval: Duration,
    caching_time: Option<CacheTime>,
    retries: u32,
    retry_statuses: Vec<u16>,
    retry_on_error: Option<ErrorPredicate>,
    weight: Option<(u32, Arc<RateBudget>)>,
    weight_poll_interval: Option<Duration>,
    after_response: Option<ResponseHook>,
}

impl EndpointBuilder {
    /// Define an endpoint whose URI is built from the arguments.
    pub fn new(
        name: impl Into<String>,
        uri_builder: impl Fn(&Args) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            uri_builder: Arc::new(uri_builder),
            method: Method::GET,
            query_resolvers: Vec::new(),
            header_resolvers: Vec::new(),
            max_interval: Duration::ZERO,
            caching_time: None,
            retries: 0,
            retry_statuses: Vec::new(),
            retry_on_error: None,
            weight: None,
            weight_poll_interval: None,
            after_response: None,
        }
    }

    /// Define an endpoint with a fixed URI.
    pub fn fixed(name: impl Into<String>, uri: impl Into<String>) -> Self {
        let uri = uri.into();
        Self::new(name, move |_| uri.clone())
    }

    /// HTTP method (default: GET).
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Enforce a minimum interval between admitted calls.
    pub fn max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Cache results for the given duration.
    pub fn cache(mut self, ttl: Duration) -> Self {
        self.caching_time = Some(CacheTime::Ttl(ttl));
        self
    }

    /// Cache results forever (never expire).
    pub fn cache_forever(mut self) -> Self {
        self.caching_time = Some(CacheTime::Forever);
        self
    }

    /// Retry up to `retries` additional times when the response status
    /// is one of `statuses` or the failure is transient.
    pub fn retry(mut self, retries: u32, statuses: &[u16]) -> Self {
        self.retries = retries;
        self.retry_statuses = statuses.to_vec();
        self
    }

    /// Override the error predicate used by the retry decorator
    /// (default: [`BifrostError::is_transient`]).
    pub fn retry_on_error(
        mut self,
        predicate: impl Fn(&BifrostError) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.retry_on_error = Some(Arc::new(predicate));
        self
    }

    /// Charge `weight` units against a shared [`RateBudget`] per call.
    pub fn weight(mut self, weight: u32, budget: Arc<RateBudget>) -> Self {
        self.weight = Some((weight, budget));
        self
    }

    /// Override the weight gate's re-evaluation backoff.
    pub fn weight_poll_interval(mut self, interval: Duration) -> Self {
        self.weight_poll_interval = Some(interval);
        self
    }

    /// Append a resolved query parameter to every request URI.
    pub fn query_param(
        mut self,
        resolver: impl Fn(&Args, &Url) -> (String, String) + Send + Sync + 'static,
    ) -> Self {
        self.query_resolvers
            .push(Arc::new(move |args, uri| {
                let param = resolver(args, uri);
                async move { Ok(param) }.boxed()
            }));
        self
    }

    /// Async variant of [`query_param`](Self::query_param), for
    /// resolvers that need to await (e.g. signing against the URI
    /// built so far).
    pub fn query_param_async(
        mut self,
        resolver: impl Fn(&Args, &Url) -> BoxFuture<'static, Result<(String, String)>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.query_resolvers.push(Arc::new(resolver));
        self
    }

    /// Add a resolved header to every request.
    pub fn header(mut self, resolver: impl Fn() -> (String, String) + Send + Sync + 'static) -> Self {
        self.header_resolvers.push(Arc::new(resolver));
        self
    }

    /// Run a hook against every raw response, before error handling.
    pub fn after_response(
        mut self,
        hook: impl Fn(&RawResponse) -> BoxFuture<'static, ()> + Send + Sync + 'static,
    ) -> Self {
        self.after_response = Some(Arc::new(hook));
        self
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Assemble the decorator pipeline for this definition.
    ///
    /// `extra_retry_status` is the dispatcher's rate-limit status code,
    /// appended to the retryable set so a throttled response gets the
    /// same retry treatment as any other flagged status.
    pub(crate) fn build(
        self,
        transport: Arc<dyn Transport>,
        extra_retry_status: Option<u16>,
    ) -> Endpoint {
        let request = Arc::new(RequestSpec {
            method: self.method,
            uri_builder: self.uri_builder,
            query_resolvers: self.query_resolvers,
            header_resolvers: self.header_resolvers,
            transport,
        });

        let leaf = {
            let request = Arc::clone(&request);
            Call::new(move |args: Args| {
                let request = Arc::clone(&request);
                async move { request.perform(args).await }.boxed()
            })
        };
        let mut pipeline: Arc<dyn Operation<Args, RawResponse>> = Arc::new(leaf);

        if self.retries > 0 {
            let mut statuses = self.retry_statuses;
            if let Some(status) = extra_retry_status {
                if !statuses.contains(&status) {
                    statuses.push(status);
                }
            }
            let retry_on_result =
                Arc::new(move |response: &RawResponse| statuses.contains(&response.status));
            let retry_on_error = self
                .retry_on_error
                .unwrap_or_else(|| Arc::new(BifrostError::is_transient));
            pipeline = Arc::new(Retrying::new(
                pipeline,
                self.retries,
                retry_on_result,
                retry_on_error,
            ));
        }

        let cache = self.caching_time.map(|caching_time| {
            let cached = Arc::new(Cached::new(pipeline.clone(), caching_time));
            pipeline = cached.clone();
            cached
        });

        let bypass: Option<Bypass<Args>> = cache.as_ref().map(|cache| {
            let cache = Arc::clone(cache);
            Arc::new(move |args: &Args| cache.has(args)) as Bypass<Args>
        });

        let time_gate = (self.max_interval > Duration::ZERO).then(|| {
            let gate = Arc::new(match &bypass {
                Some(bypass) => TimeRateLimited::with_bypass(
                    pipeline.clone(),
                    self.max_interval,
                    Arc::clone(bypass),
                ),
                None => TimeRateLimited::new(pipeline.clone(), self.max_interval),
            });
            pipeline = gate.clone();
            gate
        });

        let weight_gate = self.weight.map(|(weight, budget)| {
            let mut gate = match &bypass {
                Some(bypass) => WeightRateLimited::with_bypass(
                    pipeline.clone(),
                    weight,
                    budget,
                    Arc::clone(bypass),
                ),
                None => WeightRateLimited::new(pipeline.clone(), weight, budget),
            };
            if let Some(interval) = self.weight_poll_interval {
                gate = gate.poll_interval(interval);
            }
            let gate = Arc::new(gate);
            pipeline = gate.clone();
            gate
        });

        Endpoint {
            pipeline,
            cache,
            time_gate,
            weight_gate,
            after_response: self.after_response,
            max_interval: self.max_interval,
        }
    }
}

/// Everything the leaf operation needs to send one request.
struct RequestSpec {
    method: Method,
    uri_builder: UriBuilder,
    query_resolvers: Vec<QueryResolver>,
    header_resolvers: Vec<HeaderResolver>,
    transport: Arc<dyn Transport>,
}

impl RequestSpec {
    async fn perform(&self, args: Args) -> Result<RawResponse> {
        let uri = self.build_uri(&args).await?;
        let headers: Vec<(String, String)> = self
            .header_resolvers
            .iter()
            .map(|resolver| resolver())
            .collect();
        self.transport
            .send(self.method.clone(), &uri, &headers)
            .await
    }

    async fn build_uri(&self, args: &Args) -> Result<String> {
        let mut uri = Url::parse(&(self.uri_builder)(args))
            .map_err(|err| BifrostError::Configuration(format!("invalid endpoint URI: {err}")))?;
        for resolver in &self.query_resolvers {
            let (name, value) = resolver(args, &uri).await?;
            uri.query_pairs_mut().append_pair(&name, &value);
        }
        Ok(uri.into())
    }
}

/// One assembled endpoint pipeline with handles into its decorators.
pub(crate) struct Endpoint {
    pipeline: Arc<dyn Operation<Args, RawResponse>>,
    cache: Option<Arc<Cached<Args, RawResponse>>>,
    time_gate: Option<Arc<TimeRateLimited<Args, RawResponse>>>,
    weight_gate: Option<Arc<WeightRateLimited<Args, RawResponse>>>,
    after_response: Option<ResponseHook>,
    max_interval: Duration,
}

impl Endpoint {
    pub(crate) async fn execute(&self, args: Args) -> Result<RawResponse> {
        self.pipeline.invoke(args).await
    }

    pub(crate) fn is_cached(&self, args: &Args) -> bool {
        self.cache.as_ref().is_some_and(|cache| cache.has(args))
    }

    /// Time until the next call would be admitted; the weight gate is
    /// consulted first, then the time gate.
    pub(crate) fn time_to_next_admission(&self, args: &Args) -> Duration {
        if let Some(gate) = &self.weight_gate {
            let delay = gate.time_to_next_admission(args);
            if !delay.is_zero() {
                return delay;
            }
        }
        self.time_gate
            .as_ref()
            .map(|gate| gate.time_to_next_admission(args))
            .unwrap_or(Duration::ZERO)
    }

    pub(crate) fn after_response(&self) -> Option<&ResponseHook> {
        self.after_response.as_ref()
    }

    pub(crate) fn max_interval(&self) -> Duration {
        self.max_interval
    }

    pub(crate) fn signals(&self) -> &Signals<Args, RawResponse> {
        self.pipeline.signals()
    }
}
