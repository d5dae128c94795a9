//! Telemetry metric name constants.
//!
//! Centralised metric names for bifrost operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `bifrost_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `endpoint` — logical endpoint name
//! - `status` — outcome: "ok" or "error"
//! - `gate` — which rate gate deferred an admission: "time" or "weight"

/// Total requests dispatched through a [`RestClient`](crate::RestClient).
///
/// Labels: `endpoint`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "bifrost_requests_total";

/// Request duration in seconds, measured around the whole pipeline
/// (gate waits and retries included).
///
/// Labels: `endpoint`.
pub const REQUEST_DURATION_SECONDS: &str = "bifrost_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
pub const RETRIES_TOTAL: &str = "bifrost_retries_total";

/// Total cache hits across cache decorators.
pub const CACHE_HITS_TOTAL: &str = "bifrost_cache_hits_total";

/// Total cache misses across cache decorators.
pub const CACHE_MISSES_TOTAL: &str = "bifrost_cache_misses_total";

/// Total deferred admission attempts at rate gates.
///
/// Labels: `gate` ("time" | "weight").
pub const RATE_DELAYS_TOTAL: &str = "bifrost_rate_delays_total";

/// Total dispatcher-wide cooldowns triggered by a rate-limit signal.
pub const COOLDOWNS_TOTAL: &str = "bifrost_cooldowns_total";
