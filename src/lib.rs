//! Bifrost - composable resilience pipeline for outbound HTTP APIs
//!
//! This crate wraps arbitrary asynchronous operations in a small set of
//! stackable decorators — result caching, minimum-interval and
//! weight-budget rate limiting, retry-on-predicate, concurrency capping
//! — and offers a thin dispatcher that maps logical endpoint names to
//! configured pipelines, with a shared cooldown when the provider
//! signals that its rate limit was exceeded.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use bifrost::{Arg, EndpointBuilder, RateBudget, RestClient};
//!
//! #[tokio::main]
//! async fn main() -> bifrost::Result<()> {
//!     let budget = Arc::new(RateBudget::new(1_200));
//!
//!     let client = RestClient::builder()
//!         .cooldown_on_status(419, Duration::from_secs(5))
//!         .endpoint(
//!             EndpointBuilder::fixed("exchange-info", "https://api.example.com/v1/exchangeInfo")
//!                 .max_interval(Duration::from_secs(5))
//!                 .cache(Duration::from_secs(86_400))
//!                 .retry(3, &[500, 520])
//!                 .weight(10, Arc::clone(&budget)),
//!         )
//!         .endpoint(
//!             EndpointBuilder::new("trades", |args| {
//!                 format!("https://api.example.com/v1/trades?symbol={}", args[0])
//!             })
//!             .max_interval(Duration::from_secs(3))
//!             .cache(Duration::from_secs(2))
//!             .retry(3, &[500, 520])
//!             .weight(1, Arc::clone(&budget)),
//!         )
//!         .build()?;
//!
//!     let body = client.call("trades", vec![Arg::from("BTCUSDT")]).await?;
//!     println!("{body}");
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod error;
pub mod flow;
pub mod telemetry;

// Re-export main types at crate root
pub use client::{
    Arg, Args, EndpointBuilder, HttpTransport, Method, RateLimitNotice, RateLimitSignal,
    RawResponse, RestClient, RestClientBuilder, Transport,
};
pub use error::{BifrostError, Result};
pub use flow::{
    Bypass, CacheTime, Cached, Call, ConcurrencyLimited, Operation, RateBudget, Retrying, Signals,
    TimeRateLimited, WeightRateLimited,
};
