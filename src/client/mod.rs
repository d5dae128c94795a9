//! Endpoint dispatcher layer.
//!
//! Maps logical endpoint names to configured resilience pipelines over
//! one shared transport, and watches every response for the provider's
//! rate-limit-exceeded signal.

mod args;
mod builder;
mod dispatcher;
mod endpoint;
mod transport;

pub use args::{Arg, Args};
pub use builder::RestClientBuilder;
pub use dispatcher::{RateLimitNotice, RateLimitSignal, RestClient};
pub use endpoint::{
    EndpointBuilder, HeaderResolver, QueryResolver, ResponseHook, UriBuilder,
};
pub use transport::{HttpTransport, Method, RawResponse, Transport};
