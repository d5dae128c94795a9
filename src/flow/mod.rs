//! Composable resilience decorators over asynchronous operations.
//!
//! The building block is the [`Operation`] trait: an async unit of work
//! taking an argument value and producing a result, with observable
//! lifecycle [`Signals`]. Decorators both implement `Operation` and wrap
//! one, forming a singly-linked chain where each node owns the one
//! inside it:
//!
//! ```text
//! WeightRateLimited → TimeRateLimited → Cached → Retrying → Call (leaf)
//! ```
//!
//! Each decorator re-emits the wrapped operation's signals to its own
//! subscribers, so instrumentation attached at any depth observes the
//! innermost execution. The argument type `A` is fixed per pipeline at
//! construction time; the client layer instantiates it with
//! [`Args`](crate::client::Args).

pub mod cache;
pub mod concurrency;
pub mod retry;
pub mod signal;
pub mod time_limit;
pub mod weight_limit;

pub use cache::{CacheTime, Cached};
pub use concurrency::ConcurrencyLimited;
pub use retry::{ErrorPredicate, ResultPredicate, Retrying};
pub use signal::Signals;
pub use time_limit::TimeRateLimited;
pub use weight_limit::{RateBudget, WeightRateLimited};

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

use crate::Result;

/// Predicate letting a rate gate skip its wait for specific arguments,
/// typically "a fresh cache entry exists upstream".
pub type Bypass<A> = Arc<dyn Fn(&A) -> bool + Send + Sync>;

/// An asynchronous unit of work with observable lifecycle signals.
///
/// Decorators hold their wrapped operation as `Arc<dyn Operation<A, T>>`
/// and may fail with the inner operation's error, propagated unchanged
/// unless the decorator's own contract says otherwise (only
/// [`Retrying`] intercepts failures).
#[async_trait]
pub trait Operation<A, T>: Send + Sync
where
    A: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Run the operation for the given arguments.
    async fn invoke(&self, args: A) -> Result<T>;

    /// The operation's signal hub.
    fn signals(&self) -> &Signals<A, T>;
}

/// Leaf operation wrapping an async closure.
///
/// Emits *before-execution* right before the closure runs and
/// *after-execution* once it returns (with `None` on failure). All
/// pipeline signals originate here and propagate outward through the
/// decorators.
pub struct Call<A, T> {
    func: Box<dyn Fn(A) -> BoxFuture<'static, Result<T>> + Send + Sync>,
    signals: Signals<A, T>,
}

impl<A, T> Call<A, T> {
    pub fn new(func: impl Fn(A) -> BoxFuture<'static, Result<T>> + Send + Sync + 'static) -> Self {
        Self {
            func: Box::new(func),
            signals: Signals::new(),
        }
    }
}

#[async_trait]
impl<A, T> Operation<A, T> for Call<A, T>
where
    A: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    async fn invoke(&self, args: A) -> Result<T> {
        self.signals.emit_before(&args);
        let result = (self.func)(args).await;
        self.signals.emit_after(result.as_ref().ok());
        result
    }

    fn signals(&self) -> &Signals<A, T> {
        &self.signals
    }
}
