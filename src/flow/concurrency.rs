//! Concurrency capping decorator.
//!
//! [`ConcurrencyLimited`] bounds the number of simultaneously in-flight
//! invocations of the wrapped operation with a counting semaphore.
//! Callers beyond the capacity suspend until a slot frees up; the slot
//! is released when the inner invocation finishes, on success or
//! failure alike.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use super::signal::{self, Signals};
use super::Operation;
use crate::{BifrostError, Result};

/// Decorator that caps in-flight invocations at a fixed capacity.
pub struct ConcurrencyLimited<A, T> {
    inner: Arc<dyn Operation<A, T>>,
    slots: Semaphore,
    capacity: usize,
    signals: Arc<Signals<A, T>>,
}

impl<A, T> ConcurrencyLimited<A, T>
where
    A: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    /// Wrap an operation with a concurrency cap of `capacity`.
    pub fn new(inner: Arc<dyn Operation<A, T>>, capacity: usize) -> Self {
        let signals = Arc::new(Signals::new());
        signal::forward(inner.signals(), &signals);

        Self {
            inner,
            slots: Semaphore::new(capacity),
            capacity,
            signals,
        }
    }

    /// The configured capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently free.
    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }
}

#[async_trait]
impl<A, T> Operation<A, T> for ConcurrencyLimited<A, T>
where
    A: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    async fn invoke(&self, args: A) -> Result<T> {
        let _slot = self
            .slots
            .acquire()
            .await
            .map_err(|_| BifrostError::Canceled)?;
        self.inner.invoke(args).await
    }

    fn signals(&self) -> &Signals<A, T> {
        &self.signals
    }
}
