//! Lifecycle signals emitted by operations.
//!
//! Every [`Operation`](super::Operation) exposes three signals:
//!
//! - *before-execution* — fires immediately before the innermost unit of
//!   work is attempted (a cache hit never fires it).
//! - *after-execution* — fires once the work returns, even on failure
//!   (the result is `None` then).
//! - *execution-delayed* — fires each time a rate gate defers an
//!   admission attempt.
//!
//! Decorators re-emit the wrapped operation's signals to their own
//! subscribers, so signals stay observable through arbitrary stacking
//! depth. There is no global event bus; each hub belongs to exactly one
//! operation and listeners are registered at construction time.

use std::sync::{Mutex, PoisonError, RwLock};

use tokio::sync::oneshot;

type Listener<E> = Box<dyn Fn(&E) + Send + Sync>;
type AfterListener<T> = Box<dyn Fn(Option<&T>) + Send + Sync>;

/// Signal hub for one operation instance.
///
/// Listeners registered through `on_*` stay subscribed for the lifetime
/// of the hub. [`before_watch`](Signals::before_watch) hands out one-shot
/// waiters that resolve at the next before-execution emission — rate
/// gates use this to learn when admission is confirmed.
pub struct Signals<A, T> {
    before: RwLock<Vec<Listener<A>>>,
    after: RwLock<Vec<AfterListener<T>>>,
    delayed: RwLock<Vec<Listener<A>>>,
    before_waiters: Mutex<Vec<oneshot::Sender<()>>>,
}

impl<A, T> Signals<A, T> {
    pub fn new() -> Self {
        Self {
            before: RwLock::new(Vec::new()),
            after: RwLock::new(Vec::new()),
            delayed: RwLock::new(Vec::new()),
            before_waiters: Mutex::new(Vec::new()),
        }
    }

    /// Subscribe to before-execution.
    pub fn on_before(&self, listener: impl Fn(&A) + Send + Sync + 'static) {
        self.before
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    /// Subscribe to after-execution. The result is `None` on failure.
    pub fn on_after(&self, listener: impl Fn(Option<&T>) + Send + Sync + 'static) {
        self.after
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    /// Subscribe to execution-delayed.
    pub fn on_delayed(&self, listener: impl Fn(&A) + Send + Sync + 'static) {
        self.delayed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(listener));
    }

    /// One-shot waiter resolved at the next before-execution emission.
    ///
    /// If the operation completes without ever executing (cache hit),
    /// the waiter is left pending until its receiver is dropped.
    /// Closed senders are pruned on every registration, so a hub whose
    /// operation rarely executes does not accumulate stale waiters.
    pub fn before_watch(&self) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        let mut waiters = self
            .before_waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        waiters.retain(|waiter| !waiter.is_closed());
        waiters.push(tx);
        rx
    }

    pub(crate) fn emit_before(&self, args: &A) {
        for listener in self
            .before
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            listener(args);
        }
        let waiters = std::mem::take(
            &mut *self
                .before_waiters
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );
        for waiter in waiters {
            let _ = waiter.send(());
        }
    }

    pub(crate) fn emit_after(&self, result: Option<&T>) {
        for listener in self
            .after
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            listener(result);
        }
    }

    pub(crate) fn emit_delayed(&self, args: &A) {
        for listener in self
            .delayed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
        {
            listener(args);
        }
    }
}

impl<A, T> Default for Signals<A, T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Re-emit everything `inner` fires through `outer`.
///
/// Called once per decorator at construction time, keeping the whole
/// chain observable from its outermost node.
pub(crate) fn forward<A, T>(inner: &Signals<A, T>, outer: &std::sync::Arc<Signals<A, T>>)
where
    A: Send + Sync + 'static,
    T: Send + Sync + 'static,
{
    let hub = std::sync::Arc::clone(outer);
    inner.on_before(move |args| hub.emit_before(args));
    let hub = std::sync::Arc::clone(outer);
    inner.on_after(move |result| hub.emit_after(result));
    let hub = std::sync::Arc::clone(outer);
    inner.on_delayed(move |args| hub.emit_delayed(args));
}
