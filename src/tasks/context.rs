//! # Explicit execution context passed into every task body.
//!
//! [`TaskContext`] replaces any ambient/global signal registry with an
//! explicit object: it exposes `read`, `watch`, and scoped cleanup
//! registration (`on_dispose`), plus cooperative cancellation.
//!
//! ## Subscription ownership
//! Every `watch` call records a version receiver inside the context. After a
//! phase completes, the tracker that created the context takes those
//! receivers ([`TaskContext::take_watched`]) as the phase's re-run set. The
//! receivers are owned by exactly one tracker incarnation and dropped before
//! it is replaced — leaked subscriptions are how duplicate/late callbacks
//! happen, so they never outlive their context's owner.
//!
//! ## Cleanup
//! `on_dispose` closures run in reverse registration order when the phase is
//! re-evaluated or the tracker is torn down.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::signal::Signal;

type Cleanup = Box<dyn FnOnce() + Send>;

struct ContextInner {
    cancel: CancellationToken,
    watched: Mutex<Vec<watch::Receiver<u64>>>,
    cleanups: Mutex<Vec<Cleanup>>,
}

/// Execution context handed to one-time task bodies and to every watch,
/// execute, trigger, and run phase.
///
/// Cheap to clone; clones share the same subscription and cleanup registries.
#[derive(Clone)]
pub struct TaskContext {
    inner: Arc<ContextInner>,
}

impl TaskContext {
    pub(crate) fn new(cancel: CancellationToken) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                cancel,
                watched: Mutex::new(Vec::new()),
                cleanups: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Reads the signal's current value without subscribing to changes.
    pub fn read<T: Clone + Send + Sync + 'static>(&self, signal: &Signal<T>) -> T {
        signal.get()
    }

    /// Reads the signal's current value and subscribes the enclosing phase to
    /// its changes: any later write to the signal re-evaluates the phase.
    pub fn watch<T: Clone + Send + Sync + 'static>(&self, signal: &Signal<T>) -> T {
        let rx = signal.subscribe_version();
        self.inner
            .watched
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(rx);
        signal.get()
    }

    /// Registers a cleanup to run when this context is disposed (phase
    /// re-evaluation, retry, or teardown). Cleanups run in reverse order.
    pub fn on_dispose(&self, f: impl FnOnce() + Send + 'static) {
        self.inner
            .cleanups
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(f));
    }

    /// True once the owning orchestrator is shutting down or this tracker
    /// incarnation was invalidated by a retry.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    /// Clone of the cancellation token, for use in `select!`-style waits.
    pub fn cancel_token(&self) -> CancellationToken {
        self.inner.cancel.clone()
    }

    /// Takes the receivers recorded by `watch` calls; they become the
    /// caller-owned re-run set for the phase that just completed.
    pub(crate) fn take_watched(&self) -> Vec<watch::Receiver<u64>> {
        std::mem::take(
            &mut *self
                .inner
                .watched
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        )
    }

    /// Runs registered cleanups in reverse order. Idempotent.
    pub(crate) fn dispose(&self) {
        let cleanups = std::mem::take(
            &mut *self
                .inner
                .cleanups
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        );
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn watch_records_a_receiver_per_call() {
        let ctx = TaskContext::new(CancellationToken::new());
        let a = Signal::new(1u32);
        let b = Signal::new("x".to_string());

        assert_eq!(ctx.watch(&a), 1);
        assert_eq!(ctx.watch(&b), "x");
        assert_eq!(ctx.read(&a), 1);

        assert_eq!(ctx.take_watched().len(), 2);
        // read() registered nothing.
        assert!(ctx.take_watched().is_empty());
    }

    #[tokio::test]
    async fn dispose_runs_cleanups_in_reverse() {
        static ORDER: AtomicUsize = AtomicUsize::new(0);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let ctx = TaskContext::new(CancellationToken::new());
        {
            let first = first.clone();
            ctx.on_dispose(move || {
                first.store(ORDER.fetch_add(1, Ordering::SeqCst) + 1, Ordering::SeqCst)
            });
        }
        {
            let second = second.clone();
            ctx.on_dispose(move || {
                second.store(ORDER.fetch_add(1, Ordering::SeqCst) + 1, Ordering::SeqCst)
            });
        }

        ctx.dispose();
        ctx.dispose(); // idempotent

        // Registered second, ran first.
        assert!(second.load(Ordering::SeqCst) < first.load(Ordering::SeqCst));
    }
}
