//! # Observable value cells consumed by reactive tasks.
//!
//! [`Signal`] is the concrete form of the abstract "a value that can change
//! and be asynchronously observed" capability: a current value plus a change
//! notification. It is deliberately minimal; bootvisor does not implement
//! derived signals or dependency graphs.
//!
//! ## Mechanics
//! Each signal pairs its value with a monotonically bumped version counter
//! carried on a `tokio::sync::watch` channel. A task context that watches the
//! signal holds a version receiver; any [`Signal::set`] (even with an equal
//! value) bumps the version and wakes every waiting tracker, which then
//! re-evaluates its watch phase. Value-equality checks happen in the tracker,
//! not here.
//!
//! ## Example
//! ```
//! use bootvisor::Signal;
//!
//! let counter = Signal::new(0u64);
//! assert_eq!(counter.get(), 0);
//! counter.set(1);
//! counter.update(|v| *v += 1);
//! assert_eq!(counter.get(), 2);
//! ```

use std::fmt;
use std::sync::{Arc, RwLock};

use tokio::sync::watch;

struct SignalInner<T> {
    value: RwLock<T>,
    version: watch::Sender<u64>,
}

/// Observable value cell with change notification.
///
/// Cheap to clone; clones share the same value and version channel. Writers
/// and readers may live on any task.
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Signal<T> {
    /// Creates a signal holding `initial`.
    pub fn new(initial: T) -> Self {
        let (version, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(SignalInner {
                value: RwLock::new(initial),
                version,
            }),
        }
    }

    /// Returns a clone of the current value.
    pub fn get(&self) -> T {
        self.inner
            .value
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replaces the value and notifies all watchers.
    ///
    /// Notification is unconditional; watchers decide whether the new value
    /// is actually different.
    pub fn set(&self, value: T) {
        {
            let mut guard = self
                .inner
                .value
                .write()
                .unwrap_or_else(|e| e.into_inner());
            *guard = value;
        }
        self.bump();
    }

    /// Mutates the value in place and notifies all watchers.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        {
            let mut guard = self
                .inner
                .value
                .write()
                .unwrap_or_else(|e| e.into_inner());
            f(&mut guard);
        }
        self.bump();
    }

    fn bump(&self) {
        self.inner.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    /// Subscribes to version bumps. The current version counts as seen; the
    /// receiver fires only for subsequent [`Signal::set`]/[`Signal::update`].
    pub(crate) fn subscribe_version(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.value.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("Signal").field("value", &*guard).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn version_bumps_on_every_set() {
        let sig = Signal::new(5u32);
        let mut rx = sig.subscribe_version();

        sig.set(5); // equal value still notifies
        rx.changed().await.unwrap();
        assert_eq!(sig.get(), 5);

        sig.update(|v| *v = 7);
        rx.changed().await.unwrap();
        assert_eq!(sig.get(), 7);
    }

    #[tokio::test]
    async fn fresh_receiver_sees_current_as_seen() {
        let sig = Signal::new(1u32);
        sig.set(2);
        let mut rx = sig.subscribe_version();
        // Nothing pending until the next set.
        assert!(!rx.has_changed().unwrap());
        sig.set(3);
        assert!(rx.has_changed().unwrap());
    }
}
