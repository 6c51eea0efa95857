//! # Non-blocking event fan-out to multiple subscribers.
//!
//! Provides [`SubscriberSet`] — distributes orchestration events to multiple
//! subscribers concurrently without ever blocking the core loop or the
//! tracker incarnations that publish them.
//!
//! ## Architecture
//! ```text
//! emit_arc(event)
//!     │
//!     ├──► [queue 1] ──► worker 1 ──► subscriber1.on_event()
//!     │    (bounded)         └──────► panic → SubscriberPanicked
//!     └──► [queue N] ──► worker N ──► subscriberN.on_event()
//!          (bounded)
//! ```
//!
//! ## Rules
//! - **No cross-subscriber ordering**: subscriber A may process event N while
//!   B processes N+5; per-subscriber order is FIFO.
//! - **Overflow**: the event is dropped for that subscriber only and a
//!   `SubscriberOverflow` is published (unless the dropped event was itself
//!   an overflow report).
//! - **Isolation**: a slow or panicking subscriber doesn't affect others;
//!   worker panics are caught and surfaced as `SubscriberPanicked`.
//!
//! `AssertUnwindSafe` is used for panic isolation, which can leave a
//! subscriber's own shared state inconsistent if it panics mid-update.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

/// Fan-out coordinator for multiple event subscribers.
///
/// Owns one bounded queue and one worker task per subscriber. Delivery is
/// `try_send`: the publisher never waits, subscribers that fall behind lose
/// events individually.
pub struct SubscriberSet {
    senders: Vec<(&'static str, mpsc::Sender<Arc<Event>>)>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Creates the set and spawns one worker per subscriber.
    ///
    /// Queue capacity comes from [`Subscribe::queue_capacity`], clamped to a
    /// minimum of 1. Workers run until their queue closes.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let mut senders = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let (tx, rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            senders.push((sub.name(), tx));
            workers.push(tokio::spawn(worker(sub, rx, bus.clone())));
        }
        Self {
            senders,
            workers,
            bus,
        }
    }

    /// Delivers an event to every subscriber queue without blocking.
    ///
    /// A full or closed queue drops the event for that subscriber and reports
    /// it; overflow reports themselves are never re-reported, which keeps a
    /// saturated set from feeding on its own warnings.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let is_overflow = matches!(event.kind, EventKind::SubscriberOverflow);

        for (name, sender) in &self.senders {
            let reason = match sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow {
                self.bus.publish(Event::subscriber_overflow(name, reason));
            }
        }
    }

    /// Closes every queue and waits for the workers to drain.
    pub async fn shutdown(self) {
        drop(self.senders);

        for handle in self.workers {
            let _ = handle.await;
        }
    }
}

/// Per-subscriber delivery loop with panic isolation.
async fn worker(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
    while let Some(ev) = rx.recv().await {
        let fut = sub.on_event(ev.as_ref());
        if let Err(payload) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
            bus.publish(Event::subscriber_panicked(sub.name(), panic_text(&payload)));
        }
    }
}

fn panic_text(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
