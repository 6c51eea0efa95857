//! # Runtime events emitted by the orchestrator, batch runner, and trackers.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **One-time batch events**: per-task and per-batch startup flow
//! - **Reactive pipeline events**: watch/execute and trigger/run transitions
//! - **Orchestration events**: retry, stale-completion discard, status changes
//! - **Subscriber plumbing**: overflow and panic isolation
//!
//! The [`Event`] struct carries additional metadata such as timestamps, task
//! name, tracker index, generation, reasons, and hold delays.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.
//!
//! ## Example
//! ```rust
//! use bootvisor::{Event, EventKind};
//!
//! let ev = Event::now(EventKind::ExecuteFailed)
//!     .with_task("profile")
//!     .with_index(0)
//!     .with_generation(3)
//!     .with_reason("boom");
//!
//! assert_eq!(ev.kind, EventKind::ExecuteFailed);
//! assert_eq!(ev.task.as_deref(), Some("profile"));
//! assert_eq!(ev.generation, Some(3));
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets: `task` (subscriber name), `reason` (panic message).
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `task` (subscriber name), `reason` ("full" / "closed").
    SubscriberOverflow,

    // === One-time batch events ===
    /// A one-time task body is starting.
    ///
    /// Sets: `task`, `index`.
    OneTimeStarting,

    /// A one-time task body completed successfully.
    ///
    /// Sets: `task`, `index`.
    OneTimeStopped,

    /// A one-time task body failed; the batch fails with it.
    ///
    /// Sets: `task`, `index` (absent for parallel-mode panics), `reason`.
    OneTimeFailed,

    /// All tasks finished early; the batch is holding for the remainder of
    /// the minimum duration.
    ///
    /// Sets: `delay_ms`.
    BatchHold,

    /// The one-time batch settled Ready (minimum duration satisfied).
    BatchReady,

    /// The one-time batch settled Error (reported without the duration floor).
    ///
    /// Sets: `reason`.
    BatchFailed,

    // === Reactive pipeline events ===
    /// A watch phase is (re-)evaluating.
    ///
    /// Sets: `task`, `index`, `generation`.
    WatchEvaluating,

    /// A watch phase produced a value.
    ///
    /// Sets: `task`, `index`, `generation`; `reason` is `"unchanged"` when
    /// the value equals the previous one and execute is not retriggered.
    WatchSettled,

    /// A watch phase failed.
    ///
    /// Sets: `task`, `index`, `generation`, `reason`.
    WatchFailed,

    /// An execute phase is starting for a fresh watch value.
    ///
    /// Sets: `task`, `index`, `generation`.
    ExecuteStarting,

    /// An execute phase consumed its value successfully.
    ///
    /// Sets: `task`, `index`, `generation`.
    ExecuteStopped,

    /// An execute phase failed.
    ///
    /// Sets: `task`, `index`, `generation`, `reason`.
    ExecuteFailed,

    /// A trigger observation is (re-)evaluating (trigger/run shape).
    ///
    /// Sets: `task`, `index`, `generation`.
    TriggerEvaluating,

    /// A run body re-executes silently because one of its own dependencies
    /// changed; the aggregate stays out of Loading.
    ///
    /// Sets: `task`, `index`, `generation`.
    BackgroundRefresh,

    // === Orchestration events ===
    /// A retry was requested; every tracker resets and the batch re-runs if
    /// it had failed.
    RetryRequested,

    /// A completion carrying a stale generation was discarded, never applied.
    ///
    /// Sets: `index` (absent for the batch), `generation` (the stale one).
    StaleDropped,

    /// The readiness aggregate transitioned.
    ///
    /// Sets: `reason` (`"loading"`, `"ready"`, or `"error"`).
    StatusChanged,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the task or subscriber, if applicable.
    pub task: Option<Arc<str>>,
    /// Position of the reactive task in the configured list.
    pub index: Option<usize>,
    /// Generation of the tracker incarnation that produced the event.
    pub generation: Option<u64>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Remaining minimum-duration hold in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Set when the originating task opted out of verbose logging.
    pub quiet: bool,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next
    /// sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            task: None,
            index: None,
            generation: None,
            reason: None,
            delay_ms: None,
            quiet: false,
        }
    }

    /// Attaches a task or subscriber name.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a reactive task index.
    #[inline]
    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }

    /// Attaches a tracker generation.
    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches a hold delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        let ms = d.as_millis().min(u128::from(u32::MAX)) as u32;
        self.delay_ms = Some(ms);
        self
    }

    /// Marks the event as originating from a quiet task.
    #[inline]
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::now(EventKind::SubscriberOverflow)
            .with_task(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::now(EventKind::SubscriberPanicked)
            .with_task(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}
