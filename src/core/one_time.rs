//! # One-time batch runner.
//!
//! Executes the configured list of one-shot startup tasks, sequentially or in
//! parallel, enforcing the minimum-display-duration floor, and publishes
//! lifecycle events to the [`Bus`].
//!
//! ## Event flow
//! ```text
//! Sequential:
//!   OneTimeStarting(0) → body → OneTimeStopped(0)
//!   OneTimeStarting(1) → body → OneTimeFailed(1) ─► BatchFailed (stop)
//!
//! Parallel:
//!   OneTimeStarting(0..N) up front (all bodies spawned before any await)
//!   completions in finish order → OneTimeStopped / first OneTimeFailed
//!
//! Success:
//!   [BatchHold(remaining)] → sleep → BatchReady
//! Failure:
//!   BatchFailed immediately — the duration floor applies on success only
//! ```
//!
//! ## Rules
//! - Sequential: task *i+1* never starts before task *i* returned Ok;
//!   the first failure aborts the batch.
//! - Parallel: fail-fast-but-continue — the first observed failure resolves
//!   the batch, remaining join handles are dropped, and already-started
//!   bodies keep running detached; their results are not awaited further.
//! - Settle-once: a Ready outcome is cached; re-invoking [`OneTimeRunner::run`]
//!   returns it without re-running bodies. [`OneTimeRunner::reset`] (retry
//!   path) clears the cache.
//! - A panicking body is caught and converted into a
//!   [`FaultKind::OneTimeTask`] fault; no fault is silently dropped.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use tokio::sync::Mutex;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::config::ExecutionMode;
use crate::error::{ErrorInfo, FaultKind, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{TaskContext, TaskRef};

/// Runs the one-time task batch with a minimum-duration floor and a
/// settle-once cache.
pub(crate) struct OneTimeRunner {
    tasks: Vec<TaskRef>,
    mode: ExecutionMode,
    minimum: Duration,
    bus: Bus,
    outcome: Mutex<Option<Result<(), ErrorInfo>>>,
}

impl OneTimeRunner {
    pub(crate) fn new(tasks: Vec<TaskRef>, mode: ExecutionMode, minimum: Duration, bus: Bus) -> Self {
        Self {
            tasks,
            mode,
            minimum,
            bus,
            outcome: Mutex::new(None),
        }
    }

    /// Runs the batch, or returns the cached Ready outcome.
    ///
    /// An empty task list with a zero floor resolves Ready without entering
    /// any timer.
    pub(crate) async fn run(&self, cancel: CancellationToken) -> Result<(), ErrorInfo> {
        let mut cached = self.outcome.lock().await;
        if let Some(Ok(())) = cached.as_ref() {
            return Ok(());
        }

        let started = Instant::now();
        let result = match self.mode {
            ExecutionMode::Sequential => self.run_sequential(&cancel).await,
            ExecutionMode::Parallel => self.run_parallel(&cancel).await,
        };

        let result = match result {
            Ok(()) => {
                self.hold_minimum(started).await;
                self.bus.publish(Event::now(EventKind::BatchReady));
                Ok(())
            }
            Err(info) => {
                // Open question A: the floor applies to the success path only.
                self.bus
                    .publish(Event::now(EventKind::BatchFailed).with_reason(info.render()));
                Err(info)
            }
        };
        *cached = Some(result.clone());
        result
    }

    /// Clears the settle-once cache so a retry re-runs every body.
    pub(crate) async fn reset(&self) {
        *self.outcome.lock().await = None;
    }

    async fn hold_minimum(&self, started: Instant) {
        let elapsed = started.elapsed();
        if elapsed < self.minimum {
            let remaining = self.minimum - elapsed;
            self.bus
                .publish(Event::now(EventKind::BatchHold).with_delay(remaining));
            time::sleep(remaining).await;
        }
    }

    async fn run_sequential(&self, cancel: &CancellationToken) -> Result<(), ErrorInfo> {
        for (index, task) in self.tasks.iter().enumerate() {
            self.publish_starting(task.name(), index);
            let ctx = TaskContext::new(cancel.child_token());
            let outcome = AssertUnwindSafe(task.spawn(ctx.clone())).catch_unwind().await;
            ctx.dispose();
            match outcome {
                Ok(Ok(())) => self.publish_stopped(task.name(), index),
                Ok(Err(err)) => {
                    let info = ErrorInfo::capture(FaultKind::OneTimeTask, &err)
                        .with_task(task.name())
                        .with_index(index);
                    self.publish_failed(task.name(), index, &info);
                    return Err(info);
                }
                Err(payload) => {
                    let info = ErrorInfo::from_panic(FaultKind::OneTimeTask, payload)
                        .with_task(task.name())
                        .with_index(index);
                    self.publish_failed(task.name(), index, &info);
                    return Err(info);
                }
            }
        }
        Ok(())
    }

    async fn run_parallel(&self, cancel: &CancellationToken) -> Result<(), ErrorInfo> {
        let mut pending = FuturesUnordered::new();
        for (index, task) in self.tasks.iter().enumerate() {
            self.publish_starting(task.name(), index);
            let ctx = TaskContext::new(cancel.child_token());
            let task = Arc::clone(task);
            pending.push(tokio::spawn(async move {
                let result = task.spawn(ctx.clone()).await;
                ctx.dispose();
                (index, result)
            }));
        }

        while let Some(joined) = pending.next().await {
            match joined {
                Ok((index, Ok(()))) => {
                    self.publish_stopped(self.tasks[index].name(), index);
                }
                Ok((index, Err(err))) => {
                    let name = self.tasks[index].name();
                    let info = ErrorInfo::capture(FaultKind::OneTimeTask, &err)
                        .with_task(name)
                        .with_index(index);
                    self.publish_failed(name, index, &info);
                    // Remaining handles drop here; started siblings keep
                    // running detached (fail-fast-but-continue).
                    return Err(info);
                }
                Err(join_err) => {
                    let info = if join_err.is_panic() {
                        ErrorInfo::from_panic(FaultKind::OneTimeTask, join_err.into_panic())
                    } else {
                        ErrorInfo::capture(FaultKind::OneTimeTask, &TaskError::Canceled)
                    };
                    self.bus.publish(
                        Event::now(EventKind::OneTimeFailed).with_reason(info.render()),
                    );
                    return Err(info);
                }
            }
        }
        Ok(())
    }

    fn publish_starting(&self, name: &str, index: usize) {
        self.bus.publish(
            Event::now(EventKind::OneTimeStarting)
                .with_task(name)
                .with_index(index),
        );
    }

    fn publish_stopped(&self, name: &str, index: usize) {
        self.bus.publish(
            Event::now(EventKind::OneTimeStopped)
                .with_task(name)
                .with_index(index),
        );
    }

    fn publish_failed(&self, name: &str, index: usize, info: &ErrorInfo) {
        self.bus.publish(
            Event::now(EventKind::OneTimeFailed)
                .with_task(name)
                .with_index(index)
                .with_reason(info.render()),
        );
    }
}
