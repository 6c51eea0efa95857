//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! This is primarily useful for development, debugging, and examples.
//!
//! ## Output format
//! ```text
//! [one-time:starting] task=db-migrate index=0
//! [one-time:failed] task=db-migrate index=0 err="connection refused"
//! [batch:hold] delay=230ms
//! [batch:ready]
//! [watch:evaluating] task=profile index=1 gen=0
//! [watch:settled] task=profile index=1 gen=0 (unchanged)
//! [execute:failed] task=profile index=1 gen=0 err="..."
//! [background:refresh] task=feed index=2 gen=0
//! [status] error
//! ```
//!
//! Events from quiet tasks are skipped entirely.

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event descriptions
/// to stdout for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        if e.quiet {
            return;
        }
        let task = e.task.as_deref().unwrap_or("?");
        match e.kind {
            EventKind::OneTimeStarting => {
                println!("[one-time:starting] task={task} index={:?}", e.index);
            }
            EventKind::OneTimeStopped => {
                println!("[one-time:stopped] task={task} index={:?}", e.index);
            }
            EventKind::OneTimeFailed => {
                println!(
                    "[one-time:failed] task={task} index={:?} err={:?}",
                    e.index, e.reason
                );
            }
            EventKind::BatchHold => {
                println!("[batch:hold] delay={:?}ms", e.delay_ms);
            }
            EventKind::BatchReady => {
                println!("[batch:ready]");
            }
            EventKind::BatchFailed => {
                println!("[batch:failed] err={:?}", e.reason);
            }
            EventKind::WatchEvaluating => {
                println!(
                    "[watch:evaluating] task={task} index={:?} gen={:?}",
                    e.index, e.generation
                );
            }
            EventKind::WatchSettled => {
                let suffix = match e.reason.as_deref() {
                    Some(r) => format!(" ({r})"),
                    None => String::new(),
                };
                println!(
                    "[watch:settled] task={task} index={:?} gen={:?}{suffix}",
                    e.index, e.generation
                );
            }
            EventKind::WatchFailed => {
                println!(
                    "[watch:failed] task={task} index={:?} gen={:?} err={:?}",
                    e.index, e.generation, e.reason
                );
            }
            EventKind::ExecuteStarting => {
                println!(
                    "[execute:starting] task={task} index={:?} gen={:?}",
                    e.index, e.generation
                );
            }
            EventKind::ExecuteStopped => {
                println!(
                    "[execute:stopped] task={task} index={:?} gen={:?}",
                    e.index, e.generation
                );
            }
            EventKind::ExecuteFailed => {
                println!(
                    "[execute:failed] task={task} index={:?} gen={:?} err={:?}",
                    e.index, e.generation, e.reason
                );
            }
            EventKind::TriggerEvaluating => {
                println!(
                    "[trigger:evaluating] task={task} index={:?} gen={:?}",
                    e.index, e.generation
                );
            }
            EventKind::BackgroundRefresh => {
                println!(
                    "[background:refresh] task={task} index={:?} gen={:?}",
                    e.index, e.generation
                );
            }
            EventKind::RetryRequested => {
                println!("[retry]");
            }
            EventKind::StaleDropped => {
                println!(
                    "[stale:dropped] index={:?} gen={:?}",
                    e.index, e.generation
                );
            }
            EventKind::StatusChanged => {
                println!("[status] {}", e.reason.as_deref().unwrap_or("?"));
            }
            EventKind::SubscriberPanicked => {
                println!("[subscriber:panicked] name={task} err={:?}", e.reason);
            }
            EventKind::SubscriberOverflow => {
                println!("[subscriber:overflow] name={task} reason={:?}", e.reason);
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
