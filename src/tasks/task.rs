//! # One-time task abstraction.
//!
//! This module defines the [`Task`] trait for one-shot startup jobs and the
//! shared handle type [`TaskRef`] (`Arc<dyn Task>`).
//!
//! A task receives a [`TaskContext`] and runs once per batch invocation. It is
//! never forcibly cancelled; during shutdown it may observe
//! [`TaskContext::is_cancelled`] and exit cooperatively.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::TaskError;
use crate::tasks::context::TaskContext;

/// Boxed future produced by one [`Task`] invocation.
pub type BoxTaskFuture = Pin<Box<dyn Future<Output = Result<(), TaskError>> + Send>>;

/// # One-shot startup job.
///
/// A `Task` has a stable [`name`](Task::name) and a [`spawn`](Task::spawn)
/// method producing a fresh future per batch invocation. Producing a new
/// future per run keeps retries free of shared mutable state; tasks needing
/// shared state hold an explicit `Arc` internally.
///
/// # Example
/// ```
/// use bootvisor::{Task, TaskContext, TaskError};
/// use bootvisor::BoxTaskFuture;
///
/// struct WarmCache;
///
/// impl Task for WarmCache {
///     fn name(&self) -> &str { "warm-cache" }
///
///     fn spawn(&self, _ctx: TaskContext) -> BoxTaskFuture {
///         Box::pin(async {
///             // load things...
///             Ok(())
///         })
///     }
/// }
/// ```
pub trait Task: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// Produces one invocation of the task as a future.
    ///
    /// Called once per batch run (and again after a retry of a failed batch).
    fn spawn(&self, ctx: TaskContext) -> BoxTaskFuture;
}

/// Shared handle to a one-time task.
pub type TaskRef = Arc<dyn Task>;
