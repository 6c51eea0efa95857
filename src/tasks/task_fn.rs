//! # Function-backed one-time task (`TaskFn`)
//!
//! [`TaskFn`] wraps a closure `F: Fn(TaskContext) -> Fut`, producing a fresh
//! future per batch invocation. This avoids shared mutable state between the
//! initial run and retry re-runs.
//!
//! ## Example
//! ```rust
//! use bootvisor::{TaskContext, TaskError, TaskFn, TaskRef};
//!
//! let t: TaskRef = TaskFn::arc("load-config", |_ctx: TaskContext| async move {
//!     // read config...
//!     Ok::<_, TaskError>(())
//! });
//!
//! assert_eq!(t.name(), "load-config");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use crate::error::TaskError;
use crate::tasks::context::TaskContext;
use crate::tasks::task::{BoxTaskFuture, Task};

/// Function-backed one-time task implementation.
///
/// Wraps a closure that *creates* a new future per invocation.
#[derive(Debug)]
pub struct TaskFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> TaskFn<F> {
    /// Creates a new function-backed task.
    ///
    /// Prefer [`TaskFn::arc`] when you immediately need a [`TaskRef`].
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F, Fut> Task for TaskFn<F>
where
    F: Fn(TaskContext) -> Fut + Send + Sync + 'static, // Fn, not FnMut
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn spawn(&self, ctx: TaskContext) -> BoxTaskFuture {
        Box::pin((self.f)(ctx))
    }
}
