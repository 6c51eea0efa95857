//! # Task abstractions and execution context.
//!
//! This module provides the task-facing types:
//! - [`Task`] / [`TaskFn`] / [`TaskRef`] — one-shot startup jobs
//! - [`ReactiveTask`] / [`ReactiveFn`] — watch/execute pipelines
//! - [`TriggerTask`] / [`TriggerFn`] — trigger-gated run pipelines
//! - [`ReactiveSpec`] — heterogeneous plan element for the reactive list
//! - [`TaskContext`] — explicit execution context (read/watch/on_dispose)
//! - [`ValueRef`] / [`WatchValue`] — type-erased watch values

mod context;
mod reactive;
mod task;
mod task_fn;

pub use context::TaskContext;
pub use reactive::{
    ReactiveFn, ReactiveRef, ReactiveSpec, ReactiveTask, TriggerFn, TriggerRef, TriggerTask,
    ValueRef, WatchValue,
};
pub use task::{BoxTaskFuture, Task, TaskRef};
pub use task_fn::TaskFn;
