//! # Reactive task shapes: watch/execute and trigger/run.
//!
//! A reactive task is a two-phase pipeline that re-runs as its watched
//! signals change:
//!
//! - [`ReactiveTask`] — `watch(ctx) -> value` (cheap observation, re-runs
//!   freely) and `execute(ctx, value)` (the work, run once per *distinct*
//!   value). Any change observed by the watch phase causes a visible reload.
//! - [`TriggerTask`] — `trigger(ctx) -> value` (pure observation) and
//!   `run(ctx)` (the work, with its own dependencies). Only a *changed*
//!   trigger value causes a visible reload; changes to dependencies read
//!   inside `run` re-execute it silently in the background.
//!
//! Both shapes are closure-backed in practice ([`ReactiveFn`], [`TriggerFn`])
//! — a plain record of function values with optional metadata, not a class
//! hierarchy. Watch values are type-erased behind [`ValueRef`] so that a
//! heterogeneous task list fits in one plan; equality (the "same value, no
//! re-execute" rule) goes through [`WatchValue::eq_value`].

use std::any::Any;
use std::borrow::Cow;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TaskError;
use crate::tasks::context::TaskContext;

/// Type-erased watch value with value equality.
///
/// Implemented for every `T: PartialEq + Send + Sync + 'static`; trackers
/// compare values across evaluations with [`eq_value`](WatchValue::eq_value)
/// (value equality, never identity).
pub trait WatchValue: Any + Send + Sync {
    /// Value equality across the erased boundary. False when `other` holds a
    /// different concrete type.
    fn eq_value(&self, other: &dyn WatchValue) -> bool;

    /// Upcast for downcasting back to the concrete type.
    fn as_any(&self) -> &dyn Any;
}

impl<T> WatchValue for T
where
    T: PartialEq + Send + Sync + 'static,
{
    fn eq_value(&self, other: &dyn WatchValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| self == other)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Shared handle to an erased watch value.
pub type ValueRef = Arc<dyn WatchValue>;

/// # Watch/execute reactive task.
///
/// The watch phase re-evaluates whenever a signal it [`TaskContext::watch`]ed
/// changes; the execute phase runs once per distinct watch value.
#[async_trait]
pub trait ReactiveTask: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// When true, subscribers that log per-phase events skip this task.
    fn quiet(&self) -> bool {
        false
    }

    /// Cheap observation producing the value the execute phase consumes.
    async fn watch(&self, ctx: TaskContext) -> Result<ValueRef, TaskError>;

    /// Performs the work for the latest distinct watch value.
    async fn execute(&self, ctx: TaskContext, value: ValueRef) -> Result<(), TaskError>;
}

/// Shared handle to a watch/execute task.
pub type ReactiveRef = Arc<dyn ReactiveTask>;

/// # Trigger/run reactive task.
///
/// Only a change in what `trigger` observes causes a user-visible reload;
/// signals watched inside `run` re-execute it silently in the background.
#[async_trait]
pub trait TriggerTask: Send + Sync + 'static {
    /// Returns a stable, human-readable task name.
    fn name(&self) -> &str;

    /// When true, subscribers that log per-phase events skip this task.
    fn quiet(&self) -> bool {
        false
    }

    /// Pure, cheap observation. Its value gates visible reloads.
    async fn trigger(&self, ctx: TaskContext) -> Result<ValueRef, TaskError>;

    /// The actual work; may watch additional signals of its own.
    async fn run(&self, ctx: TaskContext) -> Result<(), TaskError>;
}

/// Shared handle to a trigger/run task.
pub type TriggerRef = Arc<dyn TriggerTask>;

/// One element of the reactive task list. Identity is list position; order is
/// significant for error priority only.
#[derive(Clone)]
pub enum ReactiveSpec {
    /// Watch/execute shape: every watch change is a visible reload.
    WatchExecute(ReactiveRef),
    /// Trigger/run shape: only trigger changes are visible reloads.
    TriggerRun(TriggerRef),
}

impl ReactiveSpec {
    /// Wraps a watch/execute task.
    pub fn watch_execute(task: ReactiveRef) -> Self {
        ReactiveSpec::WatchExecute(task)
    }

    /// Wraps a trigger/run task.
    pub fn trigger_run(task: TriggerRef) -> Self {
        ReactiveSpec::TriggerRun(task)
    }

    /// Convenience: returns the task name.
    pub fn name(&self) -> &str {
        match self {
            ReactiveSpec::WatchExecute(t) => t.name(),
            ReactiveSpec::TriggerRun(t) => t.name(),
        }
    }

    /// Returns the task's logging opt-out.
    pub fn quiet(&self) -> bool {
        match self {
            ReactiveSpec::WatchExecute(t) => t.quiet(),
            ReactiveSpec::TriggerRun(t) => t.quiet(),
        }
    }
}

/// Closure-backed watch/execute task.
///
/// Keeps the typed pipeline (`T` flows from the watch closure into the
/// execute closure) and erases it behind [`ValueRef`] at the trait boundary.
///
/// ## Example
/// ```rust
/// use bootvisor::{ReactiveFn, ReactiveRef, Signal, TaskContext, TaskError};
/// use std::sync::Arc;
///
/// let user_id = Signal::new(0u64);
/// let watched = user_id.clone();
/// let task: ReactiveRef = ReactiveFn::arc(
///     "profile",
///     move |ctx: TaskContext| {
///         let watched = watched.clone();
///         async move { Ok::<_, TaskError>(ctx.watch(&watched)) }
///     },
///     |_ctx: TaskContext, id: u64| async move {
///         // load profile for `id`...
///         let _ = id;
///         Ok(())
///     },
/// );
/// assert_eq!(task.name(), "profile");
/// ```
pub struct ReactiveFn<W, E, T> {
    name: Cow<'static, str>,
    quiet: bool,
    watch: W,
    execute: E,
    _value: PhantomData<fn() -> T>,
}

impl<W, E, T> ReactiveFn<W, E, T> {
    /// Creates a new closure-backed watch/execute task.
    pub fn new(name: impl Into<Cow<'static, str>>, watch: W, execute: E) -> Self {
        Self {
            name: name.into(),
            quiet: false,
            watch,
            execute,
            _value: PhantomData,
        }
    }

    /// Opts the task out of verbose per-phase logging.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, watch: W, execute: E) -> Arc<Self> {
        Arc::new(Self::new(name, watch, execute))
    }
}

#[async_trait]
impl<W, E, T, Fw, Fe> ReactiveTask for ReactiveFn<W, E, T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    W: Fn(TaskContext) -> Fw + Send + Sync + 'static,
    Fw: Future<Output = Result<T, TaskError>> + Send + 'static,
    E: Fn(TaskContext, T) -> Fe + Send + Sync + 'static,
    Fe: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn quiet(&self) -> bool {
        self.quiet
    }

    async fn watch(&self, ctx: TaskContext) -> Result<ValueRef, TaskError> {
        let value = (self.watch)(ctx).await?;
        Ok(Arc::new(value) as ValueRef)
    }

    async fn execute(&self, ctx: TaskContext, value: ValueRef) -> Result<(), TaskError> {
        let value = value
            .as_any()
            .downcast_ref::<T>()
            .cloned()
            .ok_or_else(|| TaskError::fail("watch value type mismatch"))?;
        (self.execute)(ctx, value).await
    }
}

/// Closure-backed trigger/run task.
///
/// ## Example
/// ```rust
/// use bootvisor::{Signal, TaskContext, TaskError, TriggerFn, TriggerRef};
///
/// let session = Signal::new(0u64);
/// let observed = session.clone();
/// let task: TriggerRef = TriggerFn::arc(
///     "feed",
///     move |ctx: TaskContext| {
///         let observed = observed.clone();
///         async move { Ok::<_, TaskError>(ctx.watch(&observed)) }
///     },
///     |_ctx: TaskContext| async move {
///         // rebuild the feed; may watch its own signals
///         Ok(())
///     },
/// );
/// assert_eq!(task.name(), "feed");
/// ```
pub struct TriggerFn<G, R, T> {
    name: Cow<'static, str>,
    quiet: bool,
    trigger: G,
    run: R,
    _value: PhantomData<fn() -> T>,
}

impl<G, R, T> TriggerFn<G, R, T> {
    /// Creates a new closure-backed trigger/run task.
    pub fn new(name: impl Into<Cow<'static, str>>, trigger: G, run: R) -> Self {
        Self {
            name: name.into(),
            quiet: false,
            trigger,
            run,
            _value: PhantomData,
        }
    }

    /// Opts the task out of verbose per-phase logging.
    pub fn with_quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Creates the task and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, trigger: G, run: R) -> Arc<Self> {
        Arc::new(Self::new(name, trigger, run))
    }
}

#[async_trait]
impl<G, R, T, Fg, Fr> TriggerTask for TriggerFn<G, R, T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    G: Fn(TaskContext) -> Fg + Send + Sync + 'static,
    Fg: Future<Output = Result<T, TaskError>> + Send + 'static,
    R: Fn(TaskContext) -> Fr + Send + Sync + 'static,
    Fr: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn quiet(&self) -> bool {
        self.quiet
    }

    async fn trigger(&self, ctx: TaskContext) -> Result<ValueRef, TaskError> {
        let value = (self.trigger)(ctx).await?;
        Ok(Arc::new(value) as ValueRef)
    }

    async fn run(&self, ctx: TaskContext) -> Result<(), TaskError> {
        (self.run)(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_equality_is_by_value_not_identity() {
        let a: ValueRef = Arc::new(42u64);
        let b: ValueRef = Arc::new(42u64);
        let c: ValueRef = Arc::new(7u64);
        assert!(a.eq_value(b.as_ref()));
        assert!(!a.eq_value(c.as_ref()));
    }

    #[test]
    fn value_equality_false_across_types() {
        let a: ValueRef = Arc::new(42u64);
        let b: ValueRef = Arc::new("42".to_string());
        assert!(!a.eq_value(b.as_ref()));
    }
}
