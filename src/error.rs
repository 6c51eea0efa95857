//! Error types used by the bootvisor runtime and task bodies.
//!
//! This module defines three layers of error handling:
//!
//! - [`TaskError`] — errors returned by individual task bodies (one-time tasks
//!   and reactive watch/execute phases).
//! - [`RuntimeError`] — errors raised by the orchestration surface itself.
//! - [`ErrorInfo`] — an immutable, captured fault: the phase it originated in
//!   ([`FaultKind`]), the runtime type name and message of the underlying error,
//!   and the stack trace at the capture point, with a memoized string rendering.
//!
//! Task bodies never see `ErrorInfo`; it is produced at every phase boundary so
//! that downstream aggregation operates purely on explicit, captured values and
//! no raw fault ever crosses a phase boundary unconverted.

use std::any::Any;
use std::backtrace::Backtrace;
use std::fmt;
use std::sync::{Arc, OnceLock};

use thiserror::Error;

/// # Errors produced by the bootvisor orchestration surface.
///
/// These represent misuse of the orchestrator handle, not task failures.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The core loop has shut down; no further messages can be delivered.
    #[error("orchestrator core loop has shut down")]
    Closed,

    /// `start` was called more than once on the same orchestrator.
    #[error("orchestrator has already been started")]
    AlreadyStarted,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::Closed => "runtime_closed",
            RuntimeError::AlreadyStarted => "already_started",
        }
    }
}

/// # Errors produced by task bodies.
///
/// Returned from one-time task bodies and from reactive watch/execute phases.
/// The orchestrator captures these at the phase boundary and wraps them into
/// an [`ErrorInfo`]; they never propagate past it as raw errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// Task body failed.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Task body observed cancellation and bailed out.
    #[error("context cancelled")]
    Canceled,
}

impl TaskError {
    /// Creates a [`TaskError::Fail`] from any displayable message.
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => error.clone(),
            TaskError::Canceled => "context cancelled".to_string(),
        }
    }
}

impl From<String> for TaskError {
    fn from(error: String) -> Self {
        TaskError::Fail { error }
    }
}

impl From<&str> for TaskError {
    fn from(error: &str) -> Self {
        TaskError::fail(error)
    }
}

/// Phase in which a captured fault originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Thrown by a one-time task body; fails the whole batch.
    OneTimeTask,
    /// Thrown by a reactive task's watch (or trigger) phase.
    WatchPhase,
    /// Thrown by a reactive task's execute (or run) phase.
    ExecutePhase,
}

impl FaultKind {
    /// Returns the rendered fault-kind name used in the error string contract.
    pub fn as_str(&self) -> &'static str {
        match self {
            FaultKind::OneTimeTask => "OneTimeTaskFault",
            FaultKind::WatchPhase => "WatchPhaseFault",
            FaultKind::ExecutePhase => "ExecutePhaseFault",
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            FaultKind::OneTimeTask => "one_time_task_fault",
            FaultKind::WatchPhase => "watch_phase_fault",
            FaultKind::ExecutePhase => "execute_phase_fault",
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct ErrorInner {
    kind: FaultKind,
    type_name: &'static str,
    message: String,
    task: Option<Arc<str>>,
    index: Option<usize>,
    trace: Backtrace,
    rendered: OnceLock<Arc<str>>,
}

/// Immutable captured fault with memoized rendering.
///
/// Cheap to clone (`Arc`-backed); all clones share the same memoized render.
///
/// ## Rendering contract
/// [`ErrorInfo::render`] produces
/// `"<FaultKind>: <TypeName>[: <message>]\nStack trace (first 5 lines):\n<lines>"`
/// exactly once per instance. Subsequent calls return the identical `Arc<str>`
/// (pointer-equal), never a recomputed string.
///
/// ## Example
/// ```
/// use bootvisor::{ErrorInfo, FaultKind, TaskError};
/// use std::sync::Arc;
///
/// let info = ErrorInfo::capture(FaultKind::WatchPhase, &TaskError::fail("boom"));
/// let first = info.render();
/// let second = info.render();
/// assert!(Arc::ptr_eq(&first, &second));
/// assert!(first.starts_with("WatchPhaseFault: TaskError: boom"));
/// ```
#[derive(Clone, Debug)]
pub struct ErrorInfo {
    inner: Arc<ErrorInner>,
}

impl ErrorInfo {
    /// Captures a task-body error together with the current stack trace.
    ///
    /// Must be called at the boundary of the failing async operation so the
    /// trace reflects the capture point.
    pub fn capture(kind: FaultKind, err: &TaskError) -> Self {
        Self::from_parts(
            kind,
            short_type_name(std::any::type_name_of_val(err)),
            err.as_message(),
        )
    }

    /// Captures a panic payload as a fault of the given kind.
    ///
    /// Panic payloads are almost always `&str` or `String`; anything else is
    /// rendered with a placeholder message.
    pub fn from_panic(kind: FaultKind, payload: Box<dyn Any + Send>) -> Self {
        let (type_name, message) = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            ("str", (*msg).to_string())
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            ("String", msg.clone())
        } else {
            ("Box<dyn Any>", "unknown panic".to_string())
        };
        Self::from_parts(kind, type_name, message)
    }

    fn from_parts(kind: FaultKind, type_name: &'static str, message: String) -> Self {
        Self {
            inner: Arc::new(ErrorInner {
                kind,
                type_name,
                message,
                task: None,
                index: None,
                trace: Backtrace::capture(),
                rendered: OnceLock::new(),
            }),
        }
    }

    /// Attaches the originating task name. Only effective before the info is shared.
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.task = Some(task.into());
        }
        self
    }

    /// Attaches the originating task index. Only effective before the info is shared.
    pub fn with_index(mut self, index: usize) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.index = Some(index);
        }
        self
    }

    /// Phase the fault originated in.
    pub fn kind(&self) -> FaultKind {
        self.inner.kind
    }

    /// Short runtime type name of the captured error.
    pub fn type_name(&self) -> &'static str {
        self.inner.type_name
    }

    /// Message of the captured error.
    pub fn message(&self) -> &str {
        &self.inner.message
    }

    /// Name of the task the fault originated in, if tagged.
    pub fn task(&self) -> Option<&str> {
        self.inner.task.as_deref()
    }

    /// Index of the task the fault originated in, if tagged.
    pub fn index(&self) -> Option<usize> {
        self.inner.index
    }

    /// Whether two infos share the same captured fault (clone identity).
    pub fn same_as(&self, other: &ErrorInfo) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Renders the fault string, computing it at most once.
    ///
    /// Every call returns the same `Arc<str>` instance; clones of this
    /// `ErrorInfo` share the cache.
    pub fn render(&self) -> Arc<str> {
        self.inner
            .rendered
            .get_or_init(|| {
                let mut out = String::new();
                out.push_str(self.inner.kind.as_str());
                out.push_str(": ");
                out.push_str(self.inner.type_name);
                if !self.inner.message.is_empty() {
                    out.push_str(": ");
                    out.push_str(&self.inner.message);
                }
                out.push_str("\nStack trace (first 5 lines):\n");
                let trace = self.inner.trace.to_string();
                let mut lines = trace.lines().take(5).peekable();
                while let Some(line) = lines.next() {
                    out.push_str(line);
                    if lines.peek().is_some() {
                        out.push('\n');
                    }
                }
                Arc::from(out)
            })
            .clone()
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

/// Strips the module path from a fully qualified type name.
fn short_type_name(full: &'static str) -> &'static str {
    full.rsplit("::").next().unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_is_cached_pointer_equal() {
        let info = ErrorInfo::capture(FaultKind::ExecutePhase, &TaskError::fail("boom"));
        let a = info.render();
        let b = info.render();
        assert!(Arc::ptr_eq(&a, &b));

        // Clones share the same cache.
        let clone = info.clone();
        assert!(Arc::ptr_eq(&a, &clone.render()));
    }

    #[test]
    fn render_format_contract() {
        let info = ErrorInfo::capture(FaultKind::OneTimeTask, &TaskError::fail("db unreachable"));
        let rendered = info.render();
        let mut lines = rendered.lines();
        assert_eq!(
            lines.next(),
            Some("OneTimeTaskFault: TaskError: db unreachable")
        );
        assert_eq!(lines.next(), Some("Stack trace (first 5 lines):"));
        // At most 5 trace lines follow the header.
        assert!(lines.count() <= 5);
    }

    #[test]
    fn panic_payload_capture() {
        let info = ErrorInfo::from_panic(FaultKind::WatchPhase, Box::new("kaboom"));
        assert_eq!(info.kind(), FaultKind::WatchPhase);
        assert_eq!(info.message(), "kaboom");
        assert!(info.render().starts_with("WatchPhaseFault: str: kaboom"));
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(FaultKind::OneTimeTask.as_label(), "one_time_task_fault");
        assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
        assert_eq!(RuntimeError::Closed.as_label(), "runtime_closed");
    }

    #[test]
    fn tagging_before_share() {
        let info = ErrorInfo::capture(FaultKind::WatchPhase, &TaskError::fail("x"))
            .with_task("profile")
            .with_index(2);
        assert_eq!(info.task(), Some("profile"));
        assert_eq!(info.index(), Some(2));
    }
}
