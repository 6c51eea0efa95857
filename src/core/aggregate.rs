//! # Readiness aggregation: reducing all task state into one signal.
//!
//! [`aggregate`] is a pure function of [`OrchestratorState`]: it scans the
//! one-time batch and every tracker and produces a single
//! Loading/Ready/Error [`Status`] with deterministic error priority.
//!
//! ## Priority rules
//! ```text
//! batch Error                         ─► that error
//! else first tracker (by index) with
//!      watch Error, then execute Error ─► that error
//! else batch Ready ∧ all settled       ─► Ready
//! else                                 ─► Loading
//! ```
//!
//! At most one error is surfaced at a time. A tracker in a background
//! refresh (trigger/run shape) counts as settled — its content is still
//! shown, so the aggregate never reports Loading for it.

use crate::error::ErrorInfo;

/// Shape-only snapshot of one phase.
///
/// Typed watch values never leave their tracker; the shared state tracks only
/// the shape of each phase.
#[derive(Clone, Debug, Default)]
pub enum PhaseShape {
    /// Not yet started (initial, or reset by retry).
    #[default]
    Pending,
    /// In flight; the aggregate reports Loading.
    Loading,
    /// Settled with a value (or completed, for execute).
    Ready,
    /// Failed; sticky until an explicit retry.
    Error(ErrorInfo),
}

impl PhaseShape {
    /// True when the phase has settled successfully.
    pub fn is_ready(&self) -> bool {
        matches!(self, PhaseShape::Ready)
    }

    /// True when the phase holds an error.
    pub fn is_error(&self) -> bool {
        matches!(self, PhaseShape::Error(_))
    }

    /// The held error, if any.
    pub fn error(&self) -> Option<&ErrorInfo> {
        match self {
            PhaseShape::Error(info) => Some(info),
            _ => None,
        }
    }
}

/// Per-tracker state as seen by the aggregator.
#[derive(Clone, Debug)]
pub struct TrackerState {
    /// Watch (or trigger) phase shape.
    pub watch: PhaseShape,
    /// Execute (or run) phase shape.
    pub execute: PhaseShape,
    /// The latest watch value has not yet been consumed by execute.
    pub changed: bool,
    /// A silent background re-run of the run body is in flight.
    pub background: bool,
    /// Incarnation stamp; completions carrying an older one are discarded.
    pub generation: u64,
}

impl TrackerState {
    pub(crate) fn new() -> Self {
        Self {
            watch: PhaseShape::Pending,
            execute: PhaseShape::Pending,
            changed: false,
            background: false,
            generation: 0,
        }
    }

    /// Settled ⇔ watch produced a value, execute consumed exactly that value,
    /// and neither phase is in flight or failed.
    pub fn settled(&self) -> bool {
        self.watch.is_ready() && self.execute.is_ready() && !self.changed
    }

    /// Resets to Pending under the next generation (retry path).
    pub(crate) fn reset(&mut self) {
        self.generation += 1;
        self.watch = PhaseShape::Pending;
        self.execute = PhaseShape::Pending;
        self.changed = false;
        self.background = false;
    }
}

/// The single shared state reduced by [`aggregate`]. Owned and mutated
/// exclusively by the orchestrator core loop.
#[derive(Clone, Debug)]
pub struct OrchestratorState {
    /// One-time batch phase. `Ready` from the start when no one-time tasks
    /// are configured.
    pub batch: PhaseShape,
    /// Reactive tracker states, indexed by task position.
    pub trackers: Vec<TrackerState>,
}

impl OrchestratorState {
    pub(crate) fn empty() -> Self {
        Self {
            batch: PhaseShape::Pending,
            trackers: Vec::new(),
        }
    }
}

/// The tri-state readiness signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Status {
    /// Some component is pending or in a visible reload.
    Loading,
    /// The batch is Ready and every tracker is settled.
    Ready,
    /// A fault is surfaced; recovery requires an explicit retry.
    Error,
}

impl Status {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Status::Loading => "loading",
            Status::Ready => "ready",
            Status::Error => "error",
        }
    }
}

/// Reduces the orchestrator state into one status plus at most one surfaced
/// error, per the priority rules above.
pub fn aggregate(state: &OrchestratorState) -> (Status, Option<ErrorInfo>) {
    if let Some(info) = state.batch.error() {
        return (Status::Error, Some(info.clone()));
    }
    for tracker in &state.trackers {
        if let Some(info) = tracker.watch.error() {
            return (Status::Error, Some(info.clone()));
        }
        if let Some(info) = tracker.execute.error() {
            return (Status::Error, Some(info.clone()));
        }
    }
    if state.batch.is_ready() && state.trackers.iter().all(TrackerState::settled) {
        (Status::Ready, None)
    } else {
        (Status::Loading, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FaultKind, TaskError};

    fn err(kind: FaultKind, msg: &str) -> ErrorInfo {
        ErrorInfo::capture(kind, &TaskError::fail(msg))
    }

    fn settled_tracker() -> TrackerState {
        TrackerState {
            watch: PhaseShape::Ready,
            execute: PhaseShape::Ready,
            changed: false,
            background: false,
            generation: 0,
        }
    }

    #[test]
    fn ready_when_batch_ready_and_all_settled() {
        let state = OrchestratorState {
            batch: PhaseShape::Ready,
            trackers: vec![settled_tracker(), settled_tracker()],
        };
        let (status, error) = aggregate(&state);
        assert_eq!(status, Status::Ready);
        assert!(error.is_none());
    }

    #[test]
    fn batch_error_wins_over_tracker_error() {
        let mut tracker = settled_tracker();
        tracker.execute = PhaseShape::Error(err(FaultKind::ExecutePhase, "reactive"));
        let state = OrchestratorState {
            batch: PhaseShape::Error(err(FaultKind::OneTimeTask, "boot")),
            trackers: vec![tracker],
        };
        let (status, error) = aggregate(&state);
        assert_eq!(status, Status::Error);
        let error = error.unwrap();
        assert_eq!(error.kind(), FaultKind::OneTimeTask);
        assert_eq!(error.message(), "boot");
    }

    #[test]
    fn lowest_index_error_is_surfaced() {
        let mut t0 = settled_tracker();
        t0.watch = PhaseShape::Error(err(FaultKind::WatchPhase, "first"));
        let mut t1 = settled_tracker();
        t1.execute = PhaseShape::Error(err(FaultKind::ExecutePhase, "second"));
        let state = OrchestratorState {
            batch: PhaseShape::Ready,
            trackers: vec![t0, t1],
        };
        let (_, error) = aggregate(&state);
        assert_eq!(error.unwrap().message(), "first");
    }

    #[test]
    fn unconsumed_change_is_loading() {
        let mut tracker = settled_tracker();
        tracker.changed = true;
        let state = OrchestratorState {
            batch: PhaseShape::Ready,
            trackers: vec![tracker],
        };
        assert_eq!(aggregate(&state).0, Status::Loading);
    }

    #[test]
    fn background_refresh_stays_ready() {
        let mut tracker = settled_tracker();
        tracker.background = true;
        let state = OrchestratorState {
            batch: PhaseShape::Ready,
            trackers: vec![tracker],
        };
        assert_eq!(aggregate(&state).0, Status::Ready);
    }

    #[test]
    fn pending_batch_is_loading() {
        let state = OrchestratorState {
            batch: PhaseShape::Loading,
            trackers: Vec::new(),
        };
        assert_eq!(aggregate(&state).0, Status::Loading);
    }
}
