//! # Orchestrator: single-writer core loop and public handle.
//!
//! The [`Orchestrator`] is the entry point of the crate. It owns the event
//! [`Bus`], fans events out to subscribers, and spawns the **core loop**: a
//! single task that is the only writer of orchestration state. Batch and
//! tracker work runs in spawned tasks and reports back over an unbounded
//! channel; the core loop applies each message, re-aggregates, and publishes
//! the readiness snapshot on a `watch` channel.
//!
//! ```text
//!   Orchestrator::start(plan)
//!       │
//!       ├── spawn batch ──────► OneTimeRunner::run ──┐
//!       ├── spawn tracker 0 ──► TrackerRuntime::run ─┤
//!       ├── spawn tracker N ──► TrackerRuntime::run ─┤
//!       │                                            │ CoreMsg (generation-stamped)
//!       ▼                                            ▼
//!   Core loop ◄─────────────────────────── mpsc::UnboundedReceiver
//!       │  apply → aggregate → publish
//!       ▼
//!   watch::Sender<Readiness>  ──►  Orchestrator::readiness() observers
//! ```
//!
//! ## Rules
//! - Only the core loop mutates [`OrchestratorState`]; everything else sends
//!   messages.
//! - Every message from a spawned unit carries the generation it was spawned
//!   under; mismatched messages are dropped (`StaleDropped`).
//! - The readiness snapshot changes only when the aggregated status or the
//!   surfaced fault actually changes; background refreshes produce no frame.
//! - Retry is level-triggered: it re-runs the failed batch (if any) and
//!   restarts every tracker under fresh generations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::config::OrchestratorConfig;
use crate::core::aggregate::{aggregate, OrchestratorState, PhaseShape, Status, TrackerState};
use crate::core::one_time::OneTimeRunner;
use crate::core::tracker::{TrackerRuntime, TrackerUpdate};
use crate::error::{ErrorInfo, RuntimeError};
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::{Subscribe, SubscriberSet};
use crate::tasks::{ReactiveSpec, TaskRef};

/// Everything the orchestrator runs: one-time startup tasks plus reactive
/// task trackers.
///
/// Tracker indices are assigned from the order of [`BootPlan::reactive`];
/// fault reports and events refer to tasks by that index.
#[derive(Default)]
pub struct BootPlan {
    /// Startup tasks, run once per generation.
    pub one_time: Vec<TaskRef>,
    /// Reactive tasks, each driven by its own tracker.
    pub reactive: Vec<ReactiveSpec>,
}

impl BootPlan {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a one-time startup task.
    pub fn one_time(mut self, task: TaskRef) -> Self {
        self.one_time.push(task);
        self
    }

    /// Adds a reactive task tracker.
    pub fn reactive(mut self, spec: ReactiveSpec) -> Self {
        self.reactive.push(spec);
        self
    }
}

/// Message applied by the core loop.
pub(crate) enum CoreMsg {
    /// Begin running the plan.
    Start(BootPlan),
    /// Batch finished under the given generation.
    BatchDone {
        generation: u64,
        result: Result<(), ErrorInfo>,
    },
    /// A tracker incarnation reported a shape transition.
    Tracker {
        index: usize,
        generation: u64,
        update: TrackerUpdate,
    },
    /// A consumer asked for failed work to be retried.
    Retry,
}

/// Cloneable handle for requesting a retry of failed work.
///
/// Carried inside [`Readiness`] whenever the aggregated status is
/// [`Status::Error`], so the consumer observing a fault can recover without
/// holding a reference to the [`Orchestrator`] itself.
#[derive(Clone, Debug)]
pub struct RetryHandle {
    tx: mpsc::UnboundedSender<CoreMsg>,
}

impl RetryHandle {
    /// Requests a retry. Fails only if the core loop has shut down.
    pub fn retry(&self) -> Result<(), RuntimeError> {
        self.tx
            .send(CoreMsg::Retry)
            .map_err(|_| RuntimeError::Closed)
    }
}

/// Aggregated readiness snapshot published on the watch channel.
#[derive(Clone, Debug)]
pub struct Readiness {
    /// Aggregated status across the batch and all trackers.
    pub status: Status,
    /// Highest-priority fault when `status` is [`Status::Error`].
    pub error: Option<ErrorInfo>,
    /// Present exactly when `status` is [`Status::Error`].
    pub retry: Option<RetryHandle>,
}

impl Readiness {
    fn loading() -> Self {
        Self {
            status: Status::Loading,
            error: None,
            retry: None,
        }
    }

    /// True once startup completed and every tracker settled.
    pub fn is_ready(&self) -> bool {
        matches!(self.status, Status::Ready)
    }
}

/// Public handle: owns the bus and the core loop.
pub struct Orchestrator {
    bus: Bus,
    tx: mpsc::UnboundedSender<CoreMsg>,
    readiness: watch::Receiver<Readiness>,
    root: CancellationToken,
    started: AtomicBool,
}

impl Orchestrator {
    /// Creates the orchestrator, spawning the subscriber fan-out and the
    /// core loop. Call [`start`](Self::start) to begin running a plan.
    pub fn new(cfg: OrchestratorConfig, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        let bus = Bus::new(cfg.bus_capacity);
        let root = CancellationToken::new();
        let (tx, rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = watch::channel(Readiness::loading());

        subscriber_listener(
            SubscriberSet::new(subscribers, bus.clone()),
            bus.subscribe(),
            root.clone(),
        );

        let core = Core {
            cfg,
            bus: bus.clone(),
            tx: tx.clone(),
            ready_tx,
            root: root.clone(),
            tracker_cancel: root.child_token(),
            state: OrchestratorState::empty(),
            batch_generation: 0,
            runner: None,
            reactive: Vec::new(),
            last: Readiness::loading(),
        };
        tokio::spawn(core.run(rx));

        Self {
            bus,
            tx,
            readiness: ready_rx,
            root,
            started: AtomicBool::new(false),
        }
    }

    /// Starts running the plan. Subsequent calls are rejected; retry failed
    /// work through [`retry`](Self::retry) instead of re-starting.
    pub fn start(&self, plan: BootPlan) -> Result<(), RuntimeError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(RuntimeError::AlreadyStarted);
        }
        self.tx
            .send(CoreMsg::Start(plan))
            .map_err(|_| RuntimeError::Closed)
    }

    /// Requests a retry of failed work.
    pub fn retry(&self) -> Result<(), RuntimeError> {
        self.tx
            .send(CoreMsg::Retry)
            .map_err(|_| RuntimeError::Closed)
    }

    /// A retry handle detached from this orchestrator's lifetime.
    pub fn retry_handle(&self) -> RetryHandle {
        RetryHandle {
            tx: self.tx.clone(),
        }
    }

    /// Fresh receiver for the aggregated readiness snapshot.
    pub fn readiness(&self) -> watch::Receiver<Readiness> {
        self.readiness.clone()
    }

    /// Fresh receiver for the raw event stream.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Cancels all running work and lets subscriber workers drain.
    pub fn shutdown(&self) {
        self.root.cancel();
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

/// Forwards bus events into the subscriber set until shutdown, then drains
/// the workers.
fn subscriber_listener(
    set: SubscriberSet,
    mut rx: broadcast::Receiver<Event>,
    root: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = root.cancelled() => break,
                ev = rx.recv() => match ev {
                    Ok(ev) => set.emit_arc(Arc::new(ev)),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
        set.shutdown().await;
    });
}

/// The single writer of orchestration state.
struct Core {
    cfg: OrchestratorConfig,
    bus: Bus,
    tx: mpsc::UnboundedSender<CoreMsg>,
    ready_tx: watch::Sender<Readiness>,
    root: CancellationToken,
    tracker_cancel: CancellationToken,
    state: OrchestratorState,
    batch_generation: u64,
    runner: Option<Arc<OneTimeRunner>>,
    reactive: Vec<ReactiveSpec>,
    last: Readiness,
}

impl Core {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<CoreMsg>) {
        loop {
            tokio::select! {
                _ = self.root.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => self.handle(msg).await,
                    None => break,
                },
            }
        }
    }

    async fn handle(&mut self, msg: CoreMsg) {
        match msg {
            CoreMsg::Start(plan) => self.handle_start(plan),
            CoreMsg::BatchDone { generation, result } => self.handle_batch_done(generation, result),
            CoreMsg::Tracker {
                index,
                generation,
                update,
            } => self.handle_tracker(index, generation, update),
            CoreMsg::Retry => self.handle_retry().await,
        }
        self.publish_aggregate();
    }

    fn handle_start(&mut self, plan: BootPlan) {
        self.reactive = plan.reactive;
        self.state.trackers = self.reactive.iter().map(|_| TrackerState::new()).collect();

        if plan.one_time.is_empty() && self.cfg.minimum_duration.is_zero() {
            self.state.batch = PhaseShape::Ready;
            self.bus.publish(Event::now(EventKind::BatchReady));
        } else {
            // The runner holds the floor even for an empty task list.
            self.runner = Some(Arc::new(OneTimeRunner::new(
                plan.one_time,
                self.cfg.execution_mode,
                self.cfg.minimum_duration,
                self.bus.clone(),
            )));
            self.spawn_batch();
        }

        for index in 0..self.reactive.len() {
            self.spawn_tracker(index);
        }
    }

    fn spawn_batch(&mut self) {
        let Some(runner) = self.runner.as_ref() else {
            return;
        };
        self.state.batch = PhaseShape::Loading;

        let runner = Arc::clone(runner);
        let generation = self.batch_generation;
        let tx = self.tx.clone();
        let cancel = self.root.child_token();
        tokio::spawn(async move {
            let result = runner.run(cancel).await;
            let _ = tx.send(CoreMsg::BatchDone { generation, result });
        });
    }

    fn spawn_tracker(&self, index: usize) {
        let runtime = TrackerRuntime {
            index,
            generation: self.state.trackers[index].generation,
            spec: self.reactive[index].clone(),
            updates: self.tx.clone(),
            bus: self.bus.clone(),
            cancel: self.tracker_cancel.child_token(),
        };
        tokio::spawn(runtime.run());
    }

    fn handle_batch_done(&mut self, generation: u64, result: Result<(), ErrorInfo>) {
        if generation != self.batch_generation {
            self.bus.publish(
                Event::now(EventKind::StaleDropped)
                    .with_generation(generation)
                    .with_reason("batch"),
            );
            return;
        }
        self.state.batch = match result {
            Ok(()) => PhaseShape::Ready,
            Err(info) => PhaseShape::Error(info),
        };
    }

    fn handle_tracker(&mut self, index: usize, generation: u64, update: TrackerUpdate) {
        let Some(tracker) = self.state.trackers.get_mut(index) else {
            return;
        };
        if generation != tracker.generation {
            self.bus.publish(
                Event::now(EventKind::StaleDropped)
                    .with_index(index)
                    .with_generation(generation),
            );
            return;
        }
        match update {
            TrackerUpdate::WatchLoading => tracker.watch = PhaseShape::Loading,
            TrackerUpdate::WatchReady { changed } => {
                tracker.watch = PhaseShape::Ready;
                if changed {
                    tracker.changed = true;
                }
            }
            TrackerUpdate::WatchError(info) => tracker.watch = PhaseShape::Error(info),
            TrackerUpdate::ExecuteLoading => tracker.execute = PhaseShape::Loading,
            TrackerUpdate::ExecuteReady => {
                tracker.execute = PhaseShape::Ready;
                tracker.changed = false;
                tracker.background = false;
            }
            TrackerUpdate::ExecuteError(info) => {
                tracker.execute = PhaseShape::Error(info);
                tracker.background = false;
            }
            TrackerUpdate::BackgroundStarted => tracker.background = true,
        }
    }

    /// Re-runs the failed batch (if any) and restarts every tracker under a
    /// fresh generation. In-flight work from old generations keeps running
    /// toward its cancellation point, but its reports no longer match.
    async fn handle_retry(&mut self) {
        self.bus.publish(Event::now(EventKind::RetryRequested));

        if self.state.batch.is_error() {
            if let Some(runner) = self.runner.as_ref() {
                self.batch_generation += 1;
                runner.reset().await;
                self.spawn_batch();
            }
        }

        if !self.reactive.is_empty() {
            self.tracker_cancel.cancel();
            self.tracker_cancel = self.root.child_token();
            for tracker in &mut self.state.trackers {
                tracker.reset();
            }
            for index in 0..self.reactive.len() {
                self.spawn_tracker(index);
            }
        }
    }

    /// Publishes a new readiness snapshot when the aggregate actually moved.
    fn publish_aggregate(&mut self) {
        let (status, error) = aggregate(&self.state);

        let same_error = match (&self.last.error, &error) {
            (None, None) => true,
            (Some(a), Some(b)) => a.same_as(b),
            _ => false,
        };
        if status == self.last.status && same_error {
            return;
        }

        let retry = matches!(status, Status::Error).then(|| RetryHandle {
            tx: self.tx.clone(),
        });
        let next = Readiness {
            status,
            error,
            retry,
        };
        self.last = next.clone();
        let _ = self.ready_tx.send(next);

        self.bus
            .publish(Event::now(EventKind::StatusChanged).with_reason(status.as_label()));
    }
}
