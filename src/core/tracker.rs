//! # Tracker incarnation: drives one reactive task's pipeline.
//!
//! Each configured reactive task gets a spawned incarnation that runs its
//! two-phase pipeline and reports shape transitions to the core loop as
//! generation-stamped messages. The core loop discards any message whose
//! generation does not match the tracker's live generation, so work started
//! before a retry can never corrupt post-retry state.
//!
//! ## Watch/execute shape
//! ```text
//! loop {
//!   ├─► WatchLoading, evaluate watch(ctx)
//!   │     ├─ Err ──► WatchError (sticky; incarnation ends)
//!   │     ├─ Ok, value == previous ──► WatchReady{changed:false}  (no execute)
//!   │     └─ Ok, value distinct    ──► WatchReady{changed:true}
//!   │            └─► ExecuteLoading → execute(ctx, value)
//!   │                  ├─ Ok  ──► ExecuteReady (clears `changed`)
//!   │                  └─ Err ──► ExecuteError (sticky; incarnation ends)
//!   └─► wait: any watched signal bumps → re-evaluate; cancelled → exit
//! }
//! ```
//!
//! ## Trigger/run shape
//! Trigger subscriptions and run subscriptions are kept apart. A trigger
//! dependency firing re-evaluates the trigger silently; only a *changed*
//! trigger value starts a visible pass (Loading). A run dependency firing
//! starts a background pass: the run slot stays Ready while the body re-runs,
//! and a failure moves it straight from Ready to Error with no Loading frame
//! in between.
//!
//! ## Rules
//! - A phase error ends the incarnation; the error is sticky until retry.
//! - The previous evaluation's context is disposed (cleanups run) before the
//!   next evaluation and on teardown.
//! - Subscription receivers are owned here and drop with the incarnation.

use std::panic::AssertUnwindSafe;

use futures::future::select_all;
use futures::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::core::orchestrator::CoreMsg;
use crate::error::{ErrorInfo, FaultKind, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::tasks::{ReactiveRef, ReactiveSpec, TaskContext, TriggerRef, ValueRef};

/// Shape transition reported to the core loop.
#[derive(Debug)]
pub(crate) enum TrackerUpdate {
    WatchLoading,
    WatchReady { changed: bool },
    WatchError(ErrorInfo),
    ExecuteLoading,
    ExecuteReady,
    ExecuteError(ErrorInfo),
    BackgroundStarted,
}

/// Which subscription set woke a trigger/run incarnation.
enum Fired {
    Trigger,
    Run,
}

/// One spawned incarnation of a reactive task's pipeline.
pub(crate) struct TrackerRuntime {
    pub index: usize,
    pub generation: u64,
    pub spec: ReactiveSpec,
    pub updates: mpsc::UnboundedSender<CoreMsg>,
    pub bus: Bus,
    pub cancel: CancellationToken,
}

impl TrackerRuntime {
    pub(crate) async fn run(self) {
        match self.spec.clone() {
            ReactiveSpec::WatchExecute(task) => self.watch_execute_loop(task).await,
            ReactiveSpec::TriggerRun(task) => self.trigger_run_loop(task).await,
        }
    }

    fn send(&self, update: TrackerUpdate) {
        let _ = self.updates.send(CoreMsg::Tracker {
            index: self.index,
            generation: self.generation,
            update,
        });
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::now(kind)
            .with_task(self.spec.name())
            .with_index(self.index)
            .with_generation(self.generation)
            .with_quiet(self.spec.quiet())
    }

    // === watch/execute =====================================================

    async fn watch_execute_loop(&self, task: ReactiveRef) {
        let mut previous: Option<ValueRef> = None;
        let mut last_ctx: Option<TaskContext> = None;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Some(ctx) = last_ctx.take() {
                ctx.dispose();
            }

            self.send(TrackerUpdate::WatchLoading);
            self.bus.publish(self.event(EventKind::WatchEvaluating));

            let ctx = TaskContext::new(self.cancel.child_token());
            let outcome = AssertUnwindSafe(task.watch(ctx.clone())).catch_unwind().await;
            match flatten_phase(outcome, FaultKind::WatchPhase) {
                Err(info) => {
                    let info = info.with_task(task.name()).with_index(self.index);
                    self.bus
                        .publish(self.event(EventKind::WatchFailed).with_reason(info.render()));
                    self.send(TrackerUpdate::WatchError(info));
                    ctx.dispose();
                    break;
                }
                Ok(value) => {
                    let mut subs = ctx.take_watched();
                    last_ctx = Some(ctx);

                    let unchanged = previous
                        .as_ref()
                        .is_some_and(|prev| prev.eq_value(value.as_ref()));
                    if unchanged {
                        self.send(TrackerUpdate::WatchReady { changed: false });
                        self.bus
                            .publish(self.event(EventKind::WatchSettled).with_reason("unchanged"));
                    } else {
                        previous = Some(value.clone());
                        self.send(TrackerUpdate::WatchReady { changed: true });
                        self.bus.publish(self.event(EventKind::WatchSettled));
                        if !self.execute_value(&task, value).await {
                            break;
                        }
                    }

                    if !self.wait_for_change(&mut subs).await {
                        break;
                    }
                }
            }
        }

        if let Some(ctx) = last_ctx.take() {
            ctx.dispose();
        }
    }

    /// Runs the execute phase for a fresh watch value. Returns false when the
    /// phase failed and the incarnation must end.
    async fn execute_value(&self, task: &ReactiveRef, value: ValueRef) -> bool {
        self.send(TrackerUpdate::ExecuteLoading);
        self.bus.publish(self.event(EventKind::ExecuteStarting));

        let ctx = TaskContext::new(self.cancel.child_token());
        let outcome = AssertUnwindSafe(task.execute(ctx.clone(), value))
            .catch_unwind()
            .await;
        ctx.dispose();

        match flatten_phase(outcome, FaultKind::ExecutePhase) {
            Ok(()) => {
                self.send(TrackerUpdate::ExecuteReady);
                self.bus.publish(self.event(EventKind::ExecuteStopped));
                true
            }
            Err(info) => {
                let info = info.with_task(task.name()).with_index(self.index);
                self.bus
                    .publish(self.event(EventKind::ExecuteFailed).with_reason(info.render()));
                self.send(TrackerUpdate::ExecuteError(info));
                false
            }
        }
    }

    /// Waits for any watched signal to bump. Returns false on cancellation.
    async fn wait_for_change(&self, subs: &mut Vec<watch::Receiver<u64>>) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = wait_any(subs) => true,
        }
    }

    // === trigger/run =======================================================

    async fn trigger_run_loop(&self, task: TriggerRef) {
        let mut previous: Option<ValueRef> = None;
        let mut trigger_subs: Vec<watch::Receiver<u64>> = Vec::new();
        let mut run_subs: Vec<watch::Receiver<u64>> = Vec::new();
        let mut trigger_ctx: Option<TaskContext> = None;
        let mut run_ctx: Option<TaskContext> = None;

        // The initial pass is always visible.
        let mut visible = true;

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            if visible {
                self.send(TrackerUpdate::WatchLoading);
                match self
                    .evaluate_trigger(&task, &mut trigger_ctx, &mut trigger_subs)
                    .await
                {
                    None => break,
                    Some(value) => {
                        previous = Some(value);
                        self.send(TrackerUpdate::WatchReady { changed: true });
                        self.send(TrackerUpdate::ExecuteLoading);
                        self.bus.publish(self.event(EventKind::ExecuteStarting));
                        if !self.run_body(&task, &mut run_ctx, &mut run_subs).await {
                            break;
                        }
                    }
                }
            }

            match self.wait_either(&mut trigger_subs, &mut run_subs).await {
                None => break,
                Some(Fired::Trigger) => {
                    // Re-check the trigger silently; only a distinct value
                    // makes the next pass visible.
                    match self
                        .evaluate_trigger(&task, &mut trigger_ctx, &mut trigger_subs)
                        .await
                    {
                        None => break,
                        Some(value) => {
                            let unchanged = previous
                                .as_ref()
                                .is_some_and(|prev| prev.eq_value(value.as_ref()));
                            if unchanged {
                                visible = false;
                            } else {
                                previous = Some(value);
                                // Distinct trigger value: visible reload of
                                // the run body, Loading and all.
                                self.send(TrackerUpdate::WatchLoading);
                                self.send(TrackerUpdate::WatchReady { changed: true });
                                self.send(TrackerUpdate::ExecuteLoading);
                                self.bus.publish(self.event(EventKind::ExecuteStarting));
                                if !self.run_body(&task, &mut run_ctx, &mut run_subs).await {
                                    break;
                                }
                                visible = false;
                            }
                        }
                    }
                }
                Some(Fired::Run) => {
                    // Silent background refresh: the run slot stays Ready.
                    self.send(TrackerUpdate::BackgroundStarted);
                    self.bus.publish(self.event(EventKind::BackgroundRefresh));
                    if !self.run_body(&task, &mut run_ctx, &mut run_subs).await {
                        break;
                    }
                    visible = false;
                }
            }
        }

        if let Some(ctx) = trigger_ctx.take() {
            ctx.dispose();
        }
        if let Some(ctx) = run_ctx.take() {
            ctx.dispose();
        }
    }

    /// Evaluates the trigger observation, replacing its context and
    /// subscription set. Returns None when the phase failed.
    async fn evaluate_trigger(
        &self,
        task: &TriggerRef,
        trigger_ctx: &mut Option<TaskContext>,
        trigger_subs: &mut Vec<watch::Receiver<u64>>,
    ) -> Option<ValueRef> {
        if let Some(ctx) = trigger_ctx.take() {
            ctx.dispose();
        }
        self.bus.publish(self.event(EventKind::TriggerEvaluating));

        let ctx = TaskContext::new(self.cancel.child_token());
        let outcome = AssertUnwindSafe(task.trigger(ctx.clone())).catch_unwind().await;
        match flatten_phase(outcome, FaultKind::WatchPhase) {
            Ok(value) => {
                *trigger_subs = ctx.take_watched();
                *trigger_ctx = Some(ctx);
                Some(value)
            }
            Err(info) => {
                let info = info.with_task(task.name()).with_index(self.index);
                self.bus
                    .publish(self.event(EventKind::WatchFailed).with_reason(info.render()));
                self.send(TrackerUpdate::WatchError(info));
                ctx.dispose();
                None
            }
        }
    }

    /// Runs the run body, replacing its context and subscription set.
    /// Returns false when the body failed and the incarnation must end.
    async fn run_body(
        &self,
        task: &TriggerRef,
        run_ctx: &mut Option<TaskContext>,
        run_subs: &mut Vec<watch::Receiver<u64>>,
    ) -> bool {
        if let Some(ctx) = run_ctx.take() {
            ctx.dispose();
        }

        let ctx = TaskContext::new(self.cancel.child_token());
        let outcome = AssertUnwindSafe(task.run(ctx.clone())).catch_unwind().await;
        match flatten_phase(outcome, FaultKind::ExecutePhase) {
            Ok(()) => {
                *run_subs = ctx.take_watched();
                *run_ctx = Some(ctx);
                self.send(TrackerUpdate::ExecuteReady);
                self.bus.publish(self.event(EventKind::ExecuteStopped));
                true
            }
            Err(info) => {
                let info = info.with_task(task.name()).with_index(self.index);
                self.bus
                    .publish(self.event(EventKind::ExecuteFailed).with_reason(info.render()));
                self.send(TrackerUpdate::ExecuteError(info));
                ctx.dispose();
                false
            }
        }
    }

    /// Waits for either subscription set to fire. None on cancellation.
    async fn wait_either(
        &self,
        trigger_subs: &mut Vec<watch::Receiver<u64>>,
        run_subs: &mut Vec<watch::Receiver<u64>>,
    ) -> Option<Fired> {
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            fired = wait_any_of(trigger_subs, run_subs) => Some(fired),
        }
    }
}

/// Flattens a caught-panic phase outcome into the explicit error channel.
fn flatten_phase<T>(
    outcome: Result<Result<T, TaskError>, Box<dyn std::any::Any + Send>>,
    kind: FaultKind,
) -> Result<T, ErrorInfo> {
    match outcome {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => Err(ErrorInfo::capture(kind, &err)),
        Err(payload) => Err(ErrorInfo::from_panic(kind, payload)),
    }
}

/// Completes when any receiver observes a version bump. Receivers whose
/// signal was dropped are pruned; an empty set never completes.
async fn wait_any(subs: &mut Vec<watch::Receiver<u64>>) {
    loop {
        if subs.is_empty() {
            std::future::pending::<()>().await;
        }
        let futures: Vec<_> = subs.iter_mut().map(|rx| Box::pin(rx.changed())).collect();
        let (result, which, _) = select_all(futures).await;
        match result {
            Ok(()) => return,
            Err(_) => {
                subs.remove(which);
            }
        }
    }
}

/// Like [`wait_any`] over two disjoint sets, reporting which one fired.
async fn wait_any_of(
    trigger_subs: &mut Vec<watch::Receiver<u64>>,
    run_subs: &mut Vec<watch::Receiver<u64>>,
) -> Fired {
    loop {
        if trigger_subs.is_empty() && run_subs.is_empty() {
            std::future::pending::<()>().await;
        }
        let boundary = trigger_subs.len();
        let futures: Vec<_> = trigger_subs
            .iter_mut()
            .chain(run_subs.iter_mut())
            .map(|rx| Box::pin(rx.changed()))
            .collect();
        let (result, which, _) = select_all(futures).await;
        match result {
            Ok(()) => {
                return if which < boundary {
                    Fired::Trigger
                } else {
                    Fired::Run
                };
            }
            Err(_) => {
                if which < boundary {
                    trigger_subs.remove(which);
                } else {
                    run_subs.remove(which - boundary);
                }
            }
        }
    }
}
