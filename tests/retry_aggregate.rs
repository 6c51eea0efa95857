//! Retry semantics, generation guarding, and fault priority in the
//! aggregated readiness signal.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::timeout;

use bootvisor::{
    BootPlan, Event, EventKind, Orchestrator, OrchestratorConfig, ReactiveFn, ReactiveSpec,
    Readiness, Signal, Status, TaskContext, TaskError, TaskFn,
};

const WAIT: Duration = Duration::from_secs(5);

fn orchestrator() -> Orchestrator {
    Orchestrator::new(OrchestratorConfig::default(), Vec::new())
}

async fn wait_for_status(orch: &Orchestrator, status: Status) -> Readiness {
    let mut rx = orch.readiness();
    let snapshot = timeout(WAIT, rx.wait_for(|r| r.status == status))
        .await
        .expect("status wait timed out")
        .expect("readiness channel closed")
        .clone();
    snapshot
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

async fn wait_for_event(
    rx: &mut tokio::sync::broadcast::Receiver<Event>,
    kind: EventKind,
) -> Event {
    timeout(WAIT, async {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.kind == kind => return ev,
                Ok(_) => continue,
                Err(err) => panic!("event stream ended: {err}"),
            }
        }
    })
    .await
    .expect("event wait timed out")
}

#[tokio::test(start_paused = true)]
async fn retry_reruns_a_failed_batch() {
    let orch = orchestrator();
    let attempts = Arc::new(AtomicUsize::new(0));

    let counter = attempts.clone();
    let flaky = TaskFn::arc("flaky", move |_ctx: TaskContext| {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(TaskError::fail("first attempt fails"));
            }
            Ok(())
        }
    });

    orch.start(BootPlan::new().one_time(flaky)).unwrap();
    let readiness = wait_for_status(&orch, Status::Error).await;

    // Recovery goes through the handle carried inside the snapshot.
    readiness.retry.expect("retry handle present").retry().unwrap();
    wait_for_status(&orch, Status::Ready).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn retry_restarts_every_tracker() {
    let orch = orchestrator();
    let first_runs = Arc::new(AtomicUsize::new(0));
    let second_runs = Arc::new(AtomicUsize::new(0));

    let counting = |name: &'static str, runs: Arc<AtomicUsize>| {
        ReactiveFn::arc(
            name,
            move |_ctx: TaskContext| {
                let runs = runs.clone();
                async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, TaskError>(0u64)
                }
            },
            |_ctx: TaskContext, _v: u64| async move { Ok(()) },
        )
    };

    let plan = BootPlan::new()
        .reactive(ReactiveSpec::watch_execute(counting("a", first_runs.clone())))
        .reactive(ReactiveSpec::watch_execute(counting("b", second_runs.clone())));
    orch.start(plan).unwrap();
    wait_for_status(&orch, Status::Ready).await;
    assert_eq!(first_runs.load(Ordering::SeqCst), 1);
    assert_eq!(second_runs.load(Ordering::SeqCst), 1);

    orch.retry().unwrap();
    let (a, b) = (first_runs.clone(), second_runs.clone());
    wait_until(move || a.load(Ordering::SeqCst) == 2 && b.load(Ordering::SeqCst) == 2).await;
    wait_for_status(&orch, Status::Ready).await;
}

#[tokio::test(start_paused = true)]
async fn retry_leaves_a_ready_batch_alone() {
    let orch = orchestrator();
    let batch_attempts = Arc::new(AtomicUsize::new(0));
    let healed = Arc::new(AtomicBool::new(false));

    let counter = batch_attempts.clone();
    let startup = TaskFn::arc("startup", move |_ctx: TaskContext| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TaskError>(())
        }
    });

    let flag = healed.clone();
    let flaky_tracker = ReactiveFn::arc(
        "flaky",
        move |_ctx: TaskContext| {
            let flag = flag.clone();
            async move {
                if flag.load(Ordering::SeqCst) {
                    Ok(0u64)
                } else {
                    Err(TaskError::fail("tracker fault"))
                }
            }
        },
        |_ctx: TaskContext, _v: u64| async move { Ok(()) },
    );

    let plan = BootPlan::new()
        .one_time(startup)
        .reactive(ReactiveSpec::watch_execute(flaky_tracker));
    orch.start(plan).unwrap();
    wait_for_status(&orch, Status::Error).await;
    assert_eq!(batch_attempts.load(Ordering::SeqCst), 1);

    healed.store(true, Ordering::SeqCst);
    orch.retry().unwrap();
    wait_for_status(&orch, Status::Ready).await;

    // Only the errored tracker was re-run; the Ready batch kept its outcome.
    assert_eq!(batch_attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn retry_after_one_tracker_fault_restarts_both_trackers() {
    let orch = orchestrator();
    let first_runs = Arc::new(AtomicUsize::new(0));
    let second_runs = Arc::new(AtomicUsize::new(0));
    let healed = Arc::new(AtomicBool::new(false));

    let runs = first_runs.clone();
    let flag = healed.clone();
    let faulty = ReactiveFn::arc(
        "faulty",
        move |_ctx: TaskContext| {
            let runs = runs.clone();
            let flag = flag.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                if flag.load(Ordering::SeqCst) {
                    Ok(0u64)
                } else {
                    Err(TaskError::fail("fault from faulty"))
                }
            }
        },
        |_ctx: TaskContext, _v: u64| async move { Ok(()) },
    );
    let runs = second_runs.clone();
    let healthy = ReactiveFn::arc(
        "healthy",
        move |_ctx: TaskContext| {
            let runs = runs.clone();
            async move {
                runs.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TaskError>(0u64)
            }
        },
        |_ctx: TaskContext, _v: u64| async move { Ok(()) },
    );

    let plan = BootPlan::new()
        .reactive(ReactiveSpec::watch_execute(faulty))
        .reactive(ReactiveSpec::watch_execute(healthy));
    orch.start(plan).unwrap();
    wait_for_status(&orch, Status::Error).await;

    // Only tracker 0 errored, but retry rebuilds every tracker from scratch.
    healed.store(true, Ordering::SeqCst);
    orch.retry().unwrap();
    let (a, b) = (first_runs.clone(), second_runs.clone());
    wait_until(move || a.load(Ordering::SeqCst) == 2 && b.load(Ordering::SeqCst) == 2).await;
    wait_for_status(&orch, Status::Ready).await;
}

#[tokio::test(start_paused = true)]
async fn stale_completions_are_discarded_after_retry() {
    let orch = orchestrator();
    let mut events = orch.events();
    let gate = Arc::new(Notify::new());
    let released = Arc::new(AtomicBool::new(false));

    let wait_gate = gate.clone();
    let skip = released.clone();
    let task = ReactiveFn::arc(
        "gated",
        |_ctx: TaskContext| async move { Ok::<_, TaskError>(0u64) },
        move |_ctx: TaskContext, _v: u64| {
            let wait_gate = wait_gate.clone();
            let skip = skip.clone();
            async move {
                if !skip.load(Ordering::SeqCst) {
                    wait_gate.notified().await;
                }
                Ok(())
            }
        },
    );

    orch.start(BootPlan::new().reactive(ReactiveSpec::watch_execute(task)))
        .unwrap();
    wait_for_event(&mut events, EventKind::ExecuteStarting).await;
    assert_eq!(orch.readiness().borrow().status, Status::Loading);

    // Restart under a fresh generation; the new incarnation completes on its
    // own while the old one is still parked on the gate.
    released.store(true, Ordering::SeqCst);
    orch.retry().unwrap();
    wait_for_status(&orch, Status::Ready).await;

    // Release the old execute: its completion carries a stale generation and
    // must be dropped without touching the aggregate.
    gate.notify_one();
    let dropped = wait_for_event(&mut events, EventKind::StaleDropped).await;
    assert_eq!(dropped.index, Some(0));
    assert_eq!(orch.readiness().borrow().status, Status::Ready);
}

#[tokio::test(start_paused = true)]
async fn batch_fault_outranks_tracker_faults() {
    let orch = orchestrator();

    let broken_batch = TaskFn::arc("batch-broken", |_ctx: TaskContext| async move {
        Err::<(), _>(TaskError::fail("batch fault"))
    });
    let broken_tracker = ReactiveFn::arc(
        "tracker-broken",
        |_ctx: TaskContext| async move { Err::<u64, _>(TaskError::fail("tracker fault")) },
        |_ctx: TaskContext, _v: u64| async move { Ok(()) },
    );

    let plan = BootPlan::new()
        .one_time(broken_batch)
        .reactive(ReactiveSpec::watch_execute(broken_tracker));
    orch.start(plan).unwrap();

    let readiness = wait_for_status(&orch, Status::Error).await;
    let error = readiness.error.expect("error surfaced");
    assert!(error.render().contains("batch fault"));
    assert!(error.render().starts_with("OneTimeTaskFault"));
}

#[tokio::test(start_paused = true)]
async fn lowest_index_tracker_fault_wins() {
    let orch = orchestrator();
    let release = Signal::new(0u64);

    let failing = |name: &'static str, msg: &'static str| {
        let gate = release.clone();
        ReactiveFn::arc(
            name,
            move |ctx: TaskContext| {
                let gate = gate.clone();
                async move {
                    if ctx.watch(&gate) == 0 {
                        return Ok(0u64);
                    }
                    Err(TaskError::fail(msg))
                }
            },
            |_ctx: TaskContext, _v: u64| async move { Ok(()) },
        )
    };

    let plan = BootPlan::new()
        .reactive(ReactiveSpec::watch_execute(failing("a", "fault from a")))
        .reactive(ReactiveSpec::watch_execute(failing("b", "fault from b")));
    orch.start(plan).unwrap();
    wait_for_status(&orch, Status::Ready).await;

    release.set(1);
    let a_failed = orch.readiness();
    wait_until(move || a_failed.borrow().status == Status::Error).await;

    // Give both trackers time to fail, then check the surfaced fault.
    let (a, b) = (orch.readiness(), orch.readiness());
    wait_until(move || a.borrow().error.is_some()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let readiness = b.borrow().clone();
    let error = readiness.error.expect("error surfaced");
    assert!(error.render().contains("fault from a"));
    assert_eq!(error.index(), Some(0));
}

#[tokio::test(start_paused = true)]
async fn error_render_is_stable_across_reads() {
    let orch = orchestrator();
    let broken = TaskFn::arc("broken", |_ctx: TaskContext| async move {
        Err::<(), _>(TaskError::fail("render me once"))
    });

    orch.start(BootPlan::new().one_time(broken)).unwrap();
    let readiness = wait_for_status(&orch, Status::Error).await;

    let error = readiness.error.expect("error surfaced");
    let first = error.render();
    let second = error.render();
    assert!(Arc::ptr_eq(&first, &second));
}
