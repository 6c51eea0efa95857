//! Batch behavior: ordering, overlap, the minimum-duration floor, and the
//! immediate error path.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{timeout, Instant};

use bootvisor::{
    BootPlan, ExecutionMode, Orchestrator, OrchestratorConfig, Readiness, Status, TaskContext,
    TaskError, TaskFn, TaskRef,
};

const WAIT: Duration = Duration::from_secs(5);

fn orchestrator(mode: ExecutionMode, minimum: Duration) -> Orchestrator {
    let cfg = OrchestratorConfig {
        execution_mode: mode,
        minimum_duration: minimum,
        ..OrchestratorConfig::default()
    };
    Orchestrator::new(cfg, Vec::new())
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

/// Records begin/end marks so ordering tests can assert interleaving.
fn marked_task(
    name: &'static str,
    index: usize,
    pause: Duration,
    log: Arc<Mutex<Vec<(usize, &'static str)>>>,
) -> TaskRef {
    TaskFn::arc(name, move |_ctx: TaskContext| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push((index, "begin"));
            tokio::time::sleep(pause).await;
            log.lock().unwrap().push((index, "end"));
            Ok::<_, TaskError>(())
        }
    })
}

#[tokio::test(start_paused = true)]
async fn sequential_tasks_never_overlap() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let orch = orchestrator(ExecutionMode::Sequential, Duration::ZERO);

    let plan = BootPlan::new()
        .one_time(marked_task("a", 0, Duration::from_millis(20), log.clone()))
        .one_time(marked_task("b", 1, Duration::from_millis(20), log.clone()));
    orch.start(plan).unwrap();
    wait_for_status(&orch, Status::Ready).await;

    let log = log.lock().unwrap();
    assert_eq!(
        *log,
        vec![(0, "begin"), (0, "end"), (1, "begin"), (1, "end")]
    );
}

#[tokio::test(start_paused = true)]
async fn parallel_tasks_run_concurrently() {
    // Each task completes only after the other has started; sequential
    // execution would deadlock here.
    let first = Arc::new(Notify::new());
    let second = Arc::new(Notify::new());
    let orch = orchestrator(ExecutionMode::Parallel, Duration::ZERO);

    let (a, b) = (first.clone(), second.clone());
    let task_a = TaskFn::arc("a", move |_ctx: TaskContext| {
        let (a, b) = (a.clone(), b.clone());
        async move {
            a.notify_one();
            b.notified().await;
            Ok::<_, TaskError>(())
        }
    });
    let (a, b) = (first.clone(), second.clone());
    let task_b = TaskFn::arc("b", move |_ctx: TaskContext| {
        let (a, b) = (a.clone(), b.clone());
        async move {
            b.notify_one();
            a.notified().await;
            Ok::<_, TaskError>(())
        }
    });

    orch.start(BootPlan::new().one_time(task_a).one_time(task_b))
        .unwrap();
    wait_for_status(&orch, Status::Ready).await;
}

#[tokio::test(start_paused = true)]
async fn parallel_completions_resolve_in_finish_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let orch = orchestrator(ExecutionMode::Parallel, Duration::ZERO);

    let plan = BootPlan::new()
        .one_time(marked_task("slow", 0, Duration::from_millis(100), log.clone()))
        .one_time(marked_task("fast", 1, Duration::from_millis(10), log.clone()));
    orch.start(plan).unwrap();
    wait_for_status(&orch, Status::Ready).await;

    let ends: Vec<usize> = log
        .lock()
        .unwrap()
        .iter()
        .filter(|(_, mark)| *mark == "end")
        .map(|(i, _)| *i)
        .collect();
    assert_eq!(ends, vec![1, 0]);
}

#[tokio::test(start_paused = true)]
async fn ready_is_held_for_minimum_duration() {
    let orch = orchestrator(ExecutionMode::Parallel, Duration::from_millis(150));
    let noop = TaskFn::arc("noop", |_ctx: TaskContext| async move {
        Ok::<_, TaskError>(())
    });

    let started = Instant::now();
    orch.start(BootPlan::new().one_time(noop)).unwrap();
    wait_for_status(&orch, Status::Ready).await;

    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test(start_paused = true)]
async fn failure_skips_the_minimum_duration_floor() {
    let orch = orchestrator(ExecutionMode::Sequential, Duration::from_secs(30));
    let broken = TaskFn::arc("broken", |_ctx: TaskContext| async move {
        Err::<(), _>(TaskError::fail("connection refused"))
    });

    let started = Instant::now();
    orch.start(BootPlan::new().one_time(broken)).unwrap();
    let readiness = wait_for_status(&orch, Status::Error).await;

    assert!(started.elapsed() < Duration::from_secs(30));
    let error = readiness.error.expect("error must be surfaced");
    assert!(error.render().starts_with("OneTimeTaskFault"));
    assert!(error.render().contains("connection refused"));
    assert!(readiness.retry.is_some());
}

#[tokio::test(start_paused = true)]
async fn panicking_task_fails_the_batch() {
    let orch = orchestrator(ExecutionMode::Sequential, Duration::ZERO);
    let bomb = TaskFn::arc("bomb", |_ctx: TaskContext| async move {
        panic!("boom");
        #[allow(unreachable_code)]
        Ok::<_, TaskError>(())
    });

    orch.start(BootPlan::new().one_time(bomb)).unwrap();
    let readiness = wait_for_status(&orch, Status::Error).await;

    let error = readiness.error.expect("panic must surface as an error");
    assert!(error.render().contains("boom"));
}

#[tokio::test(start_paused = true)]
async fn sequential_failure_skips_later_tasks() {
    let ran = Arc::new(AtomicUsize::new(0));
    let orch = orchestrator(ExecutionMode::Sequential, Duration::ZERO);

    let broken = TaskFn::arc("broken", |_ctx: TaskContext| async move {
        Err::<(), _>(TaskError::fail("nope"))
    });
    let counter = ran.clone();
    let later = TaskFn::arc("later", move |_ctx: TaskContext| {
        let counter = counter.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok::<_, TaskError>(())
        }
    });

    orch.start(BootPlan::new().one_time(broken).one_time(later))
        .unwrap();
    wait_for_status(&orch, Status::Error).await;

    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_plan_resolves_ready() {
    let orch = orchestrator(ExecutionMode::Parallel, Duration::ZERO);
    orch.start(BootPlan::new()).unwrap();
    wait_for_status(&orch, Status::Ready).await;
}

#[tokio::test(start_paused = true)]
async fn empty_plan_still_holds_the_minimum_duration() {
    let orch = orchestrator(ExecutionMode::Parallel, Duration::from_millis(150));

    let started = Instant::now();
    orch.start(BootPlan::new()).unwrap();
    wait_for_status(&orch, Status::Ready).await;

    assert!(started.elapsed() >= Duration::from_millis(150));
}

#[tokio::test(start_paused = true)]
async fn start_twice_is_rejected() {
    let orch = orchestrator(ExecutionMode::Parallel, Duration::ZERO);
    orch.start(BootPlan::new()).unwrap();
    assert!(orch.start(BootPlan::new()).is_err());
}
