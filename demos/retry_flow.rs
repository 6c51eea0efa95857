//! Failure and recovery: a startup task that fails on its first attempt and
//! is retried through the handle carried in the readiness snapshot.
//!
//! Run with:
//! ```bash
//! cargo run --example retry_flow --features logging
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bootvisor::{
    BootPlan, LogWriter, Orchestrator, OrchestratorConfig, Status, Subscribe, TaskContext,
    TaskError, TaskFn,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let orchestrator = Orchestrator::new(OrchestratorConfig::default(), subs);

    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let flaky = TaskFn::arc("connect-backend", move |_ctx: TaskContext| {
        let counter = counter.clone();
        async move {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(TaskError::fail("backend unreachable"));
            }
            Ok(())
        }
    });

    orchestrator.start(BootPlan::new().one_time(flaky))?;

    let mut readiness = orchestrator.readiness();
    let snapshot = readiness
        .wait_for(|r| r.status == Status::Error)
        .await?
        .clone();
    if let Some(error) = &snapshot.error {
        println!("boot failed:\n{}", error.render());
    }

    // The snapshot carries its own retry handle.
    if let Some(retry) = snapshot.retry {
        println!("retrying...");
        retry.retry()?;
    }

    readiness.wait_for(|r| r.is_ready()).await?;
    println!(
        "== ready after {} attempts ==",
        attempts.load(Ordering::SeqCst)
    );

    orchestrator.shutdown();
    Ok(())
}
