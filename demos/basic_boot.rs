//! Minimal boot flow: a couple of one-time startup tasks, one reactive
//! pipeline, and the built-in event logger.
//!
//! Run with:
//! ```bash
//! cargo run --example basic_boot --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use bootvisor::{
    BootPlan, LogWriter, Orchestrator, OrchestratorConfig, ReactiveFn, ReactiveSpec, Signal,
    Subscribe, TaskContext, TaskError, TaskFn,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cfg = OrchestratorConfig::default();
    cfg.minimum_duration = Duration::from_millis(300);

    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter)];
    let orchestrator = Orchestrator::new(cfg, subs);

    let migrate = TaskFn::arc("db-migrate", |_ctx: TaskContext| async move {
        tokio::time::sleep(Duration::from_millis(80)).await;
        Ok::<_, TaskError>(())
    });
    let warm_cache = TaskFn::arc("warm-cache", |_ctx: TaskContext| async move {
        tokio::time::sleep(Duration::from_millis(40)).await;
        Ok::<_, TaskError>(())
    });

    let user_id = Signal::new(1u64);
    let watched = user_id.clone();
    let profile = ReactiveFn::arc(
        "profile",
        move |ctx: TaskContext| {
            let watched = watched.clone();
            async move { Ok::<_, TaskError>(ctx.watch(&watched)) }
        },
        |_ctx: TaskContext, id: u64| async move {
            println!("(profile) loaded for user {id}");
            Ok(())
        },
    );

    let plan = BootPlan::new()
        .one_time(migrate)
        .one_time(warm_cache)
        .reactive(ReactiveSpec::watch_execute(profile));
    orchestrator.start(plan)?;

    let mut readiness = orchestrator.readiness();
    readiness.wait_for(|r| r.is_ready()).await?;
    println!("== application ready ==");

    // Changing the signal re-runs the profile pipeline.
    user_id.set(42);
    readiness.wait_for(|r| !r.is_ready()).await?;
    readiness.wait_for(|r| r.is_ready()).await?;
    println!("== ready again after profile reload ==");

    orchestrator.shutdown();
    Ok(())
}
