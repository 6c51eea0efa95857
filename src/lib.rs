//! # bootvisor
//!
//! **Bootvisor** is a lightweight application-readiness orchestration library
//! for Rust.
//!
//! It runs a batch of one-shot startup tasks, keeps a set of reactive tasks
//! re-running as their dependencies change, and folds everything into a single
//! `Loading` / `Ready` / `Error` readiness signal with one-call retry of
//! failed work. The crate is designed as a building block for services and
//! clients that need a well-defined "ready" moment and a recoverable "broken"
//! one.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌────────────────┐   ┌────────────────┐
//!     │   TaskRef    │   │  ReactiveSpec  │   │  ReactiveSpec  │
//!     │ (one-time)   │   │ (watch/execute)│   │ (trigger/run)  │
//!     └──────┬───────┘   └──────┬─────────┘   └──────┬─────────┘
//!            ▼                  ▼                    ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Orchestrator                                                     │
//! │  - Bus (broadcast events)                                         │
//! │  - SubscriberSet (fans out to user subscribers)                   │
//! │  - Core loop (single writer of orchestration state)               │
//! └──────┬──────────────────┬────────────────────┬────────────────────┘
//!        ▼                  ▼                    ▼
//!   ┌─────────────┐   ┌────────────────┐   ┌────────────────┐
//!   │OneTimeRunner│   │ TrackerRuntime │   │ TrackerRuntime │
//!   │ (batch)     │   │ (incarnation)  │   │ (incarnation)  │
//!   └┬────────────┘   └┬───────────────┘   └┬───────────────┘
//!    │ CoreMsg          │ CoreMsg            │ CoreMsg
//!    │ (generation-stamped, applied only when still current)
//!    ▼                  ▼                    ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Core loop: apply ──► aggregate ──► watch::Sender<Readiness>      │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Readiness lifecycle
//! ```text
//! Orchestrator::start(BootPlan)
//!
//! batch:    Loading ──► run tasks (sequential | parallel)
//!   │          ├─ all Ok ──► hold minimum duration ──► Ready
//!   │          └─ any Err/panic ──► Error (reported immediately, no hold)
//!   │
//! trackers: each reactive task loops
//!   │          ├─ watch Loading ──► value unchanged ──► settled, no execute
//!   │          ├─ watch Loading ──► fresh value ──► execute Loading ──► Ready
//!   │          ├─ dependency bump during execute ──► re-evaluate afterwards
//!   │          └─ phase Err/panic ──► Error (sticky until retry)
//!   │
//! aggregate: Error  if any phase errored (batch first, then lowest index,
//!   │                watch before execute)
//!   │        Ready  if batch Ready and every tracker settled
//!   │        Loading otherwise; background refreshes never leave Ready
//!   │
//! retry:    re-run failed batch, restart all trackers under new generations;
//!           completions from old generations are discarded
//! ```
//!
//! ## Features
//! | Area               | Description                                                           | Key types / traits                         |
//! |--------------------|-----------------------------------------------------------------------|--------------------------------------------|
//! | **Orchestration**  | Run a boot plan and observe one aggregated readiness signal.          | [`Orchestrator`], [`BootPlan`], [`Readiness`] |
//! | **One-time tasks** | Startup work, sequential or parallel, with a minimum-duration floor.  | [`TaskRef`], [`TaskFn`]                    |
//! | **Reactive tasks** | Watch/execute and trigger/run pipelines that re-run on data changes.  | [`ReactiveSpec`], [`ReactiveFn`], [`TriggerFn`] |
//! | **Signals**        | Versioned shared values that wake subscribed tasks on change.         | [`Signal`]                                 |
//! | **Faults**         | Captured once, rendered once, surfaced with stable priority.          | [`ErrorInfo`], [`FaultKind`]               |
//! | **Subscriber API** | Hook into orchestration events (logging, metrics, custom).            | [`Subscribe`]                              |
//! | **Configuration**  | Centralize execution mode, minimum duration, bus capacity.            | [`OrchestratorConfig`]                     |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use bootvisor::{
//!     BootPlan, Orchestrator, OrchestratorConfig, ReactiveFn, ReactiveSpec, Signal, TaskFn,
//! };
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut cfg = OrchestratorConfig::default();
//!     cfg.minimum_duration = Duration::from_millis(300);
//!
//!     let orchestrator = Orchestrator::new(cfg, Vec::new());
//!
//!     // One-shot startup work.
//!     let migrate = TaskFn::arc("db-migrate", |_ctx: bootvisor::TaskContext| async move {
//!         // run migrations...
//!         Ok::<_, bootvisor::TaskError>(())
//!     });
//!
//!     // A reactive pipeline: re-runs whenever `user_id` changes.
//!     let user_id = Signal::new(0u64);
//!     let watched = user_id.clone();
//!     let profile = ReactiveFn::arc(
//!         "profile",
//!         move |ctx: bootvisor::TaskContext| {
//!             let watched = watched.clone();
//!             async move { Ok::<_, bootvisor::TaskError>(ctx.watch(&watched)) }
//!         },
//!         |_ctx, id: u64| async move {
//!             println!("loading profile for {id}");
//!             Ok(())
//!         },
//!     );
//!
//!     let plan = BootPlan::new()
//!         .one_time(migrate)
//!         .reactive(ReactiveSpec::watch_execute(profile));
//!     orchestrator.start(plan)?;
//!
//!     let mut readiness = orchestrator.readiness();
//!     readiness.wait_for(|r| r.is_ready()).await?;
//!     println!("application ready");
//!
//!     user_id.set(42); // profile re-runs; readiness dips to Loading and back
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;
mod signal;
mod subscribers;
mod tasks;

// ---- Public re-exports ----

pub use self::config::{ExecutionMode, OrchestratorConfig};
pub use self::core::{
    BootPlan, Orchestrator, OrchestratorState, PhaseShape, Readiness, RetryHandle, Status,
    TrackerState,
};
pub use self::error::{ErrorInfo, FaultKind, RuntimeError, TaskError};
pub use self::events::{Bus, Event, EventKind};
pub use self::signal::Signal;
pub use self::subscribers::{Subscribe, SubscriberSet};
pub use self::tasks::{
    BoxTaskFuture, ReactiveFn, ReactiveRef, ReactiveSpec, ReactiveTask, Task, TaskContext, TaskFn,
    TaskRef, TriggerFn, TriggerRef, TriggerTask, ValueRef, WatchValue,
};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use self::subscribers::LogWriter;
