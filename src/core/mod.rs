//! Runtime core: the readiness state machine and the loops that drive it.
//!
//! The only public API from this module is the [`Orchestrator`] handle plus
//! the readiness vocabulary it publishes ([`Status`], [`Readiness`],
//! [`PhaseShape`]).
//!
//! Internal modules:
//! - [`aggregate`]: pure readiness aggregation over batch + tracker shapes;
//! - [`one_time`]: runs the startup batch (sequential or parallel, with the
//!   minimum-hold floor);
//! - [`tracker`]: per-reactive-task incarnation loops;
//! - [`orchestrator`]: the single-writer core loop and the public handle.

mod aggregate;
mod one_time;
mod orchestrator;
mod tracker;

pub use aggregate::{OrchestratorState, PhaseShape, Status, TrackerState};
pub use orchestrator::{BootPlan, Orchestrator, Readiness, RetryHandle};
