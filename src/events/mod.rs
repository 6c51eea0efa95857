//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the orchestrator core loop,
//! the one-time batch runner, tracker incarnations, and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] — event classification and payload metadata
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `OneTimeRunner`, tracker incarnations, the core loop,
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the orchestrator's subscriber listener (fans out to
//!   `SubscriberSet`) and any receiver obtained via `Orchestrator::events()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
