//! # Event subscribers for the bootvisor orchestrator.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out,
//! and a built-in logging subscriber for orchestration events published on the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   core loop / trackers ── publish(Event) ──► Bus ──► listener ──► SubscriberSet
//!                                                                      │
//!                                                       ┌──────────────┼─────────┐
//!                                                       ▼              ▼         ▼
//!                                                   LogWriter       Metrics   Custom
//!                                                   (bounded queue + worker each)
//! ```
//!
//! ## Implementing custom subscribers
//! ```no_run
//! use bootvisor::{Subscribe, Event, EventKind};
//! use async_trait::async_trait;
//!
//! struct MetricsSubscriber;
//!
//! #[async_trait]
//! impl Subscribe for MetricsSubscriber {
//!     async fn on_event(&self, event: &Event) {
//!         match event.kind {
//!             EventKind::ExecuteFailed => {
//!                 // increment failure counter
//!             }
//!             _ => {}
//!         }
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod subscribe;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscribe::Subscribe;
pub use subscriber_set::SubscriberSet;
