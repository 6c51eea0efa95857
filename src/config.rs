//! # Global orchestrator configuration.
//!
//! [`OrchestratorConfig`] defines how the readiness orchestrator behaves:
//! execution mode of the one-time batch, the minimum-display-duration floor,
//! and event bus capacity.
//!
//! # Example
//! ```
//! use std::time::Duration;
//! use bootvisor::{ExecutionMode, OrchestratorConfig};
//!
//! let mut cfg = OrchestratorConfig::default();
//! cfg.execution_mode = ExecutionMode::Sequential;
//! cfg.minimum_duration = Duration::from_millis(150);
//!
//! assert_eq!(cfg.bus_capacity, 1024);
//! ```

use std::time::Duration;

/// How the one-time task batch is executed.
///
/// Governs only the one-time batch; reactive tasks always run independently.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Tasks execute strictly in list order; a failure aborts the batch and
    /// no subsequent task starts.
    Sequential,
    /// All tasks are started without waiting for one another; the first
    /// observed failure fails the batch (already-started siblings continue).
    #[default]
    Parallel,
}

/// Global configuration for the readiness orchestrator.
#[derive(Clone, Debug)]
pub struct OrchestratorConfig {
    /// Execution mode for the one-time batch.
    pub execution_mode: ExecutionMode,
    /// Minimum total duration of the one-time batch, measured from batch
    /// start. Applies to the success path only; a failed batch reports its
    /// error immediately.
    pub minimum_duration: Duration,
    /// Capacity of the event bus channel.
    pub bus_capacity: usize,
}

impl Default for OrchestratorConfig {
    /// Provides a default configuration:
    /// - `execution_mode = Parallel`
    /// - `minimum_duration = 0s` (no floor)
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            execution_mode: ExecutionMode::default(),
            minimum_duration: Duration::ZERO,
            bus_capacity: 1024,
        }
    }
}
