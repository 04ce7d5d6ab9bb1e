//! Scheduler observability hooks.
//!
//! The scheduler reports lifecycle events through a [`DiagnosticsSink`] so an
//! embedding process can feed dashboards or a debug console. Events are
//! fire-and-forget: the scheduler guards every call, so a slow or panicking
//! sink can degrade observability but never scheduling.

use tracing::{trace, warn};

use crate::error::Error;

/// Receives lane lifecycle events. All methods default to no-ops so a sink
/// can subscribe to just the events it cares about.
pub trait DiagnosticsSink: Send + Sync {
    /// A task was pushed; `queue_depth` counts queued tasks including it.
    fn on_enqueue(&self, _lane: &str, _queue_depth: usize) {}

    /// A task was admitted; `queue_depth` counts tasks still queued after the
    /// pop and `active_count` the running tasks before this one starts.
    fn on_dequeue(&self, _lane: &str, _queue_depth: usize, _active_count: usize) {}

    /// A task has been queued longer than its warning threshold.
    fn on_wait_exceeded(&self, _lane: &str, _elapsed_ms: u64) {}

    /// A task failed. Not invoked for probe lanes.
    fn on_task_error(&self, _lane: &str, _error: &Error) {}
}

/// Default sink that forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDiagnostics;

impl DiagnosticsSink for TracingDiagnostics {
    fn on_enqueue(&self, lane: &str, queue_depth: usize) {
        trace!(lane, queue_depth, "lane-enqueue");
    }

    fn on_dequeue(&self, lane: &str, queue_depth: usize, active_count: usize) {
        trace!(lane, queue_depth, active_count, "lane-dequeue");
    }

    fn on_wait_exceeded(&self, lane: &str, elapsed_ms: u64) {
        warn!(lane, elapsed_ms, "lane-wait-exceeded");
    }

    fn on_task_error(&self, lane: &str, error: &Error) {
        warn!(lane, error = %error, "lane-task-error");
    }
}
