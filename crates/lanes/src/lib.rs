//! Per-lane task scheduling.
//!
//! A lane is a named FIFO queue with its own concurrency ceiling. Channel
//! deliveries, probes, and background jobs each get a lane so that work for
//! one conversation never reorders and slow channels never starve fast ones.

pub mod diagnostics;
pub mod error;
pub mod scheduler;

pub use {
    diagnostics::{DiagnosticsSink, TracingDiagnostics},
    error::{Error, Result},
    scheduler::{EnqueueOptions, LaneScheduler, MAIN_LANE, is_probe_lane},
};
