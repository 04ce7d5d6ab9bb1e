//! Metric name definitions for the dispatch core.
//!
//! This crate centralizes every metric name and label key the switchyard
//! crates emit, using the `metrics` crate facade. Recording is a no-op unless
//! the embedding process installs a recorder (Prometheus exporter, test
//! harness, etc.); this core never installs one itself.
//!
//! # Usage
//!
//! ```rust,ignore
//! use switchyard_metrics::{counter, histogram, lanes};
//!
//! counter!(lanes::TASKS_ENQUEUED_TOTAL, "lane" => lane.clone()).increment(1);
//! histogram!(lanes::QUEUE_WAIT_SECONDS).record(waited.as_secs_f64());
//! ```

mod definitions;

pub use definitions::*;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
