//! Scheduler error type.

use thiserror::Error;

/// How an enqueued task can fail to produce a value.
#[derive(Debug, Error)]
pub enum Error {
    /// The task was removed by `clear_lane` before it started.
    #[error("task cancelled before it started")]
    Cancelled,
    /// The task body panicked. The panic is contained to this one enqueue.
    #[error("task panicked: {0}")]
    Panicked(String),
    /// The task body returned an error; passed through verbatim.
    #[error(transparent)]
    Task(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
