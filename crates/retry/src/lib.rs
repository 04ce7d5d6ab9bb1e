//! Bounded retry with exponential backoff.
//!
//! [`resolve_retry_policy`] turns raw config into a valid [`RetryPolicy`];
//! [`retry`] drives an async operation under that policy with optional
//! `should_retry` / `retry_after_ms` / `on_retry` hooks.

pub mod policy;
pub mod run;

pub use {
    policy::{
        DEFAULT_ATTEMPTS, DEFAULT_MAX_DELAY_MS, DEFAULT_MIN_DELAY_MS, RetryPolicy,
        resolve_retry_policy,
    },
    run::{OnRetry, RetryAfterMs, RetryNotice, RetryOptions, ShouldRetry, retry},
};
