//! Retry policy resolution.
//!
//! Raw [`RetryConfig`] values come straight from user config and may be
//! absent, negative, fractional or non-finite. [`resolve_retry_policy`]
//! folds them over a defaults layer and always produces a usable policy.

use switchyard_config::RetryConfig;

/// Attempt count used when config leaves it unset.
pub const DEFAULT_ATTEMPTS: u32 = 3;
/// Base backoff delay in milliseconds.
pub const DEFAULT_MIN_DELAY_MS: u64 = 300;
/// Backoff ceiling in milliseconds.
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Fully resolved retry parameters.
///
/// Invariants: `attempts >= 1`, `max_delay_ms >= min_delay_ms` and
/// `jitter` is within `[0.0, 1.0]`. [`resolve_retry_policy`] upholds
/// these regardless of input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first call.
    pub attempts: u32,
    /// Base delay before the first retry, in milliseconds.
    pub min_delay_ms: u64,
    /// Upper bound on any computed delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Randomization factor applied to computed delays, `0.0..=1.0`.
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            min_delay_ms: DEFAULT_MIN_DELAY_MS,
            max_delay_ms: DEFAULT_MAX_DELAY_MS,
            jitter: 0.0,
        }
    }
}

/// Merges config overrides over a defaults layer, field by field.
///
/// Invalid override values (non-finite, out of range) fall back to the
/// defaults layer rather than being clamped, so a typo in config cannot
/// silently produce a degenerate policy.
#[must_use]
pub fn resolve_retry_policy(
    defaults: Option<RetryPolicy>,
    overrides: Option<&RetryConfig>,
) -> RetryPolicy {
    let base = defaults.unwrap_or_default();

    let attempts = match overrides.and_then(|o| o.attempts) {
        Some(raw) if raw.is_finite() && raw >= 1.0 => raw.round() as u32,
        _ => base.attempts,
    };
    let min_delay_ms = match overrides.and_then(|o| o.min_delay_ms) {
        Some(raw) if raw.is_finite() && raw >= 0.0 => raw.round() as u64,
        _ => base.min_delay_ms,
    };
    let max_delay_ms = match overrides.and_then(|o| o.max_delay_ms) {
        Some(raw) if raw.is_finite() => raw.round().max(0.0) as u64,
        _ => base.max_delay_ms,
    };
    let jitter = match overrides.and_then(|o| o.jitter) {
        Some(raw) if raw.is_finite() => raw,
        _ => base.jitter,
    };

    RetryPolicy {
        attempts: attempts.max(1),
        min_delay_ms,
        max_delay_ms: max_delay_ms.max(min_delay_ms),
        jitter: jitter.clamp(0.0, 1.0),
    }
}
