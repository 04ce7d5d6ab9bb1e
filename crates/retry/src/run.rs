//! Async retry executor.
//!
//! Wraps an operation in a bounded retry loop with exponential backoff.
//! The operation's final error passes through unchanged, so callers can
//! still downcast or match on it after the retries are spent.

use std::{future::Future, sync::Arc, time::Duration};

use {anyhow::Result, rand::Rng, tracing::debug};

use crate::policy::RetryPolicy;

/// Decides whether a failed attempt should be retried.
///
/// Receives the error and the 1-based attempt number that just failed.
/// Only consulted while attempts remain; the final failure is returned
/// without asking.
pub type ShouldRetry = Arc<dyn Fn(&anyhow::Error, u32) -> bool + Send + Sync>;

/// Extracts a server-provided delay hint from an error, in milliseconds.
///
/// A positive hint replaces the computed backoff verbatim; `None` or a
/// zero hint falls back to the backoff schedule.
pub type RetryAfterMs = Arc<dyn Fn(&anyhow::Error) -> Option<u64> + Send + Sync>;

/// Observer invoked before each backoff sleep.
pub type OnRetry = Arc<dyn Fn(&RetryNotice<'_>) + Send + Sync>;

/// Snapshot handed to [`OnRetry`] before sleeping.
#[derive(Debug)]
pub struct RetryNotice<'a> {
    /// 1-based attempt number that just failed.
    pub attempt: u32,
    /// Total attempts the policy allows.
    pub max_attempts: u32,
    /// Delay about to be slept, in milliseconds.
    pub delay_ms: u64,
    /// Label from [`RetryOptions`], if any.
    pub label: Option<&'a str>,
    /// The error that triggered this retry.
    pub error: &'a anyhow::Error,
}

/// Optional hooks and labeling for a [`retry`] call.
#[derive(Clone, Default)]
pub struct RetryOptions {
    /// Human-readable operation name carried into notices and logs.
    pub label: Option<String>,
    /// Classifier for retryable errors. Unset means retry everything.
    pub should_retry: Option<ShouldRetry>,
    /// Delay hint extractor, e.g. for `Retry-After` style errors.
    pub retry_after_ms: Option<RetryAfterMs>,
    /// Called once per retry, before the sleep.
    pub on_retry: Option<OnRetry>,
}

impl RetryOptions {
    /// Options with only a label set.
    #[must_use]
    pub fn labeled(label: impl Into<String>) -> Self {
        Self { label: Some(label.into()), ..Self::default() }
    }
}

/// Runs `operation` until it succeeds or the policy's attempts are spent.
///
/// Returns the first `Ok` value, or the last error unchanged once
/// attempts are exhausted or `should_retry` declines.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    options: &RetryOptions,
    mut operation: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.attempts.max(1);
    #[cfg(feature = "metrics")]
    switchyard_metrics::counter!(switchyard_metrics::retry::OPERATIONS_TOTAL).increment(1);

    let mut attempt = 0u32;
    loop {
        attempt += 1;
        #[cfg(feature = "metrics")]
        switchyard_metrics::counter!(switchyard_metrics::retry::ATTEMPTS_TOTAL).increment(1);

        let err = match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if attempt >= max_attempts {
            #[cfg(feature = "metrics")]
            switchyard_metrics::counter!(switchyard_metrics::retry::EXHAUSTED_TOTAL).increment(1);
            return Err(err);
        }
        if let Some(should_retry) = &options.should_retry
            && !should_retry(&err, attempt)
        {
            return Err(err);
        }

        let hint = options.retry_after_ms.as_ref().and_then(|f| f(&err));
        let delay_ms = next_delay_ms(policy, attempt, hint);

        if let Some(on_retry) = &options.on_retry {
            on_retry(&RetryNotice {
                attempt,
                max_attempts,
                delay_ms,
                label: options.label.as_deref(),
                error: &err,
            });
        }
        debug!(
            attempt,
            max_attempts,
            delay_ms,
            label = options.label.as_deref().unwrap_or_default(),
            error = %err,
            "attempt failed; backing off"
        );
        #[cfg(feature = "metrics")]
        switchyard_metrics::histogram!(switchyard_metrics::retry::BACKOFF_SECONDS)
            .record(delay_ms as f64 / 1000.0);

        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }
}

/// Delay before the retry that follows `attempt` (1-based).
///
/// A positive hint wins verbatim. Otherwise the backoff doubles per
/// attempt from `min_delay_ms`, is capped at `max_delay_ms` and only
/// then randomized by the jitter factor.
fn next_delay_ms(policy: &RetryPolicy, attempt: u32, hint: Option<u64>) -> u64 {
    if let Some(ms) = hint
        && ms > 0
    {
        return ms;
    }
    let exponent = attempt.saturating_sub(1).min(63);
    let backoff =
        (u128::from(policy.min_delay_ms) << exponent).min(u128::from(policy.max_delay_ms)) as u64;
    if policy.jitter <= 0.0 {
        return backoff;
    }
    let factor = rand::rng().random_range((1.0 - policy.jitter)..=(1.0 + policy.jitter));
    (backoff as f64 * factor).round() as u64
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use anyhow::anyhow;

    use super::*;

    fn fast() -> RetryPolicy {
        RetryPolicy { attempts: 3, min_delay_ms: 0, max_delay_ms: 0, jitter: 0.0 }
    }

    #[tokio::test]
    async fn returns_first_success_without_retrying() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let out = retry(&fast(), &RetryOptions::default(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, anyhow::Error>("ok")
            }
        })
        .await
        .unwrap();
        assert_eq!(out, "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let policy = RetryPolicy { attempts: 5, ..fast() };
        let out = retry(&policy, &RetryOptions::default(), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(anyhow!("transient"))
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(out, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_the_original_error() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let err = retry(&fast(), &RetryOptions::default(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow!("still broken"))
            }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.to_string(), "still broken");
    }

    #[tokio::test]
    async fn single_attempt_never_retries() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let policy = RetryPolicy { attempts: 1, ..fast() };
        let err = retry(&policy, &RetryOptions::default(), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(anyhow!("boom"))
            }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.to_string(), "boom");
    }

    #[tokio::test]
    async fn should_retry_false_stops_early() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let policy = RetryPolicy { attempts: 5, ..fast() };
        let options = RetryOptions {
            should_retry: Some(Arc::new(|err, _attempt| {
                !err.to_string().contains("fatal")
            })),
            ..RetryOptions::default()
        };
        let err = retry(&policy, &options, move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err::<(), _>(anyhow!("transient"))
                } else {
                    Err(anyhow!("fatal: bad request"))
                }
            }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(err.to_string(), "fatal: bad request");
    }

    #[tokio::test]
    async fn should_retry_is_not_consulted_after_the_final_attempt() {
        let consulted = Arc::new(AtomicUsize::new(0));
        let seen = consulted.clone();
        let options = RetryOptions {
            should_retry: Some(Arc::new(move |_err, _attempt| {
                seen.fetch_add(1, Ordering::SeqCst);
                true
            })),
            ..RetryOptions::default()
        };
        let _ = retry(&fast(), &options, || async {
            Err::<(), _>(anyhow!("nope"))
        })
        .await;
        // 3 attempts, but only the first two failures can lead to a retry.
        assert_eq!(consulted.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn on_retry_sees_each_backoff() {
        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = notices.clone();
        let policy = RetryPolicy { attempts: 5, min_delay_ms: 1, max_delay_ms: 4, jitter: 0.0 };
        let options = RetryOptions {
            label: Some("probe".into()),
            on_retry: Some(Arc::new(move |notice: &RetryNotice<'_>| {
                assert_eq!(notice.label, Some("probe"));
                assert_eq!(notice.max_attempts, 5);
                sink.lock().unwrap().push((notice.attempt, notice.delay_ms));
            })),
            ..RetryOptions::default()
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        retry(&policy, &options, move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(anyhow!("transient"))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();
        // Doubling from the base, capped at the ceiling.
        assert_eq!(*notices.lock().unwrap(), vec![(1, 1), (2, 2), (3, 4)]);
    }

    #[tokio::test]
    async fn retry_after_hint_overrides_backoff() {
        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = notices.clone();
        let policy = RetryPolicy { attempts: 2, min_delay_ms: 1, max_delay_ms: 1, jitter: 0.0 };
        let options = RetryOptions {
            retry_after_ms: Some(Arc::new(|_err| Some(7))),
            on_retry: Some(Arc::new(move |notice: &RetryNotice<'_>| {
                sink.lock().unwrap().push(notice.delay_ms);
            })),
            ..RetryOptions::default()
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        retry(&policy, &options, move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(anyhow!("wait"))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(*notices.lock().unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn zero_hint_falls_back_to_backoff() {
        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = notices.clone();
        let policy = RetryPolicy { attempts: 2, min_delay_ms: 5, max_delay_ms: 5, jitter: 0.0 };
        let options = RetryOptions {
            retry_after_ms: Some(Arc::new(|_err| Some(0))),
            on_retry: Some(Arc::new(move |notice: &RetryNotice<'_>| {
                sink.lock().unwrap().push(notice.delay_ms);
            })),
            ..RetryOptions::default()
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        retry(&policy, &options, move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(anyhow!("wait"))
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(*notices.lock().unwrap(), vec![5]);
    }

    #[tokio::test]
    async fn jitter_stays_within_the_spread() {
        let policy = RetryPolicy { attempts: 2, min_delay_ms: 100, max_delay_ms: 100, jitter: 0.5 };
        for _ in 0..20 {
            let delay = next_delay_ms(&policy, 1, None);
            assert!((50..=150).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn backoff_caps_before_jitter() {
        let policy =
            RetryPolicy { attempts: 10, min_delay_ms: 100, max_delay_ms: 150, jitter: 0.0 };
        assert_eq!(next_delay_ms(&policy, 1, None), 100);
        assert_eq!(next_delay_ms(&policy, 2, None), 150);
        assert_eq!(next_delay_ms(&policy, 3, None), 150);
        assert_eq!(next_delay_ms(&policy, 63, None), 150);
    }
}
