//! Retry Engine (spec §4.3): wraps one adapter's unary call with bounded
//! retry attempts, exact-string retryable classification, and one of three
//! backoff shapes. Streaming calls never go through this engine — retrying
//! mid-stream would duplicate tokens (spec §4.3, last paragraph).

use crate::config::{BackoffStrategy, RetryPolicy};
use crate::error::{AdapterError, DispatchError};
use crate::types::Response;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Error strings retried even when the caller's [`RetryPolicy`] doesn't list
/// them (spec §4.3).
const DEFAULT_RETRYABLE_ERRORS: [&str; 4] =
    ["rate limit exceeded", "timeout", "connection refused", "network error"];

const BASE_DELAY: Duration = Duration::from_secs(1);
/// Exponential backoff is capped at this many multiples of `BASE_DELAY`.
const EXPONENTIAL_CAP: u64 = 60;

/// `retry_key` is the unwrapped vendor-facing message (what the default set
/// matches against); `display` is this error's full `Display`, including its
/// `thiserror` prefix (what a caller's own [`RetryPolicy::retryable_errors`]
/// entries match against, since those are written against whatever string a
/// caller actually observed — typically the full rendered error).
fn is_retryable(retry_key: &str, display: &str, custom: &[String]) -> bool {
    custom.iter().any(|s| s == retry_key || s == display)
        || DEFAULT_RETRYABLE_ERRORS.contains(&retry_key)
}

/// `attempt` is 1-indexed. Exponential: `1s * min(2^(attempt-1), 60)`.
/// Linear: `1s * attempt`. Fixed: `1s`.
fn backoff_delay(strategy: BackoffStrategy, attempt: u32) -> Duration {
    match strategy {
        BackoffStrategy::Exponential => {
            let exponent = attempt.saturating_sub(1).min(63);
            let multiplier = 1u64.checked_shl(exponent).unwrap_or(u64::MAX).min(EXPONENTIAL_CAP);
            BASE_DELAY * multiplier as u32
        }
        BackoffStrategy::Linear => BASE_DELAY * attempt,
        BackoffStrategy::Fixed => BASE_DELAY,
    }
}

/// Wraps a single adapter call with the bounded-retry contract from spec §4.3.
pub struct RetryEngine<'a> {
    policy: &'a RetryPolicy,
}

impl<'a> RetryEngine<'a> {
    pub fn new(policy: &'a RetryPolicy) -> Self {
        Self { policy }
    }

    /// Runs `call` up to `policy.max_retries + 1` times. `vendor` names the
    /// adapter being called, used only to annotate the final error.
    pub async fn run<F, Fut>(
        &self,
        vendor: &'static str,
        cancel: &CancellationToken,
        mut call: F,
    ) -> Result<Response, DispatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Response, AdapterError>>,
    {
        let attempts = self.policy.max_retries + 1;
        let mut attempt = 1;
        loop {
            match call().await {
                Ok(response) => return Ok(response),
                Err(err) => {
                    let retry_key = err.retry_key();
                    let display = err.to_string();
                    let retryable = is_retryable(&retry_key, &display, &self.policy.retryable_errors);
                    let dispatch_err: DispatchError = (vendor, err).into();

                    if !retryable || attempt >= attempts {
                        return Err(DispatchError::AllAttemptsFailed(Box::new(dispatch_err)));
                    }

                    let delay = backoff_delay(self.policy.backoff_strategy, attempt);
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = cancel.cancelled() => return Err(DispatchError::Canceled),
                    }
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackoffStrategy;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    #[test]
    fn exponential_backoff_matches_spec_table() {
        assert_eq!(backoff_delay(BackoffStrategy::Exponential, 1), Duration::from_secs(1));
        assert_eq!(backoff_delay(BackoffStrategy::Exponential, 2), Duration::from_secs(2));
        assert_eq!(backoff_delay(BackoffStrategy::Exponential, 3), Duration::from_secs(4));
    }

    #[test]
    fn exponential_backoff_caps_at_sixty_seconds() {
        assert_eq!(backoff_delay(BackoffStrategy::Exponential, 10), Duration::from_secs(60));
        assert_eq!(backoff_delay(BackoffStrategy::Exponential, 60), Duration::from_secs(60));
    }

    #[test]
    fn linear_and_fixed_backoff() {
        assert_eq!(backoff_delay(BackoffStrategy::Linear, 3), Duration::from_secs(3));
        assert_eq!(backoff_delay(BackoffStrategy::Fixed, 5), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn max_retries_zero_means_exactly_one_attempt_no_sleep() {
        let policy = RetryPolicy::new(0, BackoffStrategy::Exponential);
        let engine = RetryEngine::new(&policy);
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let started = Instant::now();
        let result = engine
            .run("openai", &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AdapterError::Timeout) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn retry_succeeds_on_second_attempt() {
        let policy = RetryPolicy::new(2, BackoffStrategy::Fixed);
        let engine = RetryEngine::new(&policy);
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = engine
            .run("openai", &cancel, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(AdapterError::Transport("timeout".into()))
                    } else {
                        Ok(Response {
                            content: "hi".into(),
                            model: "gpt-3.5-turbo".into(),
                            vendor: "openai".into(),
                            usage: Default::default(),
                            finish_reason: "stop".into(),
                            created_at: chrono::Utc::now(),
                            estimated_cost: 0.0,
                        })
                    }
                }
            })
            .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_error_short_circuits() {
        let policy = RetryPolicy::new(3, BackoffStrategy::Fixed);
        let engine = RetryEngine::new(&policy);
        let calls = AtomicU32::new(0);
        let cancel = CancellationToken::new();

        let result = engine
            .run("openai", &cancel, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AdapterError::InvalidRequest("bad request".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancellation_during_backoff_returns_promptly() {
        let policy = RetryPolicy::new(3, BackoffStrategy::Exponential);
        let engine = RetryEngine::new(&policy);
        let cancel = CancellationToken::new();
        let cancel_clone = cancel.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel_clone.cancel();
        });

        let started = Instant::now();
        let result = engine
            .run("openai", &cancel, || async { Err(AdapterError::Timeout) })
            .await;

        assert!(matches!(result, Err(DispatchError::Canceled)));
        assert!(started.elapsed() < Duration::from_millis(900));
    }
}
