//! Retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::error::TransportError;

/// Retry policy shared by every upstream call.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
    /// Initial backoff, doubled each attempt.
    pub base_delay: Duration,
    /// Backoff cap before jitter.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff before re-running `attempt` (0-based):
    /// `min(base * 2^attempt, max_delay) * (0.5 + uniform(0, 1))`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let capped = self.capped_delay(attempt);
        let jitter = 0.5 + rand::thread_rng().gen::<f64>();
        capped.mul_f64(jitter)
    }

    fn capped_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        exp.min(self.max_delay)
    }

    /// Inclusive bounds on the jittered delay for `attempt`.
    pub fn delay_bounds(&self, attempt: u32) -> (Duration, Duration) {
        let capped = self.capped_delay(attempt);
        (capped.mul_f64(0.5), capped.mul_f64(1.5))
    }
}

/// Run `operation` with the retry policy applied to transient failures.
///
/// Non-transient errors propagate on the spot; callers see either the
/// result or the final error after exhaustion, never the retry mechanics.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, TransportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < policy.max_retries => {
                let delay = policy.backoff_delay(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max = policy.max_retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                if err.is_transient() {
                    tracing::warn!(
                        operation = operation_name,
                        attempts = attempt + 1,
                        "giving up after retries"
                    );
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(8),
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let result = with_retry(&fast_policy(), "test", move || {
            let calls = calls_in.clone();
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(TransportError::Status { status: 429, body: String::new() })
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_at_most_four_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let result: Result<(), _> = with_retry(&fast_policy(), "test", move || {
            let calls = calls_in.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Timeout("slow".into()))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_in = calls.clone();
        let result: Result<(), _> = with_retry(&fast_policy(), "test", move || {
            let calls = calls_in.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TransportError::Status { status: 401, body: "nope".into() })
            }
        })
        .await;
        assert!(matches!(result, Err(TransportError::Status { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_delay_within_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 0..4 {
            let (lo, hi) = policy.delay_bounds(attempt);
            for _ in 0..20 {
                let d = policy.backoff_delay(attempt);
                assert!(d >= lo && d <= hi, "attempt {attempt}: {d:?} not in [{lo:?}, {hi:?}]");
            }
        }
    }

    #[test]
    fn test_backoff_caps_at_max_delay() {
        let policy = RetryPolicy::default();
        let (_, hi) = policy.delay_bounds(10);
        assert!(hi <= Duration::from_secs(45)); // 30s cap * 1.5 jitter
    }
}
