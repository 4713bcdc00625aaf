//! Bounded exponential-backoff retry around the backend operations.
//!
//! Only throttling-classified failures are retried. The decision for each
//! failed attempt is computed by [`determine_retry`], which is deterministic
//! given the error classification and attempt count; the jitter inside the
//! delay is the only randomized element.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::client::BackendError;

/// Retry parameters. The default matches the backend's published guidance:
/// 5 attempts total, delay before retry k of `min(30, 2^k + uniform(0,1))`
/// seconds.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5, base_delay_secs: 1.0, max_delay_secs: 30.0 }
    }
}

impl RetryPolicy {
    /// Backoff before retry `k` (0-indexed): exponential plus jitter, capped.
    #[must_use]
    pub fn backoff_delay(&self, retry_index: u32) -> Duration {
        let exponential = self.base_delay_secs * f64::from(2_u32.saturating_pow(retry_index));
        let jitter = rand::thread_rng().gen_range(0.0..1.0);
        Duration::from_secs_f64((exponential + jitter).min(self.max_delay_secs))
    }
}

/// Outcome of one failed attempt.
#[derive(Debug)]
pub enum RetryDecision {
    /// Sleep for the given delay, then attempt again.
    Retry { delay: Duration },
    /// Propagate the failure; no further attempts.
    Fail,
}

/// Decide what to do after attempt number `attempt` (1-indexed) failed.
#[must_use]
pub fn determine_retry(
    policy: &RetryPolicy,
    error: &BackendError,
    attempt: u32,
) -> RetryDecision {
    if error.is_throttled() && attempt < policy.max_attempts {
        RetryDecision::Retry { delay: policy.backoff_delay(attempt - 1) }
    } else {
        RetryDecision::Fail
    }
}

/// Run a backend operation under the retry policy.
///
/// The operation is a factory so each attempt issues a fresh call. Applies to
/// both the single-shot and the stream-establishing operation; once a stream
/// has begun emitting, its failures are out of scope here.
pub async fn invoke_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, BackendError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let mut attempt = 0_u32;
    loop {
        attempt += 1;
        debug!("backend attempt {}/{}", attempt, policy.max_attempts);
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => match determine_retry(&policy, &error, attempt) {
                RetryDecision::Retry { delay } => {
                    warn!(
                        "backend throttled ({}), waiting {:.2}s before attempt {}/{}",
                        error,
                        delay.as_secs_f64(),
                        attempt + 1,
                        policy.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                },
                RetryDecision::Fail => {
                    warn!("backend attempt {}/{} failed: {}", attempt, policy.max_attempts, error);
                    return Err(error);
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn throttled() -> BackendError {
        BackendError::Throttled("Too many requests".to_string())
    }

    #[test]
    fn test_backoff_delay_stays_in_documented_window() {
        let policy = RetryPolicy::default();
        for retry_index in 0..2 {
            let base = f64::from(2_u32.pow(retry_index));
            for _ in 0..50 {
                let delay = policy.backoff_delay(retry_index).as_secs_f64();
                assert!(delay >= base, "delay {} below 2^{}", delay, retry_index);
                assert!(delay < base + 1.0, "delay {} above 2^{}+1", delay, retry_index);
            }
        }
    }

    #[test]
    fn test_backoff_delay_is_capped() {
        let policy = RetryPolicy::default();
        // 2^6 = 64 would exceed the 30s cap.
        assert!(policy.backoff_delay(6).as_secs_f64() <= 30.0);
    }

    #[test]
    fn test_non_throttled_errors_never_retry() {
        let policy = RetryPolicy::default();
        let service = BackendError::Service { code: 500, message: "boom".to_string() };
        assert!(matches!(determine_retry(&policy, &service, 1), RetryDecision::Fail));
        let transport = BackendError::Transport("refused".to_string());
        assert!(matches!(determine_retry(&policy, &transport, 1), RetryDecision::Fail));
    }

    #[test]
    fn test_throttled_fails_once_attempts_exhaust() {
        let policy = RetryPolicy::default();
        assert!(matches!(determine_retry(&policy, &throttled(), 4), RetryDecision::Retry { .. }));
        assert!(matches!(determine_retry(&policy, &throttled(), 5), RetryDecision::Fail));
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy { max_attempts: 5, base_delay_secs: 0.001, max_delay_secs: 0.005 }
    }

    #[tokio::test]
    async fn test_two_throttles_then_success_uses_three_attempts() {
        let calls = AtomicU32::new(0);
        let result = invoke_with_retry(fast_policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n <= 2 {
                    Err(throttled())
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_persistent_throttling_exhausts_all_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = invoke_with_retry(fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(throttled()) }
        })
        .await;
        assert!(result.unwrap_err().is_throttled());
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_service_error_propagates_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = invoke_with_retry(fast_policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(BackendError::Service { code: 500, message: "boom".to_string() }) }
        })
        .await;
        assert!(!result.unwrap_err().is_throttled());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
