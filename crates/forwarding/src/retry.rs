//! Retry policy and execution
//!
//! Delivery retries use a fixed delay between attempts; the per-target
//! timeout bounds the whole chain, so there is no exponential growth to
//! cap.

use mcp_gateway_core::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Fixed-delay retry policy for failed deliveries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first failed attempt
    pub attempts: u32,
    /// Delay between attempts
    pub delay: Duration,
}

impl RetryPolicy {
    /// Create a fixed retry policy
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Policy that never retries
    pub fn none() -> Self {
        Self {
            attempts: 0,
            delay: Duration::ZERO,
        }
    }

    /// Total attempts including the initial one
    pub fn max_attempts(&self) -> u32 {
        self.attempts + 1
    }
}

/// Execute an operation with retry logic.
///
/// Only errors for which [`Error::is_retryable`] holds re-enter the loop;
/// anything else propagates immediately. The last transient error is
/// returned once the budget is exhausted.
pub async fn execute_with_retry<F, Fut, T>(policy: RetryPolicy, mut operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }

                attempt += 1;
                if attempt >= max_attempts {
                    return Err(err);
                }

                tracing::debug!(
                    attempt,
                    max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    "delivery attempt failed, retrying"
                );
                sleep(policy.delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<i32> =
            execute_with_retry(RetryPolicy::fixed(3, Duration::from_millis(5)), || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) + 1 < 3 {
                        Err(Error::transient("connection reset"))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_budget_returns_the_last_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<()> =
            execute_with_retry(RetryPolicy::fixed(2, Duration::from_millis(5)), || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::transient("broker unavailable"))
                }
            })
            .await;

        assert!(matches!(result, Err(Error::Transient(_))));
        // Initial attempt + 2 retries.
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_do_not_retry() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: Result<()> =
            execute_with_retry(RetryPolicy::fixed(3, Duration::from_millis(5)), || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(Error::invalid_argument("bad endpoint"))
                }
            })
            .await;

        assert!(matches!(result, Err(Error::InvalidArgument(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn zero_retry_policy_runs_once() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let _: Result<()> = execute_with_retry(RetryPolicy::none(), || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::transient("still down"))
            }
        })
        .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
