//! Bounded retry with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;

use super::StageResult;

/// Retry budget for one pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Zero is treated as one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            max_delay,
        }
    }

    /// A policy that never sleeps between attempts.
    pub fn immediate(max_attempts: u32) -> Self {
        Self::new(max_attempts, Duration::ZERO, Duration::ZERO)
    }

    /// Backoff before retry number `retry` (0-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.checked_pow(retry).unwrap_or(u32::MAX);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Backoff plus uniform jitter in `[0, backoff / 2]`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let backoff = self.backoff(retry);
        let half = u64::try_from(backoff.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter = rand::rng().random_range(0..=half);
        backoff + Duration::from_millis(jitter)
    }
}

/// Result of driving a stage under a [`RetryPolicy`].
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome<T> {
    Completed(T),
    /// The stage gave up; the caller should fall back. Carries the last reason.
    Degraded(String),
    Cancelled,
}

/// Run `attempt` until it succeeds, fails fatally, or the budget runs out.
///
/// Cancellation is observed both while an attempt is in flight and while
/// sleeping between attempts, and takes priority over a ready result. No
/// timer is armed unless an attempt is retried, so strategies that never
/// return `Retriable` can be driven without a tokio runtime.
pub async fn run_with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    stage: &str,
    mut attempt: F,
) -> StageOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StageResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_reason = String::new();

    for n in 0..max_attempts {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return StageOutcome::Cancelled,
            r = attempt() => r,
        };

        match result {
            StageResult::Ok(value) => return StageOutcome::Completed(value),
            StageResult::Fatal(reason) => {
                tracing::warn!(stage, %reason, "non-retriable failure");
                return StageOutcome::Degraded(reason);
            }
            StageResult::Retriable(reason) => {
                tracing::debug!(stage, attempt = n + 1, %reason, "retriable failure");
                last_reason = reason;
            }
        }

        if n + 1 < max_attempts {
            let delay = policy.delay_for(n);
            tokio::select! {
                biased;
                () = cancel.cancelled() => return StageOutcome::Cancelled,
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    tracing::warn!(stage, attempts = max_attempts, reason = %last_reason, "retries exhausted");
    StageOutcome::Degraded(last_reason)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(350));
        assert_eq!(policy.backoff(40), Duration::from_millis(350));
    }

    #[test]
    fn jitter_stays_within_half_the_backoff() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), Duration::from_secs(1));
        for _ in 0..50 {
            let d = policy.delay_for(1);
            assert!(d >= Duration::from_millis(200) && d <= Duration::from_millis(300));
        }
    }

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let outcome = run_with_retry(
            &RetryPolicy::immediate(3),
            &CancellationToken::new(),
            "test",
            || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    StageResult::Retriable("flaky".into())
                } else {
                    StageResult::Ok(42)
                }
            },
        )
        .await;
        assert_eq!(outcome, StageOutcome::Completed(42));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let outcome: StageOutcome<()> = run_with_retry(
            &RetryPolicy::immediate(2),
            &CancellationToken::new(),
            "test",
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                StageResult::Retriable("still broken".into())
            },
        )
        .await;
        assert_eq!(outcome, StageOutcome::Degraded("still broken".into()));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fatal_stops_immediately() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let outcome: StageOutcome<()> = run_with_retry(
            &RetryPolicy::immediate(5),
            &CancellationToken::new(),
            "test",
            || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                StageResult::Fatal("bad key".into())
            },
        )
        .await;
        assert_eq!(outcome, StageOutcome::Degraded("bad key".into()));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome: StageOutcome<()> =
            run_with_retry(&RetryPolicy::immediate(3), &cancel, "test", || async {
                std::future::pending::<StageResult<()>>().await
            })
            .await;
        assert_eq!(outcome, StageOutcome::Cancelled);
    }
}
