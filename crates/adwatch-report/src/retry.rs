use crate::error::{FetchError, RetryError};
use std::future::Future;
use std::time::Duration;

/// How long to wait between two attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// The same delay after every failed attempt.
    Fixed(Duration),
    /// `base * (attempt + 1)` after the failed `attempt` (1-based), so the
    /// request rate slows down the longer the remote side keeps failing.
    Linear(Duration),
}

impl Backoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        match *self {
            Self::Fixed(delay) => delay,
            Self::Linear(base) => base.saturating_mul(attempt.saturating_add(1)),
        }
    }
}

/// Bounded retry loop for calls into the remote reporting API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Runs `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent. Sleeps happen on the calling task only.
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if !e.is_retryable() => {
                    tracing::warn!(what, attempt, error = %e, "Non-retryable failure, giving up");
                    return Err(RetryError {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) if attempt >= max_attempts => {
                    tracing::warn!(what, attempt, error = %e, "Retries exhausted");
                    return Err(RetryError {
                        attempts: attempt,
                        source: e,
                    });
                }
                Err(e) => {
                    let delay = self.backoff.delay(attempt);
                    tracing::debug!(
                        what,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
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

    #[test]
    fn linear_backoff_grows_with_attempt() {
        let backoff = Backoff::Linear(Duration::from_secs(5));
        assert_eq!(backoff.delay(1), Duration::from_secs(10));
        assert_eq!(backoff.delay(4), Duration::from_secs(25));
    }

    #[test]
    fn fixed_backoff_is_constant() {
        let backoff = Backoff::Fixed(Duration::from_millis(250));
        assert_eq!(backoff.delay(1), backoff.delay(5));
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        let policy = RetryPolicy::new(0, Backoff::Fixed(Duration::ZERO));
        assert_eq!(policy.max_attempts, 1);
    }
}
