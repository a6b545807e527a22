//! Bounded retry with exponential backoff.

use crate::error::Result;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay: Duration::from_secs(1) }
    }
}

impl RetryPolicy {
    /// Delay before `attempt` (1-based retry count): base, 2x, 4x, ... capped at 32x.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay * (1u32 << (attempt.saturating_sub(1)).min(5))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// retry budget is spent. The last error is returned on exhaustion.
    pub fn run<T>(&self, mut op: impl FnMut(u32) -> Result<T>) -> Result<T> {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for(attempt);
                    tracing::warn!(attempt, delay_ms = delay.as_millis() as u64, "retrying: {err}");
                    thread::sleep(delay);
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextError;

    fn instant(max_retries: u32) -> RetryPolicy {
        RetryPolicy { max_retries, base_delay: Duration::ZERO }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy { max_retries: 10, base_delay: Duration::from_millis(10) };
        assert_eq!(policy.delay_for(1), Duration::from_millis(10));
        assert_eq!(policy.delay_for(2), Duration::from_millis(20));
        assert_eq!(policy.delay_for(4), Duration::from_millis(80));
        assert_eq!(policy.delay_for(9), Duration::from_millis(320));
    }

    #[test]
    fn transient_errors_are_retried_until_success() {
        let mut calls = 0;
        let result = instant(3).run(|_| {
            calls += 1;
            if calls < 3 {
                Err(ContextError::provider("503", true))
            } else {
                Ok(calls)
            }
        });
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn permanent_errors_fail_immediately() {
        let mut calls = 0;
        let result: Result<()> = instant(5).run(|_| {
            calls += 1;
            Err(ContextError::provider("401", false))
        });
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[test]
    fn exhaustion_returns_last_error() {
        let mut calls = 0;
        let result: Result<()> = instant(2).run(|attempt| {
            calls += 1;
            Err(ContextError::provider(format!("attempt {attempt}"), true))
        });
        assert_eq!(calls, 3);
        assert!(result.unwrap_err().to_string().contains("attempt 2"));
    }
}
