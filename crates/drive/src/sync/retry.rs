//! Bounded exponential backoff for remote calls

use log::warn;
use std::fmt::Display;
use std::time::Duration;

use crate::error::Retryable;

/// How often and how patiently to retry transient failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry
    pub base_delay: Duration,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Try once, never retry
    pub fn none() -> Self {
        Self::immediate(1)
    }

    /// Retry without sleeping in between
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0 = first retry)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Run `op`, retrying transient errors until attempts run out
    ///
    /// Non-transient errors are returned immediately.
    pub fn run<T, E, F>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        E: Retryable + Display,
        F: FnMut() -> Result<T, E>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt + 1 < attempts => {
                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation,
                        attempt + 1,
                        attempts,
                        err,
                        delay
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay + Duration::from_millis(rand_jitter()));
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Generate a random jitter value (0-100ms)
fn rand_jitter() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let hasher = RandomState::new().build_hasher();
    hasher.finish() % 100
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use std::cell::Cell;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(4));
        assert_eq!(policy.delay_for(1), Duration::from_secs(8));
        assert_eq!(policy.delay_for(2), Duration::from_secs(10));
        assert_eq!(policy.delay_for(40), Duration::from_secs(10));
    }

    #[test]
    fn test_transient_errors_retry_until_success() {
        let calls = Cell::new(0);
        let result: Result<&str, StoreError> = RetryPolicy::immediate(3).run("upload", || {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(StoreError::Transient("rate limited".into()))
            } else {
                Ok("done")
            }
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_attempts_are_bounded() {
        let calls = Cell::new(0);
        let result: Result<(), StoreError> = RetryPolicy::immediate(3).run("upload", || {
            calls.set(calls.get() + 1);
            Err(StoreError::Transient("network down".into()))
        });
        assert!(matches!(result, Err(StoreError::Transient(_))));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_permanent_errors_are_not_retried() {
        let calls = Cell::new(0);
        let result: Result<(), StoreError> = RetryPolicy::immediate(3).run("upload", || {
            calls.set(calls.get() + 1);
            Err(StoreError::Auth("token revoked".into()))
        });
        assert!(matches!(result, Err(StoreError::Auth(_))));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_none_tries_once() {
        let calls = Cell::new(0);
        let _: Result<(), StoreError> = RetryPolicy::none().run("exists", || {
            calls.set(calls.get() + 1);
            Err(StoreError::Transient("timeout".into()))
        });
        assert_eq!(calls.get(), 1);
    }
}
