// src/exec/retry.rs

//! Retry hook consulted when a creation fails.

use std::fmt::Debug;
use std::time::Duration;

use crate::errors::CreationError;

/// Decides whether a failed creation is attempted again.
pub trait RetryPolicy: Send + Sync + Debug {
    /// `attempts` is the number of attempts already made (at least 1).
    ///
    /// Return the delay before the next attempt, or `None` to give up and
    /// leave the resource in `Error`.
    fn next_delay(&self, key: &str, attempts: u32, error: &CreationError) -> Option<Duration>;
}

/// Never retry. The default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn next_delay(&self, _key: &str, _attempts: u32, _error: &CreationError) -> Option<Duration> {
        None
    }
}

/// Retry up to `max_attempts` total attempts with a fixed delay.
#[derive(Debug, Clone, Copy)]
pub struct BoundedRetry {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl BoundedRetry {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts,
            backoff,
        }
    }
}

impl RetryPolicy for BoundedRetry {
    fn next_delay(&self, _key: &str, attempts: u32, _error: &CreationError) -> Option<Duration> {
        (attempts < self.max_attempts).then_some(self.backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_retry_stops_at_limit() {
        let policy = BoundedRetry::new(3, Duration::from_millis(10));
        let err = CreationError::new("pod/a", "boom");

        assert_eq!(policy.next_delay("pod/a", 1, &err), Some(Duration::from_millis(10)));
        assert_eq!(policy.next_delay("pod/a", 2, &err), Some(Duration::from_millis(10)));
        assert_eq!(policy.next_delay("pod/a", 3, &err), None);
        assert_eq!(NoRetry.next_delay("pod/a", 1, &err), None);
    }
}
