use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;

use super::errors::QueryError;
use crate::config::defaults::{DEFAULT_RETRIES, DEFAULT_RETRY_DELAY_MS, DEFAULT_TIMEOUT_MS};

/// Timeout and retry policy for one `execute` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryConfig {
    /// Deadline for the whole operation, retries and delays included.
    pub timeout: Duration,
    /// Attempts after the first one.
    pub retries: u32,
    /// Fixed pause between attempts.
    pub retry_delay: Duration,
    /// Retry GraphQL-level errors like transport errors.
    pub retry_operation_errors: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            retries: DEFAULT_RETRIES,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            retry_operation_errors: true,
        }
    }
}

impl QueryConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Treat GraphQL-level errors as permanent for this call.
    pub fn without_operation_retries(mut self) -> Self {
        self.retry_operation_errors = false;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(1)
    }
}

/// How an attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Succeeded,
    FailedRetryable,
    FailedTerminal,
    TimedOut,
    Cancelled,
}

/// One network try within an operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    /// Starts at 1.
    pub number: u32,
    pub started_at: Instant,
    pub elapsed: Duration,
    pub state: AttemptState,
}

/// Outcome of an operation together with every attempt made for it.
#[derive(Debug, Clone)]
pub struct Execution {
    pub result: Result<Value, QueryError>,
    pub attempts: Vec<Attempt>,
}

impl Execution {
    pub fn into_result(self) -> Result<Value, QueryError> {
        self.result
    }

    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let config = QueryConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retries, 2);
        assert_eq!(config.retry_delay, Duration::from_secs(1));
        assert_eq!(config.max_attempts(), 3);
    }

    #[test]
    fn test_overrides() {
        let config = QueryConfig::default()
            .with_timeout(Duration::from_millis(50))
            .with_retries(0)
            .with_retry_delay(Duration::from_millis(10))
            .without_operation_retries();

        assert_eq!(config.max_attempts(), 1);
        assert_eq!(config.timeout, Duration::from_millis(50));
        assert!(!config.retry_operation_errors);
    }

    #[test]
    fn test_max_attempts_saturates() {
        assert_eq!(QueryConfig::default().with_retries(u32::MAX).max_attempts(), u32::MAX);
    }
}
