use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::errors::QueryError;
use super::types::{Attempt, AttemptState, Execution, QueryConfig};
use crate::protocol::Request;
use crate::transport::Transport;

/// Runs queries and mutations against a [`Transport`] with an operation
/// deadline, a fixed-delay retry policy, and structured error extraction.
pub struct QueryExecutor<T> {
    transport: T,
}

impl<T: Transport> QueryExecutor<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute a request and return its data or the final error.
    pub async fn execute(&self, request: &Request, config: &QueryConfig) -> Result<Value, QueryError> {
        self.run(request, config, &CancellationToken::new())
            .await
            .into_result()
    }

    /// Like [`execute`](Self::execute), resolving as `Cancelled` once `cancel` fires.
    pub async fn execute_with_cancel(
        &self,
        request: &Request,
        config: &QueryConfig,
        cancel: &CancellationToken,
    ) -> Result<Value, QueryError> {
        self.run(request, config, cancel).await.into_result()
    }

    /// Execute a request and report every attempt made.
    ///
    /// The deadline covers the whole operation. When it expires the attempt
    /// in flight is dropped and the operation fails with `Timeout`; a
    /// timeout is never retried. Other failures are retried up to
    /// `config.retries` times with `config.retry_delay` between attempts.
    pub async fn run(
        &self,
        request: &Request,
        config: &QueryConfig,
        cancel: &CancellationToken,
    ) -> Execution {
        let operation = request.operation_name();
        let max_attempts = config.max_attempts();
        let timeout_ms = config.timeout.as_millis() as u64;
        let deadline = Instant::now() + config.timeout;
        let mut attempts = Vec::new();

        for number in 1..=max_attempts {
            let started_at = Instant::now();
            info!(
                event = "core.query.attempt_started",
                operation = operation,
                attempt = number,
                max_attempts = max_attempts,
            );

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(QueryError::Cancelled),
                _ = tokio::time::sleep_until(deadline) => Err(QueryError::Timeout { timeout_ms }),
                response = self.transport.execute(request) => match response {
                    Ok(envelope) => envelope
                        .into_result()
                        .map_err(|(errors, data)| QueryError::Operation { errors, data }),
                    Err(e) => Err(QueryError::from(e)),
                },
            };

            let mut record = |state| {
                attempts.push(Attempt {
                    number,
                    started_at,
                    elapsed: started_at.elapsed(),
                    state,
                })
            };

            let error = match result {
                Ok(data) => {
                    record(AttemptState::Succeeded);
                    info!(
                        event = "core.query.completed",
                        operation = operation,
                        attempt = number,
                    );
                    return Execution {
                        result: Ok(data),
                        attempts,
                    };
                }
                Err(QueryError::Timeout { .. }) => {
                    record(AttemptState::TimedOut);
                    warn!(
                        event = "core.query.timed_out",
                        operation = operation,
                        attempt = number,
                        timeout_ms = timeout_ms,
                    );
                    return Execution {
                        result: Err(QueryError::Timeout { timeout_ms }),
                        attempts,
                    };
                }
                Err(QueryError::Cancelled) => {
                    record(AttemptState::Cancelled);
                    debug!(event = "core.query.cancelled", operation = operation, attempt = number);
                    return Execution {
                        result: Err(QueryError::Cancelled),
                        attempts,
                    };
                }
                Err(e) => e,
            };

            if number == max_attempts || !error.is_retryable(config.retry_operation_errors) {
                record(AttemptState::FailedTerminal);
                error!(
                    event = "core.query.failed",
                    operation = operation,
                    attempts = number,
                    retryable = error.is_retryable(config.retry_operation_errors),
                    error = %error,
                );
                return Execution {
                    result: Err(error),
                    attempts,
                };
            }

            record(AttemptState::FailedRetryable);
            warn!(
                event = "core.query.retry_scheduled",
                operation = operation,
                attempt = number,
                delay_ms = config.retry_delay.as_millis() as u64,
                error = %error,
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(event = "core.query.cancelled", operation = operation, attempt = number);
                    return Execution { result: Err(QueryError::Cancelled), attempts };
                }
                _ = tokio::time::sleep_until(deadline) => {
                    warn!(
                        event = "core.query.timed_out",
                        operation = operation,
                        attempt = number,
                        timeout_ms = timeout_ms,
                    );
                    return Execution { result: Err(QueryError::Timeout { timeout_ms }), attempts };
                }
                _ = tokio::time::sleep(config.retry_delay) => {}
            }
        }

        // max_attempts is at least 1, so the loop always returns.
        Execution {
            result: Err(QueryError::Cancelled),
            attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{GraphQlError, Response};
    use crate::transport::TransportError;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replays scripted results and records when each call started.
    struct ScriptedTransport {
        script: Mutex<Vec<Result<Response, TransportError>>>,
        fallback: Result<Response, TransportError>,
        delay: Duration,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedTransport {
        fn failing(error: TransportError) -> Self {
            Self {
                script: Mutex::new(Vec::new()),
                fallback: Err(error),
                delay: Duration::ZERO,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn with_script(mut self, mut script: Vec<Result<Response, TransportError>>) -> Self {
            script.reverse();
            self.script = Mutex::new(script);
            self
        }

        fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn calls(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        async fn execute(&self, _request: &Request) -> Result<Response, TransportError> {
            self.calls.lock().unwrap().push(Instant::now());
            let next = self.script.lock().unwrap().pop();
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            next.unwrap_or_else(|| self.fallback.clone())
        }
    }

    fn refused() -> TransportError {
        TransportError::ConnectionFailed {
            message: "connection refused".to_string(),
        }
    }

    fn services() -> Request {
        Request::query("GetServices", "query GetServices { services { id } }")
    }

    fn fast_config(retries: u32) -> QueryConfig {
        QueryConfig::default()
            .with_retries(retries)
            .with_retry_delay(Duration::from_millis(1000))
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_failure_makes_retries_plus_one_attempts() {
        for retries in 0..=3 {
            let executor = QueryExecutor::new(ScriptedTransport::failing(refused()));
            let execution = executor
                .run(&services(), &fast_config(retries), &CancellationToken::new())
                .await;

            assert_eq!(execution.attempt_count(), (retries + 1) as usize);
            assert!(matches!(
                execution.result,
                Err(QueryError::Transport { .. })
            ));

            let calls = executor.transport().calls();
            assert_eq!(calls.len(), (retries + 1) as usize);
            for pair in calls.windows(2) {
                assert_eq!(pair[1] - pair[0], Duration::from_millis(1000));
            }

            let last = execution.attempts.last().unwrap();
            assert_eq!(last.state, AttemptState::FailedTerminal);
            assert!(
                execution.attempts[..execution.attempts.len() - 1]
                    .iter()
                    .all(|a| a.state == AttemptState::FailedRetryable)
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_truncates_retries() {
        let transport =
            ScriptedTransport::failing(refused()).with_delay(Duration::from_millis(500));
        let executor = QueryExecutor::new(transport);
        let config = QueryConfig::default()
            .with_timeout(Duration::from_millis(50))
            .with_retries(2);

        let execution = executor
            .run(&services(), &config, &CancellationToken::new())
            .await;

        assert_eq!(execution.result, Err(QueryError::Timeout { timeout_ms: 50 }));
        assert_eq!(execution.attempt_count(), 1);
        assert_eq!(execution.attempts[0].state, AttemptState::TimedOut);
        assert_eq!(executor.transport().calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retry_returns_immediately() {
        let transport = ScriptedTransport::failing(refused()).with_script(vec![
            Err(refused()),
            Ok(Response::ok(json!({"services": [{"id": "svc-1"}]}))),
        ]);
        let executor = QueryExecutor::new(transport);

        let start = Instant::now();
        let data = executor
            .execute(&services(), &fast_config(2))
            .await
            .unwrap();

        assert_eq!(data, json!({"services": [{"id": "svc-1"}]}));
        assert_eq!(executor.transport().calls().len(), 2);
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_operation_errors_are_retried_and_keep_partial_data() {
        let partial = Response {
            data: Some(json!({"services": [{"id": "svc-1"}]})),
            errors: vec![GraphQlError::new("insights unavailable")],
        };
        let transport = ScriptedTransport {
            fallback: Ok(partial),
            ..ScriptedTransport::failing(refused())
        };
        let executor = QueryExecutor::new(transport);

        let error = executor
            .execute(&services(), &fast_config(1))
            .await
            .unwrap_err();

        assert_eq!(executor.transport().calls().len(), 2);
        assert!(matches!(error, QueryError::Operation { .. }));
        assert_eq!(
            error.partial_data(),
            Some(&json!({"services": [{"id": "svc-1"}]}))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_operation_errors_stop_after_first_attempt() {
        let transport = ScriptedTransport {
            fallback: Ok(Response {
                data: None,
                errors: vec![GraphQlError::new("service not found")],
            }),
            ..ScriptedTransport::failing(refused())
        };
        let executor = QueryExecutor::new(transport);
        let config = fast_config(2).without_operation_retries();

        let execution = executor
            .run(&services(), &config, &CancellationToken::new())
            .await;

        assert_eq!(execution.attempt_count(), 1);
        assert_eq!(execution.attempts[0].state, AttemptState::FailedTerminal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_protocol_errors_are_retried() {
        let transport = ScriptedTransport::failing(TransportError::HttpStatus {
            status: 502,
            body: "bad gateway".to_string(),
        });
        let executor = QueryExecutor::new(transport);

        let error = executor
            .execute(&services(), &fast_config(1))
            .await
            .unwrap_err();

        assert!(matches!(error, QueryError::Protocol { .. }));
        assert_eq!(executor.transport().calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_is_reported_as_cancelled() {
        let transport =
            ScriptedTransport::failing(refused()).with_delay(Duration::from_secs(5));
        let executor = QueryExecutor::new(transport);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let execution = executor
            .run(&services(), &QueryConfig::default(), &cancel)
            .await;

        assert_eq!(execution.result, Err(QueryError::Cancelled));
        assert_eq!(execution.attempts[0].state, AttemptState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_during_retry_delay_times_out() {
        let executor = QueryExecutor::new(ScriptedTransport::failing(refused()));
        let config = QueryConfig::default()
            .with_timeout(Duration::from_millis(1500))
            .with_retries(5)
            .with_retry_delay(Duration::from_millis(1000));

        let error = executor.execute(&services(), &config).await.unwrap_err();

        assert_eq!(error, QueryError::Timeout { timeout_ms: 1500 });
        assert_eq!(executor.transport().calls().len(), 2);
    }
}
