use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::types::{RefreshState, SessionCommand, SessionSnapshot};
use crate::protocol::Request;
use crate::query::{QueryConfig, QueryError, QueryExecutor};
use crate::transport::Transport;

type Fetch = JoinHandle<Result<Value, QueryError>>;

enum Step {
    Stop,
    Command(SessionCommand),
    Finished(Result<Value, QueryError>),
    TimerFired,
}

/// Drives one session: at most one fetch in flight and one armed timer.
pub(crate) struct SessionDriver<T> {
    executor: Arc<QueryExecutor<T>>,
    config: QueryConfig,
    request: Request,
    interval: Duration,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    state: watch::Sender<SessionSnapshot>,
    shutdown: CancellationToken,
    in_flight: Option<(Fetch, CancellationToken)>,
    next_refresh: Option<Instant>,
}

impl<T: Transport> SessionDriver<T> {
    pub(crate) fn new(
        executor: Arc<QueryExecutor<T>>,
        config: QueryConfig,
        request: Request,
        interval: Duration,
        commands: mpsc::UnboundedReceiver<SessionCommand>,
        state: watch::Sender<SessionSnapshot>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            executor,
            config,
            request,
            interval,
            commands,
            state,
            shutdown,
            in_flight: None,
            next_refresh: None,
        }
    }

    pub(crate) async fn run(mut self) {
        // Initial load honours the request's own policy.
        let initial = self.request.clone();
        self.start(initial, "initial");

        loop {
            let waiting = self.in_flight.is_none();
            let next_refresh = self.next_refresh;

            let step = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => Step::Stop,
                command = self.commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => Step::Stop,
                },
                outcome = finished(&mut self.in_flight) => Step::Finished(outcome),
                _ = sleep_until(next_refresh), if waiting && next_refresh.is_some() => Step::TimerFired,
            };

            match step {
                Step::Stop => break,
                Step::Command(command) => self.handle_command(command),
                Step::Finished(outcome) => self.complete(outcome),
                Step::TimerFired => {
                    self.next_refresh = None;
                    let auto_refresh = self.state.borrow().auto_refresh;
                    if auto_refresh {
                        self.start(self.request.network_only(), "timer");
                    }
                }
            }
        }

        // An attempt already handed to the transport runs to completion.
        // Its result is discarded with the task handle.
        debug!(
            event = "core.refresh.session_stopped",
            key = %self.request.key(),
            in_flight = self.in_flight.is_some(),
        );
    }

    fn handle_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Refresh => {
                if self.in_flight.is_some() {
                    debug!(
                        event = "core.refresh.refresh_skipped",
                        key = %self.request.key(),
                        reason = "fetch in flight",
                    );
                    return;
                }
                self.next_refresh = None;
                self.start(self.request.network_only(), "explicit");
            }
            SessionCommand::SetAutoRefresh(enabled) => {
                self.state.send_modify(|s| s.auto_refresh = enabled);
                if !enabled {
                    self.next_refresh = None;
                } else if self.in_flight.is_none() && self.next_refresh.is_none() {
                    self.arm_timer();
                }
                debug!(
                    event = "core.refresh.auto_refresh_toggled",
                    key = %self.request.key(),
                    enabled = enabled,
                );
            }
            SessionCommand::Cancel => {
                if let Some((_, cancel)) = &self.in_flight {
                    cancel.cancel();
                }
            }
        }
    }

    fn start(&mut self, request: Request, trigger: &'static str) {
        let executor = Arc::clone(&self.executor);
        let config = self.config.clone();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            executor
                .execute_with_cancel(&request, &config, &token)
                .await
        });
        self.in_flight = Some((task, cancel));

        self.state.send_modify(|s| {
            s.state = RefreshState::Fetching;
            s.fetch_count += 1;
        });
        info!(
            event = "core.refresh.fetch_started",
            key = %self.request.key(),
            trigger = trigger,
        );
    }

    fn complete(&mut self, outcome: Result<Value, QueryError>) {
        self.in_flight = None;
        let key = self.request.key();

        match outcome {
            Ok(value) => {
                self.state.send_modify(|s| {
                    s.state = RefreshState::Idle;
                    s.result = Some(Arc::new(value));
                    s.last_error = None;
                    s.fetched_at = Some(Instant::now());
                    s.refreshed_at = Some(chrono::Utc::now());
                });
                info!(event = "core.refresh.fetch_completed", key = %key);
            }
            Err(QueryError::Cancelled) => {
                self.state.send_modify(|s| s.state = RefreshState::Idle);
                debug!(event = "core.refresh.fetch_cancelled", key = %key);
            }
            Err(e) => {
                warn!(
                    event = "core.refresh.fetch_failed",
                    key = %key,
                    error = %e,
                );
                self.state.send_modify(|s| {
                    s.state = RefreshState::Failed;
                    s.last_error = Some(e);
                });
            }
        }

        let auto_refresh = self.state.borrow().auto_refresh;
        if auto_refresh {
            self.arm_timer();
        }
    }

    fn arm_timer(&mut self) {
        self.next_refresh = Some(Instant::now() + self.interval);
    }
}

async fn finished(in_flight: &mut Option<(Fetch, CancellationToken)>) -> Result<Value, QueryError> {
    match in_flight {
        Some((task, _)) => match task.await {
            Ok(outcome) => outcome,
            Err(_) => Err(QueryError::Cancelled),
        },
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
