use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::session::SessionDriver;
use super::types::{SessionCommand, SessionSnapshot};
use crate::config::types::RefreshSettings;
use crate::protocol::{QueryKey, Request};
use crate::query::{QueryConfig, QueryExecutor};
use crate::transport::Transport;

/// View-scoped holder of refresh sessions, one per distinct [`QueryKey`].
///
/// Dropping the coordinator ends every session and pending timer.
pub struct RefreshCoordinator<T> {
    executor: Arc<QueryExecutor<T>>,
    config: QueryConfig,
    interval: Duration,
    auto_refresh: bool,
    sessions: HashMap<QueryKey, Session>,
}

struct Session {
    handle: RefreshHandle,
    shutdown: CancellationToken,
}

/// Cheap, cloneable access to one session.
#[derive(Clone)]
pub struct RefreshHandle {
    key: QueryKey,
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<SessionSnapshot>,
}

impl<T: Transport> RefreshCoordinator<T> {
    pub fn new(
        executor: Arc<QueryExecutor<T>>,
        config: QueryConfig,
        settings: &RefreshSettings,
    ) -> Self {
        Self {
            executor,
            config,
            interval: settings.interval(),
            auto_refresh: settings.auto_refresh(),
            sessions: HashMap::new(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Whether sessions created from now on start with auto-refresh enabled.
    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }

    /// Session for `request`, created with an initial fetch on first use.
    pub fn session(&mut self, request: Request) -> RefreshHandle {
        let key = request.key();
        if let Some(session) = self.sessions.get(&key) {
            return session.handle.clone();
        }

        let (commands, receiver) = mpsc::unbounded_channel();
        let (state, watcher) = watch::channel(SessionSnapshot::new(key.clone(), self.auto_refresh));
        let shutdown = CancellationToken::new();
        let driver = SessionDriver::new(
            Arc::clone(&self.executor),
            self.config.clone(),
            request,
            self.interval,
            receiver,
            state,
            shutdown.clone(),
        );
        tokio::spawn(driver.run());

        info!(
            event = "core.refresh.session_created",
            key = %key,
            auto_refresh = self.auto_refresh,
            interval_ms = self.interval.as_millis() as u64,
        );

        let handle = RefreshHandle {
            key: key.clone(),
            commands,
            state: watcher,
        };
        self.sessions.insert(
            key,
            Session {
                handle: handle.clone(),
                shutdown,
            },
        );
        handle
    }

    pub fn get(&self, key: &QueryKey) -> Option<RefreshHandle> {
        self.sessions.get(key).map(|s| s.handle.clone())
    }

    /// End the session for `key`. Returns `false` if there was none.
    pub fn release(&mut self, key: &QueryKey) -> bool {
        match self.sessions.remove(key) {
            Some(session) => {
                session.shutdown.cancel();
                info!(event = "core.refresh.session_released", key = %key);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.sessions.keys()
    }
}

impl<T> Drop for RefreshCoordinator<T> {
    fn drop(&mut self) {
        for session in self.sessions.values() {
            session.shutdown.cancel();
        }
    }
}

impl RefreshHandle {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Force a network fetch. Ignored while one is in flight.
    pub fn refresh(&self) {
        let _ = self.commands.send(SessionCommand::Refresh);
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        let _ = self.commands.send(SessionCommand::SetAutoRefresh(enabled));
    }

    /// Abandon the fetch in flight, if any. The session returns to idle
    /// without recording an error.
    pub fn cancel(&self) {
        let _ = self.commands.send(SessionCommand::Cancel);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Wait for the next state change. Returns `false` once the session ended.
    pub async fn changed(&mut self) -> bool {
        self.state.changed().await.is_ok()
    }

    /// Wait until the snapshot satisfies `predicate`.
    ///
    /// Returns `None` if the session ends first.
    pub async fn wait_for(
        &mut self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Option<SessionSnapshot> {
        self.state
            .wait_for(predicate)
            .await
            .ok()
            .map(|snapshot| (*snapshot).clone())
    }
}
