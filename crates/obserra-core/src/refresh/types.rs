use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::time::Instant;

use crate::protocol::QueryKey;
use crate::query::QueryError;

/// Lifecycle of one refresh session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Fetching,
    /// The last fetch failed. The previous result, if any, is still held.
    Failed,
}

/// What holders of a session see.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub key: QueryKey,
    pub state: RefreshState,
    /// Last successful result.
    pub result: Option<Arc<Value>>,
    /// Error of the most recent failed fetch, cleared on the next success.
    pub last_error: Option<QueryError>,
    /// Completion time of the last successful fetch.
    pub fetched_at: Option<Instant>,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub auto_refresh: bool,
    /// Fetches started since the session was created.
    pub fetch_count: u64,
}

impl SessionSnapshot {
    pub(crate) fn new(key: QueryKey, auto_refresh: bool) -> Self {
        Self {
            key,
            state: RefreshState::Idle,
            result: None,
            last_error: None,
            fetched_at: None,
            refreshed_at: None,
            auto_refresh,
            fetch_count: 0,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state == RefreshState::Fetching
    }
}

pub(crate) enum SessionCommand {
    Refresh,
    SetAutoRefresh(bool),
    Cancel,
}
