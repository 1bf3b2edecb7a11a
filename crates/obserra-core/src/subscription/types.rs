use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use super::errors::SubscriptionError;
use crate::protocol::Request;

/// What a listener receives, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionEvent {
    /// The `data` of one `next` message.
    Next(Value),
    /// A failure of this topic only.
    Error(SubscriptionError),
    /// The server finished the subscription. No further events follow.
    Completed,
}

/// Identifies one listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Snapshot of the bridge registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeStats {
    pub connected: bool,
    pub topics: usize,
    pub listeners: usize,
    pub connects: u64,
}

/// Requests from handles to the driver task, which alone owns the registry.
pub(crate) enum Command {
    Subscribe {
        listener: ListenerId,
        request: Request,
        events: mpsc::Sender<SubscriptionEvent>,
    },
    Unsubscribe {
        listener: ListenerId,
    },
    Stats {
        reply: oneshot::Sender<BridgeStats>,
    },
}

/// Exponential reconnect delay with a cap.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            current: initial,
        }
    }

    /// Delay to wait now; doubles the following one up to the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current.min(self.max);
        self.current = std::cmp::min(self.current.saturating_mul(2), self.max);
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.initial;
    }
}
