use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::errors::SubscriptionError;
use super::types::{ListenerId, SubscriptionEvent};
use crate::protocol::QueryKey;

/// Events a topic may hold for its slowest listener before new ones are dropped.
pub(crate) const TOPIC_BACKLOG: usize = 256;

enum Delivery {
    Add(ListenerId, mpsc::Sender<SubscriptionEvent>),
    Remove(ListenerId),
    Event(SubscriptionEvent),
}

/// Driver-side handle to one topic's delivery task.
///
/// Publishing never waits: a listener that stops reading holds back its own
/// topic only. Dropping the handle lets the task drain what is queued and
/// then close every listener channel.
pub(crate) struct Fanout {
    key: QueryKey,
    queue: mpsc::UnboundedSender<Delivery>,
    backlog: Arc<AtomicUsize>,
}

impl Fanout {
    pub(crate) fn spawn(key: QueryKey, shutdown: CancellationToken) -> Self {
        let (queue, receiver) = mpsc::unbounded_channel();
        let backlog = Arc::new(AtomicUsize::new(0));
        let task = FanoutTask {
            key: key.clone(),
            queue: receiver,
            backlog: Arc::clone(&backlog),
            listeners: Vec::new(),
            shutdown,
        };
        tokio::spawn(task.run());

        Self {
            key,
            queue,
            backlog,
        }
    }

    pub(crate) fn add(&self, listener: ListenerId, events: mpsc::Sender<SubscriptionEvent>) {
        let _ = self.queue.send(Delivery::Add(listener, events));
    }

    pub(crate) fn remove(&self, listener: ListenerId) {
        let _ = self.queue.send(Delivery::Remove(listener));
    }

    /// Queue `event` for every listener. Returns `false` if it was dropped
    /// because the topic's backlog is full. Terminal events are always queued.
    pub(crate) fn publish(&self, event: SubscriptionEvent) -> bool {
        let terminal = matches!(
            event,
            SubscriptionEvent::Completed | SubscriptionEvent::Error(SubscriptionError::Rejected { .. })
        );
        if !terminal && self.backlog.load(Ordering::Acquire) >= TOPIC_BACKLOG {
            warn!(
                event = "core.subscription.event_dropped",
                key = %self.key,
                backlog = TOPIC_BACKLOG,
            );
            return false;
        }

        self.backlog.fetch_add(1, Ordering::AcqRel);
        if self.queue.send(Delivery::Event(event)).is_err() {
            self.backlog.fetch_sub(1, Ordering::AcqRel);
            return false;
        }
        true
    }
}

struct FanoutTask {
    key: QueryKey,
    queue: mpsc::UnboundedReceiver<Delivery>,
    backlog: Arc<AtomicUsize>,
    listeners: Vec<(ListenerId, mpsc::Sender<SubscriptionEvent>)>,
    shutdown: CancellationToken,
}

impl FanoutTask {
    async fn run(mut self) {
        loop {
            let delivery = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                delivery = self.queue.recv() => match delivery {
                    Some(delivery) => delivery,
                    None => break,
                },
            };

            match delivery {
                Delivery::Add(listener, events) => self.listeners.push((listener, events)),
                Delivery::Remove(listener) => self.listeners.retain(|(id, _)| *id != listener),
                Delivery::Event(event) => {
                    let delivered = self.deliver(event).await;
                    self.backlog.fetch_sub(1, Ordering::AcqRel);
                    if !delivered {
                        break;
                    }
                }
            }
        }
        debug!(event = "core.subscription.fanout_stopped", key = %self.key);
    }

    /// Send to each listener in registration order. Returns `false` on shutdown.
    async fn deliver(&mut self, event: SubscriptionEvent) -> bool {
        let mut gone = Vec::new();
        for (listener, events) in &self.listeners {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return false,
                sent = events.send(event.clone()) => {
                    if sent.is_err() {
                        gone.push(*listener);
                    }
                }
            }
        }
        if !gone.is_empty() {
            self.listeners.retain(|(id, _)| !gone.contains(id));
        }
        true
    }
}
