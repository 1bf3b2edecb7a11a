use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::errors::SubscriptionError;
use super::fanout::Fanout;
use super::types::{Backoff, BridgeStats, Command, ListenerId, SubscriptionEvent};
use crate::protocol::{ClientMessage, QueryKey, Request, ServerMessage};
use crate::transport::{Connector, LiveConnection, TransportError};

/// One upstream subscription shared by every listener of the same key.
struct Topic {
    upstream_id: String,
    request: Request,
    listeners: Vec<ListenerId>,
    fanout: Fanout,
}

enum Step {
    Shutdown,
    Command(Command),
    Message(Option<Result<ServerMessage, TransportError>>),
    ReconnectDue,
}

/// Owns the physical connection and the topic registry.
///
/// Every registry mutation happens on this task; handles only send
/// [`Command`]s. Delivery to listeners runs on one [`Fanout`] task per
/// topic, so the driver never waits on a listener.
pub(crate) struct Driver<C: Connector> {
    connector: Arc<C>,
    commands: mpsc::UnboundedReceiver<Command>,
    shutdown: CancellationToken,
    backoff: Backoff,
    connection: Option<C::Connection>,
    reconnect_at: Option<Instant>,
    topics: HashMap<QueryKey, Topic>,
    upstream: HashMap<String, QueryKey>,
    listeners: HashMap<ListenerId, QueryKey>,
    connects: u64,
}

impl<C: Connector> Driver<C> {
    pub(crate) fn new(
        connector: C,
        commands: mpsc::UnboundedReceiver<Command>,
        shutdown: CancellationToken,
        backoff: Backoff,
    ) -> Self {
        Self {
            connector: Arc::new(connector),
            commands,
            shutdown,
            backoff,
            connection: None,
            reconnect_at: None,
            topics: HashMap::new(),
            upstream: HashMap::new(),
            listeners: HashMap::new(),
            connects: 0,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            let wanted = !self.topics.is_empty();

            if wanted && self.connection.is_none() && self.reconnect_at.is_none() {
                if !self.connect().await {
                    break;
                }
                continue;
            }

            let reconnect_at = self.reconnect_at;
            let step = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => Step::Shutdown,
                command = self.commands.recv() => match command {
                    Some(command) => Step::Command(command),
                    None => Step::Shutdown,
                },
                message = next_message(&mut self.connection) => Step::Message(message),
                _ = sleep_until(reconnect_at), if wanted && reconnect_at.is_some() => Step::ReconnectDue,
            };

            match step {
                Step::Shutdown => break,
                Step::Command(command) => self.handle_command(command).await,
                Step::Message(Some(Ok(message))) => self.handle_message(message).await,
                Step::Message(Some(Err(TransportError::MalformedPayload { message }))) => {
                    warn!(event = "core.subscription.message_ignored", error = %message);
                }
                Step::Message(Some(Err(e))) => {
                    self.connection_lost(&e.to_string());
                }
                Step::Message(None) => self.connection_lost("closed by server"),
                Step::ReconnectDue => self.reconnect_at = None,
            }
        }

        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
        }
        info!(
            event = "core.subscription.bridge_stopped",
            topics = self.topics.len(),
            listeners = self.listeners.len(),
        );
    }

    /// Returns `false` when shutdown was requested while connecting.
    ///
    /// Commands keep being served while the connect is pending. Topics added
    /// meanwhile are subscribed once it succeeds.
    async fn connect(&mut self) -> bool {
        debug!(event = "core.subscription.connect_started", topics = self.topics.len());

        let connector = Arc::clone(&self.connector);
        let connecting = async move { connector.connect().await };
        tokio::pin!(connecting);

        let result = loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => return false,
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => return false,
                },
                result = &mut connecting => break result,
            }
        };

        let mut connection = match result {
            Ok(connection) => connection,
            Err(e) if self.topics.is_empty() => {
                debug!(event = "core.subscription.connect_abandoned", error = %e);
                return true;
            }
            Err(e) => {
                self.schedule_reconnect(&e.to_string());
                return true;
            }
        };

        if self.topics.is_empty() {
            connection.close().await;
            debug!(event = "core.subscription.connect_abandoned", reason = "no topics");
            return true;
        }

        for topic in self.topics.values() {
            let subscribe = ClientMessage::Subscribe {
                id: topic.upstream_id.clone(),
                payload: topic.request.payload(),
            };
            if let Err(e) = connection.send(subscribe).await {
                self.schedule_reconnect(&e.to_string());
                return true;
            }
        }

        self.connects += 1;
        self.backoff.reset();
        self.reconnect_at = None;
        self.connection = Some(connection);
        info!(
            event = "core.subscription.connect_completed",
            topics = self.topics.len(),
            connects = self.connects,
        );
        true
    }

    fn connection_lost(&mut self, reason: &str) {
        self.connection = None;
        if self.topics.is_empty() {
            debug!(event = "core.subscription.connection_closed", reason = reason);
            return;
        }
        self.schedule_reconnect(reason);
    }

    fn schedule_reconnect(&mut self, reason: &str) {
        let delay = self.backoff.next_delay();
        self.reconnect_at = Some(Instant::now() + delay);
        warn!(
            event = "core.subscription.reconnect_scheduled",
            reason = reason,
            delay_ms = delay.as_millis() as u64,
            topics = self.topics.len(),
        );
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Subscribe {
                listener,
                request,
                events,
            } => self.add_listener(listener, request, events).await,
            Command::Unsubscribe { listener } => self.remove_listener(listener).await,
            Command::Stats { reply } => {
                let _ = reply.send(self.stats());
            }
        }
    }

    async fn add_listener(
        &mut self,
        listener: ListenerId,
        request: Request,
        events: mpsc::Sender<SubscriptionEvent>,
    ) {
        let key = request.key();
        self.listeners.insert(listener, key.clone());

        if let Some(topic) = self.topics.get_mut(&key) {
            topic.listeners.push(listener);
            topic.fanout.add(listener, events);
            debug!(
                event = "core.subscription.listener_added",
                key = %key,
                listeners = topic.listeners.len(),
            );
            return;
        }

        let upstream_id = uuid::Uuid::new_v4().to_string();
        let subscribe = ClientMessage::Subscribe {
            id: upstream_id.clone(),
            payload: request.payload(),
        };
        let fanout = Fanout::spawn(key.clone(), self.shutdown.clone());
        fanout.add(listener, events);
        self.upstream.insert(upstream_id.clone(), key.clone());
        self.topics.insert(
            key.clone(),
            Topic {
                upstream_id: upstream_id.clone(),
                request,
                listeners: vec![listener],
                fanout,
            },
        );
        info!(
            event = "core.subscription.topic_started",
            key = %key,
            upstream_id = %upstream_id,
        );

        // Without a connection the topic is sent once one is established.
        self.send(subscribe).await;
    }

    async fn remove_listener(&mut self, listener: ListenerId) {
        let Some(key) = self.listeners.remove(&listener) else {
            return;
        };
        let Some(topic) = self.topics.get_mut(&key) else {
            return;
        };
        topic.listeners.retain(|id| *id != listener);
        topic.fanout.remove(listener);
        if topic.listeners.is_empty() {
            self.stop_topic(&key).await;
        }
    }

    /// Drop a topic whose listeners are all gone and tell the server.
    async fn stop_topic(&mut self, key: &QueryKey) {
        let Some(topic) = self.topics.remove(key) else {
            return;
        };
        self.upstream.remove(&topic.upstream_id);
        info!(event = "core.subscription.topic_stopped", key = %key);

        self.send(ClientMessage::Complete {
            id: topic.upstream_id,
        })
        .await;
        self.close_if_idle().await;
    }

    /// Forget a topic the server already ended. Listener channels close
    /// once the queued events are delivered.
    async fn end_topic(&mut self, key: &QueryKey) {
        if let Some(topic) = self.topics.remove(key) {
            self.upstream.remove(&topic.upstream_id);
            for listener in &topic.listeners {
                self.listeners.remove(listener);
            }
            info!(event = "core.subscription.topic_ended", key = %key);
        }
        self.close_if_idle().await;
    }

    async fn close_if_idle(&mut self) {
        if !self.topics.is_empty() {
            return;
        }
        self.reconnect_at = None;
        self.backoff.reset();
        if let Some(mut connection) = self.connection.take() {
            connection.close().await;
            info!(event = "core.subscription.connection_released");
        }
    }

    async fn send(&mut self, message: ClientMessage) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        if let Err(e) = connection.send(message).await {
            self.connection_lost(&e.to_string());
        }
    }

    async fn handle_message(&mut self, message: ServerMessage) {
        match message {
            ServerMessage::Next { id, payload } => {
                let Some(key) = self.upstream.get(&id).cloned() else {
                    debug!(event = "core.subscription.unknown_id", id = %id);
                    return;
                };
                let event = match payload.into_result() {
                    Ok(data) => SubscriptionEvent::Next(data),
                    Err((errors, data)) => {
                        SubscriptionEvent::Error(SubscriptionError::Operation { errors, data })
                    }
                };
                self.dispatch(&key, event);
            }
            ServerMessage::Error { id, payload } => {
                let Some(key) = self.upstream.get(&id).cloned() else {
                    return;
                };
                warn!(
                    event = "core.subscription.topic_rejected",
                    key = %key,
                    errors = payload.len(),
                );
                let event = SubscriptionEvent::Error(SubscriptionError::Rejected { errors: payload });
                self.dispatch(&key, event);
                self.end_topic(&key).await;
            }
            ServerMessage::Complete { id } => {
                let Some(key) = self.upstream.get(&id).cloned() else {
                    return;
                };
                self.dispatch(&key, SubscriptionEvent::Completed);
                self.end_topic(&key).await;
            }
            ServerMessage::Ping { .. } => {
                self.send(ClientMessage::Pong { payload: None }).await;
            }
            ServerMessage::ConnectionAck { .. } | ServerMessage::Pong { .. } => {}
        }
    }

    /// Queue one event for every listener of `key`, in arrival order.
    fn dispatch(&self, key: &QueryKey, event: SubscriptionEvent) {
        if let Some(topic) = self.topics.get(key) {
            topic.fanout.publish(event);
        }
    }

    fn stats(&self) -> BridgeStats {
        BridgeStats {
            connected: self.connection.is_some(),
            topics: self.topics.len(),
            listeners: self.listeners.len(),
            connects: self.connects,
        }
    }
}

async fn next_message<L: LiveConnection>(
    connection: &mut Option<L>,
) -> Option<Result<ServerMessage, TransportError>> {
    match connection {
        Some(connection) => connection.next_message().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
