use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::driver::Driver;
use super::errors::SubscriptionError;
use super::types::{Backoff, BridgeStats, Command, ListenerId, SubscriptionEvent};
use crate::config::types::SubscriptionSettings;
use crate::protocol::{QueryKey, Request};
use crate::transport::Connector;

/// Multiplexes live subscriptions over a single connection.
///
/// Listeners of the same operation and variables share one upstream
/// subscription. The connection opens with the first subscription and is
/// released when the last one ends. A dropped connection is re-established
/// with exponential backoff and every active topic is subscribed again.
///
/// Must be created inside a Tokio runtime.
pub struct SubscriptionBridge {
    commands: mpsc::UnboundedSender<Command>,
    next_listener: AtomicU64,
    shutdown: CancellationToken,
    driver: Option<JoinHandle<()>>,
}

impl SubscriptionBridge {
    pub fn new<C: Connector>(connector: C, settings: &SubscriptionSettings) -> Self {
        Self::with_backoff(
            connector,
            settings.reconnect_delay(),
            settings.max_reconnect_delay(),
        )
    }

    pub fn with_backoff<C: Connector>(connector: C, initial: Duration, max: Duration) -> Self {
        let (commands, receiver) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        let driver = Driver::new(
            connector,
            receiver,
            shutdown.clone(),
            Backoff::new(initial, max),
        );

        Self {
            commands,
            next_listener: AtomicU64::new(1),
            shutdown,
            driver: Some(tokio::spawn(driver.run())),
        }
    }

    /// Register a listener for `request`.
    ///
    /// Events arrive in the order the server sent them. Each listener holds
    /// at most one undelivered event. While it is unread, later events for
    /// the same topic queue up to a fixed backlog and newer ones are
    /// dropped. Other topics are not affected.
    pub fn subscribe(&self, request: Request) -> Result<Subscription, SubscriptionError> {
        let listener = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        let key = request.key();
        let (sender, events) = mpsc::channel(1);

        self.commands
            .send(Command::Subscribe {
                listener,
                request,
                events: sender,
            })
            .map_err(|_| SubscriptionError::BridgeClosed)?;

        debug!(event = "core.subscription.subscribe_requested", key = %key);
        Ok(Subscription {
            listener,
            key,
            events,
            commands: self.commands.clone(),
        })
    }

    /// Current registry counts, once every earlier command has been applied.
    pub async fn stats(&self) -> Result<BridgeStats, SubscriptionError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Stats { reply })
            .map_err(|_| SubscriptionError::BridgeClosed)?;
        response.await.map_err(|_| SubscriptionError::BridgeClosed)
    }

    /// Stop the driver and close the connection.
    pub async fn close(mut self) {
        self.shutdown.cancel();
        if let Some(driver) = self.driver.take() {
            let _ = driver.await;
        }
    }
}

impl Drop for SubscriptionBridge {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// One listener registration. Dropping it unsubscribes.
pub struct Subscription {
    listener: ListenerId,
    key: QueryKey,
    events: mpsc::Receiver<SubscriptionEvent>,
    commands: mpsc::UnboundedSender<Command>,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Next event, or `None` once the topic ended or the bridge closed.
    pub async fn recv(&mut self) -> Option<SubscriptionEvent> {
        self.events.recv().await
    }

    pub fn unsubscribe(self) {}
}

impl Stream for Subscription {
    type Item = SubscriptionEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.events.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Unsubscribe {
            listener: self.listener,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ClientMessage, GraphQlError, OperationPayload, Response, ServerMessage};
    use crate::subscription::fake::{FakeConnector, FakeServer};
    use crate::subscription::fanout::TOPIC_BACKLOG;
    use std::collections::HashMap;
    use futures::StreamExt;
    use serde_json::json;
    use tokio::sync::mpsc::error::TryRecvError;

    fn log_stream(service: &str) -> Request {
        Request::subscription(
            "ServiceLogStream",
            "subscription ServiceLogStream($serviceId: ID!) { logStream(serviceId: $serviceId) { id message } }",
        )
        .with_variable("serviceId", service)
    }

    fn bridge(connector: FakeConnector) -> SubscriptionBridge {
        SubscriptionBridge::with_backoff(
            connector,
            Duration::from_millis(1_000),
            Duration::from_millis(4_000),
        )
    }

    fn next(id: &str, data: serde_json::Value) -> ServerMessage {
        ServerMessage::Next {
            id: id.to_string(),
            payload: Response::ok(data),
        }
    }

    async fn recv_subscribe(server: &mut FakeServer) -> (String, OperationPayload) {
        match server.received.recv().await {
            Some(ClientMessage::Subscribe { id, payload }) => (id, payload),
            other => panic!("expected subscribe, got {:?}", other),
        }
    }

    async fn expect_subscribe(server: &mut FakeServer) -> String {
        recv_subscribe(server).await.0
    }

    /// Upstream ids of the next `count` subscribes, by `serviceId`.
    async fn subscribed_ids(server: &mut FakeServer, count: usize) -> HashMap<String, String> {
        let mut ids = HashMap::new();
        for _ in 0..count {
            let (id, payload) = recv_subscribe(server).await;
            let service = payload.variables["serviceId"]
                .as_str()
                .expect("serviceId variable")
                .to_string();
            ids.insert(service, id);
        }
        ids
    }

    async fn expect_pong(server: &mut FakeServer) {
        server.send(ServerMessage::Ping { payload: None });
        assert_eq!(
            server.received.recv().await,
            Some(ClientMessage::Pong { payload: None })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_opens_with_first_subscription() {
        let (connector, mut accepted) = FakeConnector::new();
        let bridge = bridge(connector.clone());

        assert_eq!(bridge.stats().await.unwrap(), BridgeStats::default());
        assert_eq!(connector.attempts(), 0);

        let _logs = bridge.subscribe(log_stream("svc-1")).unwrap();
        let mut server = accepted.recv().await.unwrap();
        expect_subscribe(&mut server).await;

        let stats = bridge.stats().await.unwrap();
        assert!(stats.connected);
        assert_eq!(stats.topics, 1);
        assert_eq!(stats.connects, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_identical_requests_share_one_upstream_subscription() {
        let (connector, mut accepted) = FakeConnector::new();
        let bridge = bridge(connector);

        let mut first = bridge.subscribe(log_stream("svc-1")).unwrap();
        let mut second = bridge.subscribe(log_stream("svc-1")).unwrap();
        let mut server = accepted.recv().await.unwrap();
        let id = expect_subscribe(&mut server).await;

        let stats = bridge.stats().await.unwrap();
        assert_eq!(stats.topics, 1);
        assert_eq!(stats.listeners, 2);
        assert!(matches!(server.received.try_recv(), Err(TryRecvError::Empty)));

        server.send(next(&id, json!({"logStream": [{"id": "1"}]})));
        server.send(next(&id, json!({"logStream": [{"id": "2"}]})));

        for subscription in [&mut first, &mut second] {
            assert_eq!(
                subscription.recv().await,
                Some(SubscriptionEvent::Next(json!({"logStream": [{"id": "1"}]})))
            );
            assert_eq!(
                subscription.recv().await,
                Some(SubscriptionEvent::Next(json!({"logStream": [{"id": "2"}]})))
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribing_one_listener_keeps_the_topic() {
        let (connector, mut accepted) = FakeConnector::new();
        let bridge = bridge(connector);

        let first = bridge.subscribe(log_stream("svc-1")).unwrap();
        let mut second = bridge.subscribe(log_stream("svc-1")).unwrap();
        let mut server = accepted.recv().await.unwrap();
        let id = expect_subscribe(&mut server).await;

        first.unsubscribe();
        let stats = bridge.stats().await.unwrap();
        assert_eq!(stats.listeners, 1);
        assert_eq!(stats.topics, 1);
        assert!(matches!(server.received.try_recv(), Err(TryRecvError::Empty)));

        server.send(next(&id, json!({"logStream": []})));
        assert_eq!(
            second.recv().await,
            Some(SubscriptionEvent::Next(json!({"logStream": []})))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_unsubscribe_completes_topic_and_releases_connection() {
        let (connector, mut accepted) = FakeConnector::new();
        let bridge = bridge(connector);

        let logs = bridge.subscribe(log_stream("svc-1")).unwrap();
        let mut server = accepted.recv().await.unwrap();
        let id = expect_subscribe(&mut server).await;

        drop(logs);

        assert_eq!(
            server.received.recv().await,
            Some(ClientMessage::Complete { id })
        );
        // The client side of the connection was dropped.
        assert_eq!(server.received.recv().await, None);

        let stats = bridge.stats().await.unwrap();
        assert!(!stats.connected);
        assert_eq!(stats.topics, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_topic_error_does_not_affect_other_topics() {
        let (connector, mut accepted) = FakeConnector::new();
        let bridge = bridge(connector);

        let mut failing = bridge.subscribe(log_stream("svc-9")).unwrap();
        let mut healthy = bridge.subscribe(log_stream("svc-1")).unwrap();
        let mut server = accepted.recv().await.unwrap();

        let mut failing_id = String::new();
        let mut healthy_id = String::new();
        for _ in 0..2 {
            let (id, payload) = recv_subscribe(&mut server).await;
            match payload.variables["serviceId"].as_str() {
                Some("svc-9") => failing_id = id,
                Some("svc-1") => healthy_id = id,
                other => panic!("unexpected service {:?}", other),
            }
        }
        assert_ne!(failing_id, healthy_id);

        server.send(ServerMessage::Error {
            id: failing_id,
            payload: vec![GraphQlError::new("unknown service 'svc-9'")],
        });
        server.send(next(&healthy_id, json!({"logStream": [{"id": "7"}]})));

        assert_eq!(
            failing.recv().await,
            Some(SubscriptionEvent::Error(SubscriptionError::Rejected {
                errors: vec![GraphQlError::new("unknown service 'svc-9'")],
            }))
        );
        assert_eq!(failing.recv().await, None);
        assert_eq!(
            healthy.recv().await,
            Some(SubscriptionEvent::Next(json!({"logStream": [{"id": "7"}]})))
        );

        let stats = bridge.stats().await.unwrap();
        assert_eq!(stats.topics, 1);
        assert!(stats.connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_with_errors_keeps_subscription_active() {
        let (connector, mut accepted) = FakeConnector::new();
        let bridge = bridge(connector);

        let mut logs = bridge.subscribe(log_stream("svc-1")).unwrap();
        let mut server = accepted.recv().await.unwrap();
        let id = expect_subscribe(&mut server).await;

        server.send(ServerMessage::Next {
            id: id.clone(),
            payload: Response {
                data: None,
                errors: vec![GraphQlError::new("log backend unavailable")],
            },
        });
        server.send(next(&id, json!({"logStream": []})));

        assert!(matches!(
            logs.recv().await,
            Some(SubscriptionEvent::Error(SubscriptionError::Operation { .. }))
        ));
        assert_eq!(
            logs.recv().await,
            Some(SubscriptionEvent::Next(json!({"logStream": []})))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_complete_ends_topic() {
        let (connector, mut accepted) = FakeConnector::new();
        let bridge = bridge(connector);

        let mut logs = bridge.subscribe(log_stream("svc-1")).unwrap();
        let mut server = accepted.recv().await.unwrap();
        let id = expect_subscribe(&mut server).await;

        server.send(ServerMessage::Complete { id });

        assert_eq!(logs.recv().await, Some(SubscriptionEvent::Completed));
        assert_eq!(logs.recv().await, None);
        assert!(!bridge.stats().await.unwrap().connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_resubscribes_active_topics() {
        let (connector, mut accepted) = FakeConnector::new();
        let bridge = bridge(connector.clone());

        let mut logs = bridge.subscribe(log_stream("svc-1")).unwrap();
        let mut server = accepted.recv().await.unwrap();
        let id = expect_subscribe(&mut server).await;

        let dropped_at = tokio::time::Instant::now();
        drop(server);

        let mut server = accepted.recv().await.unwrap();
        assert_eq!(dropped_at.elapsed(), Duration::from_millis(1_000));
        assert_eq!(expect_subscribe(&mut server).await, id);

        server.send(next(&id, json!({"logStream": [{"id": "after"}]})));
        assert_eq!(
            logs.next().await,
            Some(SubscriptionEvent::Next(json!({"logStream": [{"id": "after"}]})))
        );
        assert_eq!(bridge.stats().await.unwrap().connects, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_connects_back_off_exponentially() {
        let (connector, mut accepted) = FakeConnector::new();
        connector.fail_next(3);
        let bridge = bridge(connector.clone());

        let started = tokio::time::Instant::now();
        let _logs = bridge.subscribe(log_stream("svc-1")).unwrap();
        let _server = accepted.recv().await.unwrap();

        // 1s + 2s + 4s between the four attempts.
        assert_eq!(started.elapsed(), Duration::from_millis(7_000));
        assert_eq!(connector.attempts(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ping_is_answered() {
        let (connector, mut accepted) = FakeConnector::new();
        let bridge = bridge(connector);

        let _logs = bridge.subscribe(log_stream("svc-1")).unwrap();
        let mut server = accepted.recv().await.unwrap();
        expect_subscribe(&mut server).await;

        server.send(ServerMessage::Ping { payload: None });
        assert_eq!(
            server.received.recv().await,
            Some(ClientMessage::Pong { payload: None })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_ends_listeners() {
        let (connector, mut accepted) = FakeConnector::new();
        let bridge = bridge(connector);

        let mut logs = bridge.subscribe(log_stream("svc-1")).unwrap();
        let _server = accepted.recv().await.unwrap();

        bridge.close().await;
        assert_eq!(logs.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unread_topic_does_not_block_other_topics() {
        let (connector, mut accepted) = FakeConnector::new();
        let bridge = bridge(connector);

        let mut stalled = bridge.subscribe(log_stream("svc-b")).unwrap();
        let mut active = bridge.subscribe(log_stream("svc-a")).unwrap();
        let mut server = accepted.recv().await.unwrap();
        let ids = subscribed_ids(&mut server, 2).await;

        for n in 0..3 {
            server.send(next(&ids["svc-b"], json!({"logStream": [{"id": n}]})));
        }
        server.send(next(&ids["svc-a"], json!({"logStream": [{"id": "a"}]})));

        let event = tokio::time::timeout(Duration::from_secs(5), active.recv())
            .await
            .expect("delivery to the other topic stalled");
        assert_eq!(
            event,
            Some(SubscriptionEvent::Next(json!({"logStream": [{"id": "a"}]})))
        );

        let stats = tokio::time::timeout(Duration::from_secs(5), bridge.stats())
            .await
            .expect("stats stalled")
            .unwrap();
        assert_eq!(stats.topics, 2);
        assert_eq!(stats.listeners, 2);

        tokio::time::timeout(Duration::from_secs(5), expect_pong(&mut server))
            .await
            .expect("ping stalled");

        for n in 0..3 {
            assert_eq!(
                stalled.recv().await,
                Some(SubscriptionEvent::Next(json!({"logStream": [{"id": n}]})))
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unread_topic_drops_events_beyond_backlog() {
        let (connector, mut accepted) = FakeConnector::new();
        let bridge = bridge(connector);

        let mut logs = bridge.subscribe(log_stream("svc-1")).unwrap();
        let mut server = accepted.recv().await.unwrap();
        let id = expect_subscribe(&mut server).await;

        let sent = TOPIC_BACKLOG + 10;
        for n in 0..sent {
            server.send(next(&id, json!({"n": n})));
        }
        server.send(ServerMessage::Complete { id });

        let mut received = Vec::new();
        let mut completed = false;
        while let Some(event) = logs.recv().await {
            match event {
                SubscriptionEvent::Next(data) => received.push(data["n"].as_u64().unwrap()),
                SubscriptionEvent::Completed => completed = true,
                other => panic!("unexpected event {:?}", other),
            }
        }

        // The oldest events are kept and the completion still arrives.
        assert!(received.len() >= TOPIC_BACKLOG && received.len() <= TOPIC_BACKLOG + 1);
        assert_eq!(received, (0..received.len() as u64).collect::<Vec<_>>());
        assert!(completed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_are_served_while_connecting() {
        let (connector, mut accepted) = FakeConnector::new();
        connector.delay_connects(Duration::from_secs(30));
        let bridge = bridge(connector);

        let started = tokio::time::Instant::now();
        let first = bridge.subscribe(log_stream("svc-1")).unwrap();
        let stats = bridge.stats().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(30));
        assert!(!stats.connected);
        assert_eq!(stats.topics, 1);

        let _second = bridge.subscribe(log_stream("svc-2")).unwrap();
        drop(first);
        let stats = bridge.stats().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(30));
        assert_eq!(stats.topics, 1);
        assert_eq!(stats.listeners, 1);

        let mut server = accepted.recv().await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(30));
        let (_, payload) = recv_subscribe(&mut server).await;
        assert_eq!(payload.variables["serviceId"], json!("svc-2"));
        // Nothing was sent for the topic removed while connecting.
        expect_pong(&mut server).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_without_remaining_topics_is_released() {
        let (connector, mut accepted) = FakeConnector::new();
        connector.delay_connects(Duration::from_secs(30));
        let bridge = bridge(connector);

        let logs = bridge.subscribe(log_stream("svc-1")).unwrap();
        assert_eq!(bridge.stats().await.unwrap().topics, 1);
        drop(logs);

        let mut server = accepted.recv().await.unwrap();
        assert_eq!(server.received.recv().await, None);

        let stats = bridge.stats().await.unwrap();
        assert!(!stats.connected);
        assert_eq!(stats.topics, 0);
        assert_eq!(stats.connects, 0);
    }
}
