use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::transport::{Connector, LiveConnection, TransportError};

/// In-memory connector. Every successful connect hands the server side of
/// the new connection to the test through the `accepted` channel.
#[derive(Clone)]
pub(crate) struct FakeConnector {
    accepted: mpsc::UnboundedSender<FakeServer>,
    attempts: Arc<AtomicU32>,
    failures: Arc<AtomicU32>,
    delay_ms: Arc<AtomicU64>,
}

pub(crate) struct FakeServer {
    pub received: mpsc::UnboundedReceiver<ClientMessage>,
    outgoing: mpsc::UnboundedSender<ServerMessage>,
}

pub(crate) struct FakeConnection {
    sent: mpsc::UnboundedSender<ClientMessage>,
    incoming: mpsc::UnboundedReceiver<ServerMessage>,
}

impl FakeConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<FakeServer>) {
        let (accepted, servers) = mpsc::unbounded_channel();
        let connector = Self {
            accepted,
            attempts: Arc::new(AtomicU32::new(0)),
            failures: Arc::new(AtomicU32::new(0)),
            delay_ms: Arc::new(AtomicU64::new(0)),
        };
        (connector, servers)
    }

    /// Refuse the next `count` connection attempts.
    pub fn fail_next(&self, count: u32) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Make every connection attempt take `delay` before it resolves.
    pub fn delay_connects(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl FakeServer {
    pub fn send(&self, message: ServerMessage) {
        let _ = self.outgoing.send(message);
    }
}

impl Connector for FakeConnector {
    type Connection = FakeConnection;

    async fn connect(&self) -> Result<FakeConnection, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let refused = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(TransportError::ConnectionFailed {
                message: "connection refused".to_string(),
            });
        }

        let (sent, received) = mpsc::unbounded_channel();
        let (outgoing, incoming) = mpsc::unbounded_channel();
        let _ = self.accepted.send(FakeServer { received, outgoing });
        Ok(FakeConnection { sent, incoming })
    }
}

impl LiveConnection for FakeConnection {
    async fn send(&mut self, message: ClientMessage) -> Result<(), TransportError> {
        self.sent.send(message).map_err(|_| TransportError::Closed)
    }

    async fn next_message(&mut self) -> Option<Result<ServerMessage, TransportError>> {
        self.incoming.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.incoming.close();
    }
}
