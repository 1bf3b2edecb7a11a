use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::{Connector, LiveConnection, TransportError};
use crate::protocol::messages::SUBPROTOCOL;
use crate::protocol::{ClientMessage, ServerMessage};

/// How long the server may take to acknowledge `connection_init`.
const CONNECTION_ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Opens `graphql-transport-ws` connections to one endpoint.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

/// One open WebSocket connection that has completed the handshake.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Connector for WsConnector {
    type Connection = WsConnection;

    async fn connect(&self) -> Result<WsConnection, TransportError> {
        let mut request =
            self.url
                .as_str()
                .into_client_request()
                .map_err(|e| TransportError::ConnectionFailed {
                    message: format!("invalid WebSocket URL '{}': {}", self.url, e),
                })?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(SUBPROTOCOL),
        );

        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                message: e.to_string(),
            })?;

        let mut connection = WsConnection { stream };
        connection
            .send(ClientMessage::ConnectionInit { payload: None })
            .await?;

        let ack = tokio::time::timeout(CONNECTION_ACK_TIMEOUT, connection.next_message())
            .await
            .map_err(|_| TransportError::ConnectionFailed {
                message: "timed out waiting for connection_ack".to_string(),
            })?;

        match ack {
            Some(Ok(ServerMessage::ConnectionAck { .. })) => {
                debug!(event = "core.transport.ws_connected", url = %self.url);
                Ok(connection)
            }
            Some(Ok(other)) => Err(TransportError::MalformedPayload {
                message: format!("expected connection_ack, got {:?}", other),
            }),
            Some(Err(e)) => Err(e),
            None => Err(TransportError::Closed),
        }
    }
}

impl LiveConnection for WsConnection {
    async fn send(&mut self, message: ClientMessage) -> Result<(), TransportError> {
        let text =
            serde_json::to_string(&message).map_err(|e| TransportError::MalformedPayload {
                message: e.to_string(),
            })?;

        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::ConnectionFailed {
                message: e.to_string(),
            })
    }

    async fn next_message(&mut self) -> Option<Result<ServerMessage, TransportError>> {
        loop {
            let frame = match self.stream.next().await? {
                Ok(frame) => frame,
                Err(e) => {
                    return Some(Err(TransportError::ConnectionFailed {
                        message: e.to_string(),
                    }));
                }
            };

            let text = match frame {
                Message::Text(text) => text,
                Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Message::Close(frame) => {
                    debug!(event = "core.transport.ws_close_received", frame = ?frame);
                    return None;
                }
                // Control frames are answered by tungstenite itself.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            };

            return Some(serde_json::from_str(&text).map_err(|e| {
                warn!(event = "core.transport.ws_message_invalid", error = %e);
                TransportError::MalformedPayload {
                    message: e.to_string(),
                }
            }));
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(event = "core.transport.ws_close_failed", error = %e);
        }
    }
}
