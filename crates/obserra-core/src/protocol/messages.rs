use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::request::OperationPayload;
use super::response::{GraphQlError, Response};

/// Sub-protocol negotiated on the WebSocket upgrade.
pub const SUBPROTOCOL: &str = "graphql-transport-ws";

/// Client -> Server messages of the `graphql-transport-ws` protocol.
///
/// Each variant maps to a JSON text frame with `"type"` as the tag field.
/// Operation messages carry the `id` the client chose for the subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// First message on every connection. The server answers `connection_ack`.
    #[serde(rename = "connection_init")]
    ConnectionInit {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    #[serde(rename = "subscribe")]
    Subscribe { id: String, payload: OperationPayload },

    /// Stop one subscription.
    #[serde(rename = "complete")]
    Complete { id: String },

    #[serde(rename = "ping")]
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    #[serde(rename = "pong")]
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}

/// Server -> Client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "connection_ack")]
    ConnectionAck {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    /// One event for a subscription.
    #[serde(rename = "next")]
    Next { id: String, payload: Response },

    /// The subscription failed before or while streaming. No further
    /// messages follow for this `id`.
    #[serde(rename = "error")]
    Error {
        id: String,
        payload: Vec<GraphQlError>,
    },

    /// The server finished the subscription.
    #[serde(rename = "complete")]
    Complete { id: String },

    #[serde(rename = "ping")]
    Ping {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },

    #[serde(rename = "pong")]
    Pong {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
    },
}

impl ServerMessage {
    /// Subscription id for operation messages, `None` for connection-level ones.
    pub fn id(&self) -> Option<&str> {
        match self {
            ServerMessage::Next { id, .. }
            | ServerMessage::Error { id, .. }
            | ServerMessage::Complete { id } => Some(id),
            ServerMessage::ConnectionAck { .. }
            | ServerMessage::Ping { .. }
            | ServerMessage::Pong { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_subscribe_wire_format() {
        let msg = ClientMessage::Subscribe {
            id: "sub-1".to_string(),
            payload: OperationPayload {
                query: "subscription ServiceLogStream($serviceId: ID!) { logStream(serviceId: $serviceId) { id } }".to_string(),
                operation_name: Some("ServiceLogStream".to_string()),
                variables: json!({"serviceId": "svc-1"}).as_object().cloned().unwrap(),
            },
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "subscribe");
        assert_eq!(value["id"], "sub-1");
        assert_eq!(value["payload"]["operationName"], "ServiceLogStream");
        assert_eq!(value["payload"]["variables"]["serviceId"], "svc-1");
    }

    #[test]
    fn test_connection_init_omits_empty_payload() {
        let json = serde_json::to_string(&ClientMessage::ConnectionInit { payload: None }).unwrap();
        assert_eq!(json, r#"{"type":"connection_init"}"#);
    }

    #[test]
    fn test_parse_next_message() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"type":"next","id":"sub-1","payload":{"data":{"logStream":[]}}}"#,
        )
        .unwrap();

        assert_eq!(msg.id(), Some("sub-1"));
        match msg {
            ServerMessage::Next { payload, .. } => {
                assert_eq!(payload.data, Some(json!({"logStream": []})));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_parse_error_message() {
        let msg: ServerMessage = serde_json::from_str(
            r#"{"type":"error","id":"sub-2","payload":[{"message":"unknown service"}]}"#,
        )
        .unwrap();

        assert!(matches!(
            msg,
            ServerMessage::Error { ref payload, .. } if payload[0].message == "unknown service"
        ));
    }

    #[test]
    fn test_parse_ack_and_ping() {
        let ack: ServerMessage = serde_json::from_str(r#"{"type":"connection_ack"}"#).unwrap();
        assert_eq!(ack, ServerMessage::ConnectionAck { payload: None });
        assert_eq!(ack.id(), None);

        let ping: ServerMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(ping, ServerMessage::Ping { payload: None });
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        let result: Result<ServerMessage, _> = serde_json::from_str(r#"{"type":"data","id":"1"}"#);
        assert!(result.is_err());
    }
}
