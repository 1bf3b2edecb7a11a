use serde_json::Value;

use crate::errors::ObserraError;
use crate::protocol::GraphQlError;
use crate::protocol::response::join_messages;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubscriptionError {
    /// The server ended the subscription with an `error` message.
    #[error("Subscription rejected: {}", join_messages(.errors))]
    Rejected { errors: Vec<GraphQlError> },

    /// One event carried `errors`; the subscription stays active.
    #[error("Subscription event failed: {}", join_messages(.errors))]
    Operation {
        errors: Vec<GraphQlError>,
        data: Option<Value>,
    },

    #[error("Subscription bridge is closed")]
    BridgeClosed,
}

impl ObserraError for SubscriptionError {
    fn error_code(&self) -> &'static str {
        match self {
            SubscriptionError::Rejected { .. } => "SUBSCRIPTION_REJECTED",
            SubscriptionError::Operation { .. } => "SUBSCRIPTION_OPERATION_ERROR",
            SubscriptionError::BridgeClosed => "SUBSCRIPTION_BRIDGE_CLOSED",
        }
    }
}
