//! Live subscriptions multiplexed over one WebSocket connection.
//!
//! [`SubscriptionBridge`] hands out [`Subscription`] handles. A background
//! driver task owns the connection and the registry of topics, keyed by
//! [`QueryKey`](crate::protocol::QueryKey), so identical requests share one
//! upstream subscription. Each topic delivers to its listeners from its own
//! task, so a listener that stops reading holds back only its own topic.

mod bridge;
mod driver;
mod fanout;
pub mod errors;
pub mod types;

#[cfg(test)]
mod fake;

pub use bridge::{Subscription, SubscriptionBridge};
pub use errors::SubscriptionError;
pub use types::{BridgeStats, ListenerId, SubscriptionEvent};
