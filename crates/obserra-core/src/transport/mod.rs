//! Transports for the query endpoint (HTTP) and the live channel (WebSocket).
//!
//! The executor and the subscription bridge are generic over the traits in
//! this module so tests can substitute in-memory fakes.

use std::future::Future;

use crate::protocol::{ClientMessage, Request, Response, ServerMessage};

pub mod cache;
pub mod errors;
pub mod http;
pub mod ws;

pub use cache::CachedTransport;
pub use errors::TransportError;
pub use http::HttpTransport;
pub use ws::{WsConnection, WsConnector};

/// Point-to-point request/response channel.
pub trait Transport: Send + Sync + 'static {
    /// Send one request and return the parsed envelope.
    ///
    /// Dropping the returned future abandons the request.
    fn execute(
        &self,
        request: &Request,
    ) -> impl Future<Output = Result<Response, TransportError>> + Send;
}

/// Opens the single physical live connection.
pub trait Connector: Send + Sync + 'static {
    type Connection: LiveConnection;

    /// Connect and complete the protocol handshake.
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// An established live connection.
pub trait LiveConnection: Send + 'static {
    fn send(
        &mut self,
        message: ClientMessage,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Next server message, or `None` once the connection is closed.
    ///
    /// Must be cancel safe: dropping the future before it completes must not
    /// lose a message.
    fn next_message(
        &mut self,
    ) -> impl Future<Output = Option<Result<ServerMessage, TransportError>>> + Send;

    fn close(&mut self) -> impl Future<Output = ()> + Send;
}
