//! GraphQL wire types shared by the HTTP and WebSocket transports.

pub mod messages;
pub mod request;
pub mod response;

pub use messages::{ClientMessage, ServerMessage};
pub use request::{OperationKind, OperationPayload, QueryKey, Request, RequestPolicy};
pub use response::{GraphQlError, PathSegment, Response};
