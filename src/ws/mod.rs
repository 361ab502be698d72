//! WebSocket layer: transport seam, reconnecting client, session loop.
//!
//! The connection core only sees the [`Transport`] and [`Connector`]
//! traits. [`WebSocketConnector`] is the production implementation.

pub mod backoff;
mod connection;
pub mod connector;
pub mod transport;

pub use backoff::{Backoff, ReconnectPolicy};
pub use connector::{WebSocketConnector, WebSocketTransport};
pub use transport::{Connector, Transport, TransportEvents};
