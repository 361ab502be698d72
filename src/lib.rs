//! # redwood-channels
//!
//! Channel-multiplexed, reconnecting WebSocket client for real-time group
//! sessions.
//!
//! Many named channels share one connection per participant. Outbound
//! messages sent while the connection is down are buffered per binding and
//! flushed in order once it opens; inbound messages fan out to every
//! binding on their channel; a ping loop samples round-trip time.
//!
//! ## Architecture
//!
//! ```text
//! Application code
//!     │
//!     ├── ChannelBinding (connection/)   one per channel handle
//!     │
//!     ├── ConnectionManager (connection/) singleton: registry, queues,
//!     │       │                           fan-out, state machine
//!     │       └── LatencyProbe            ping loop, RTT window
//!     │
//!     ├── Transport / Connector (ws/)     seam
//!     │
//!     └── WebSocketConnector (ws/)        tokio-tungstenite, reconnect backoff
//! ```
//!
//! ```rust,no_run
//! # use redwood_channels::{ConnectionManager, Endpoint};
//! # async fn example() -> Result<(), redwood_channels::ChannelError> {
//! let manager = ConnectionManager::global();
//! manager.ensure_connected(&Endpoint::new("ws://localhost:8000", "market", "1", "n282bsh4"))?;
//!
//! let orders = manager.bind("orders")?;
//! orders.on_event(|event| println!("{} {}", event.timestamp, event.payload));
//! orders.send(&serde_json::json!({"type": "bid", "price": 5, "quantity": 2}))?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod domain;
pub mod error;
pub mod ws;

pub use config::ClientConfig;
pub use connection::{
    ChannelBinding, ConnectionManager, ConnectionState, ConnectionStatus, LatencyProbe,
};
pub use domain::{ChannelName, Endpoint, Envelope};
pub use error::{ChannelError, TransportError};
