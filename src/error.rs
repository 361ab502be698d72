//! Client error types.
//!
//! [`ChannelError`] is returned by the public channel and connection
//! operations. [`TransportError`] describes failures of the underlying
//! connection and is wrapped by [`ChannelError::Transport`] when it escapes
//! to the caller.
//!
//! Transport faults observed while the connection is running are never
//! returned to listeners; they surface as connection state transitions
//! and `tracing` diagnostics instead.

use crate::domain::SubscriberId;

/// Errors raised by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The transport has no live connection to hand the frame to.
    #[error("transport is not open")]
    NotOpen,

    /// No tokio runtime is available to drive the connection task.
    #[error("no tokio runtime available to drive the transport")]
    NoRuntime,

    /// The connection attempt failed.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The connection attempt did not complete within the configured timeout.
    #[error("connect timed out after {timeout_ms} ms")]
    Timeout {
        /// Timeout that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// Read or write failure on an established connection.
    #[error("io error: {0}")]
    Io(String),
}

/// Errors raised by [`crate::connection::ConnectionManager`] and
/// [`crate::connection::ChannelBinding`].
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// Channel names must be non-empty.
    #[error("invalid channel name: {0:?}")]
    InvalidChannel(String),

    /// The binding was disposed; it can no longer send.
    #[error("binding for channel {0} has been disposed")]
    Disposed(String),

    /// No subscriber is registered under this id.
    #[error("subscriber {0} is not registered")]
    UnknownSubscriber(SubscriberId),

    /// A payload could not be encoded as JSON.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// The transport could not be constructed or driven.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ChannelError {
    /// Returns `true` for [`ChannelError::Disposed`].
    #[must_use]
    pub const fn is_disposed(&self) -> bool {
        matches!(self, Self::Disposed(_))
    }
}
