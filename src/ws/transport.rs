//! Transport seam between the connection core and the wire.
//!
//! A [`Connector`] builds the one [`Transport`] the
//! [`ConnectionManager`](crate::connection::ConnectionManager) owns, and
//! hands it a [`TransportEvents`] handle through which the transport reports
//! its lifecycle. The transport owns its own reconnect policy; the manager
//! only reacts to the events.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::connection::ConnectionManager;
use crate::error::TransportError;

/// Outbound half of a live connection.
pub trait Transport: Send + Sync {
    /// Hands a text frame to the connection.
    ///
    /// Must not block. A frame accepted here is in flight and cannot be
    /// recalled.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotOpen`] if there is no live connection
    /// to take the frame.
    fn send(&self, frame: String) -> Result<(), TransportError>;
}

impl fmt::Debug for dyn Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Transport}}")
    }
}

/// Factory for the manager's transport.
pub trait Connector: Send + Sync {
    /// Starts a transport for `url` that reports its lifecycle to `events`.
    ///
    /// Implementations must not invoke `events` synchronously from inside
    /// this call.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the transport cannot be started at
    /// all (for example, no runtime to drive it).
    fn connect(
        &self,
        url: &str,
        events: TransportEvents,
    ) -> Result<Arc<dyn Transport>, TransportError>;
}

impl fmt::Debug for dyn Connector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Connector}}")
    }
}

/// Lifecycle callbacks from a transport back to its manager.
///
/// Holds only a weak reference: a transport never keeps its manager alive.
#[derive(Clone)]
pub struct TransportEvents {
    manager: Weak<ConnectionManager>,
}

impl fmt::Debug for TransportEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportEvents")
            .field("attached", &self.is_attached())
            .finish()
    }
}

impl TransportEvents {
    pub(crate) const fn new(manager: Weak<ConnectionManager>) -> Self {
        Self { manager }
    }

    /// Returns `true` while the manager that owns the transport is alive.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.manager.strong_count() > 0
    }

    /// A (re)connect attempt has started.
    pub fn connecting(&self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.on_transport_connecting();
        }
    }

    /// The handshake completed; frames can now be sent.
    pub fn open(&self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.on_transport_open();
        }
    }

    /// A text frame arrived.
    pub fn message(&self, raw: &str) {
        if let Some(manager) = self.manager.upgrade() {
            manager.on_transport_message(raw);
        }
    }

    /// The connection closed.
    pub fn close(&self) {
        if let Some(manager) = self.manager.upgrade() {
            manager.on_transport_close();
        }
    }

    /// The connection or a connect attempt failed.
    pub fn error(&self, err: &TransportError) {
        if let Some(manager) = self.manager.upgrade() {
            manager.on_transport_error(err);
        }
    }
}
