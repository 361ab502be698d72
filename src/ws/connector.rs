//! Reconnecting WebSocket transport built on `tokio-tungstenite`.
//!
//! [`WebSocketConnector::connect`] spawns one task per transport. The task
//! connects, runs a session until it ends, reports the outcome, waits out
//! the backoff delay and tries again, for as long as the owning manager is
//! alive.

use std::sync::{Arc, Mutex, Weak};

use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;

use super::backoff::{Backoff, ReconnectPolicy};
use super::connection::{SessionEnd, run_session};
use super::transport::{Connector, Transport, TransportEvents};
use crate::connection::lock;
use crate::error::TransportError;

/// [`Connector`] producing reconnecting WebSocket transports.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    policy: ReconnectPolicy,
}

impl WebSocketConnector {
    /// Creates a connector with the given reconnect policy.
    #[must_use]
    pub const fn new(policy: ReconnectPolicy) -> Self {
        Self { policy }
    }

    /// Returns the reconnect policy.
    #[must_use]
    pub const fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }
}

impl Connector for WebSocketConnector {
    fn connect(
        &self,
        url: &str,
        events: TransportEvents,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let transport = Arc::new(WebSocketTransport::default());
        runtime.spawn(run_transport(
            url.to_string(),
            self.policy.clone(),
            Arc::downgrade(&transport),
            events,
        ));
        Ok(transport)
    }
}

/// Sending side of a reconnecting WebSocket.
///
/// Holds the outbound queue of the current session, if any.
#[derive(Debug, Default)]
pub struct WebSocketTransport {
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl WebSocketTransport {
    fn attach(&self, sender: mpsc::UnboundedSender<String>) {
        *lock(&self.outbound) = Some(sender);
    }

    fn detach(&self) {
        lock(&self.outbound).take();
    }
}

impl Transport for WebSocketTransport {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        let guard = lock(&self.outbound);
        let Some(sender) = guard.as_ref() else {
            return Err(TransportError::NotOpen);
        };
        sender.send(frame).map_err(|_| TransportError::NotOpen)
    }
}

async fn run_transport(
    url: String,
    policy: ReconnectPolicy,
    transport: Weak<WebSocketTransport>,
    events: TransportEvents,
) {
    let timeout_ms = u64::try_from(policy.connect_timeout.as_millis()).unwrap_or(u64::MAX);
    let mut backoff = Backoff::new(policy.clone());

    while events.is_attached() {
        events.connecting();
        tracing::debug!(%url, attempt = backoff.attempt(), "connecting websocket");

        match tokio::time::timeout(policy.connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((socket, _response))) => {
                backoff.reset();
                let (tx, rx) = mpsc::unbounded_channel();
                let Some(shared) = transport.upgrade() else {
                    break;
                };
                shared.attach(tx);
                drop(shared);

                tracing::info!(%url, "websocket connected");
                events.open();

                let end = run_session(socket, rx, &events).await;
                if let Some(shared) = transport.upgrade() {
                    shared.detach();
                }

                match end {
                    SessionEnd::Closed => {
                        tracing::info!(%url, "websocket closed");
                        events.close();
                    }
                    SessionEnd::Failed(err) => {
                        tracing::warn!(%url, error = %err, "websocket session failed");
                        events.error(&err);
                    }
                    SessionEnd::Detached => break,
                }
            }
            Ok(Err(err)) => {
                let err = TransportError::Connect(err.to_string());
                tracing::warn!(%url, error = %err, "websocket connect failed");
                events.error(&err);
            }
            Err(_) => {
                let err = TransportError::Timeout { timeout_ms };
                tracing::warn!(%url, error = %err, "websocket connect timed out");
                events.error(&err);
            }
        }

        if transport.strong_count() == 0 {
            break;
        }

        let delay = backoff.next_delay();
        tracing::debug!(delay_ms = delay.as_millis(), "waiting before reconnect");
        tokio::time::sleep(delay).await;
    }

    tracing::debug!(%url, "transport task stopped");
}
