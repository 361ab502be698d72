//! The one owner of the shared transport.
//!
//! [`ConnectionManager`] creates the transport lazily, tracks its lifecycle
//! as an explicit state machine, queues each subscriber's outbound envelopes
//! while the connection is not open, and fans every inbound envelope out to
//! all subscribers bound to its channel.
//!
//! ```text
//!            ensure_connected
//!   Closed ─────────────────▶ Connecting ──open──▶ Open
//!     ▲  ◀──── close/error ────────┘                │
//!     │                                             │
//!     └──────────────────── close/error ◀───────────┘
//!   Closed ──(transport retries)──▶ Connecting
//! ```

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use tokio::sync::watch;

use super::binding::ChannelBinding;
use super::latency::LatencyProbe;
use super::lock;
use super::registry::{Deliver, SubscriberRegistry};
use crate::config::ClientConfig;
use crate::domain::{ChannelName, Clock, Endpoint, Envelope, SubscriberId, SystemClock, parse_frame};
use crate::error::{ChannelError, TransportError};
use crate::ws::{Connector, Transport, TransportEvents, WebSocketConnector};

static GLOBAL: OnceLock<Arc<ConnectionManager>> = OnceLock::new();

/// Lifecycle state of the shared transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// A connect attempt is in progress.
    Connecting,
    /// Frames are delivered immediately.
    Open,
    /// No live connection; sends are queued.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        })
    }
}

/// Two-valued status derived from [`ConnectionState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionStatus {
    /// The transport is open.
    Connected,
    /// The transport is connecting or closed.
    NotConnected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connected => "connected",
            Self::NotConnected => "not connected",
        })
    }
}

#[derive(Debug)]
struct ManagerState {
    connection: ConnectionState,
    transport: Option<Arc<dyn Transport>>,
    registry: SubscriberRegistry,
}

/// Owner of the single transport and the subscriber registry.
///
/// # Concurrency
///
/// - The transport, the registry and every outbound queue share one lock.
/// - Inbound dispatch is serialized: one envelope's fan-out completes
///   before the next begins.
/// - Listeners run outside the state lock and may send or dispose.
#[derive(Debug)]
pub struct ConnectionManager {
    state: Mutex<ManagerState>,
    dispatch: Mutex<()>,
    status_tx: watch::Sender<ConnectionState>,
    probe: LatencyProbe,
    connector: Arc<dyn Connector>,
    clock: Arc<dyn Clock>,
}

impl ConnectionManager {
    /// Creates a manager that builds its transport with `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>) -> Arc<Self> {
        Self::with_clock(connector, Arc::new(SystemClock))
    }

    /// Creates a manager with an explicit clock.
    #[must_use]
    pub fn with_clock(connector: Arc<dyn Connector>, clock: Arc<dyn Clock>) -> Arc<Self> {
        let (status_tx, _) = watch::channel(ConnectionState::Closed);
        Arc::new(Self {
            state: Mutex::new(ManagerState {
                connection: ConnectionState::Closed,
                transport: None,
                registry: SubscriberRegistry::new(),
            }),
            dispatch: Mutex::new(()),
            status_tx,
            probe: LatencyProbe::new(),
            connector,
            clock,
        })
    }

    /// Creates a manager using the WebSocket transport configured by `config`.
    #[must_use]
    pub fn from_config(config: &ClientConfig) -> Arc<Self> {
        Self::new(Arc::new(WebSocketConnector::new(config.reconnect_policy())))
    }

    /// Returns the process-wide manager, building it from the environment
    /// on first use.
    #[must_use]
    pub fn global() -> Arc<Self> {
        Arc::clone(GLOBAL.get_or_init(|| {
            let config = ClientConfig::from_env().unwrap_or_else(|err| {
                tracing::warn!(error = %err, "invalid client configuration, using defaults");
                ClientConfig::default()
            });
            Self::from_config(&config)
        }))
    }

    /// Creates the transport for `endpoint` unless one already exists.
    ///
    /// Idempotent: later calls are no-ops whatever endpoint they pass, so
    /// there is at most one transport per manager.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Transport`] if the connector cannot start a
    /// transport (for example, outside a tokio runtime).
    pub fn ensure_connected(self: &Arc<Self>, endpoint: &Endpoint) -> Result<(), ChannelError> {
        let mut state = lock(&self.state);
        if state.transport.is_some() {
            return Ok(());
        }

        let url = endpoint.url();
        let events = TransportEvents::new(Arc::downgrade(self));
        let transport = self.connector.connect(&url, events)?;
        state.transport = Some(transport);
        self.transition(&mut state, ConnectionState::Connecting);

        tracing::info!(%url, "transport created");
        Ok(())
    }

    /// Binds `channel` on this manager.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidChannel`] if `channel` is empty.
    pub fn bind(self: &Arc<Self>, channel: &str) -> Result<ChannelBinding, ChannelError> {
        ChannelBinding::with_manager(self, channel)
    }

    /// Adds a subscriber on `channel` that receives fan-out through `sink`.
    pub fn register(&self, channel: ChannelName, sink: Weak<dyn Deliver>) -> SubscriberId {
        let id = lock(&self.state).registry.insert(channel.clone(), sink);
        tracing::debug!(subscriber = %id, %channel, "subscriber registered");
        id
    }

    /// Removes a subscriber and discards its queued envelopes.
    pub fn unregister(&self, id: SubscriberId) {
        if let Some(dropped) = lock(&self.state).registry.remove(id) {
            tracing::debug!(subscriber = %id, dropped_pending = dropped, "subscriber unregistered");
        }
    }

    /// Sends `payload` on the subscriber's channel, stamped with the
    /// current time.
    ///
    /// Transmits immediately when open and nothing is queued ahead of it;
    /// otherwise appends to the subscriber's queue.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::UnknownSubscriber`] if `id` is not
    /// registered, or
    /// [`ChannelError::Encode`] if the envelope cannot be encoded.
    pub fn send(&self, id: SubscriberId, payload: serde_json::Value) -> Result<(), ChannelError> {
        let now = self.clock.now_millis();
        let mut guard = lock(&self.state);
        let state = &mut *guard;

        let Some(entry) = state.registry.get_mut(id) else {
            return Err(ChannelError::UnknownSubscriber(id));
        };
        let envelope = Envelope::new(entry.channel.clone(), payload, now);

        if state.connection == ConnectionState::Open
            && entry.pending.is_empty()
            && let Some(transport) = &state.transport
        {
            match transport.send(envelope.to_frame()?) {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::debug!(channel = %entry.channel, error = %err, "transport refused frame, queueing");
                }
            }
        }

        entry.pending.push_back(envelope);
        Ok(())
    }

    /// The transport started a (re)connect attempt.
    pub fn on_transport_connecting(&self) {
        let mut state = lock(&self.state);
        self.transition(&mut state, ConnectionState::Connecting);
    }

    /// The transport opened: flush every subscriber's queue in order.
    pub fn on_transport_open(&self) {
        let mut state = lock(&self.state);
        self.transition(&mut state, ConnectionState::Open);
        let flushed = Self::flush(&mut state);
        drop(state);

        tracing::info!(flushed, "transport open");
        if self.probe.is_active() {
            self.send_ping();
        }
    }

    /// Parses an inbound frame and dispatches what it carries.
    ///
    /// Pings go to the latency probe; everything else is delivered once to
    /// each subscriber bound to the envelope's channel. A malformed frame is
    /// discarded and logged.
    pub fn on_transport_message(&self, raw: &str) {
        let envelopes = match parse_frame(raw) {
            Ok(envelopes) => envelopes,
            Err(err) => {
                tracing::warn!(error = %err, len = raw.len(), "discarding malformed frame");
                return;
            }
        };

        let _dispatch = lock(&self.dispatch);
        for envelope in envelopes {
            if envelope.is_ping() {
                let rtt = self.probe.record_pong(&envelope, self.clock.now_millis());
                tracing::trace!(rtt_ms = rtt, "pong received");
                continue;
            }

            let sinks = lock(&self.state).registry.matching(&envelope.channel);
            tracing::trace!(channel = %envelope.channel, deliveries = sinks.len(), "fan-out");
            for sink in sinks {
                if catch_unwind(AssertUnwindSafe(|| sink.deliver(&envelope))).is_err() {
                    tracing::error!(channel = %envelope.channel, "subscriber panicked during delivery");
                }
            }
        }
    }

    /// The transport closed.
    pub fn on_transport_close(&self) {
        let mut state = lock(&self.state);
        self.transition(&mut state, ConnectionState::Closed);
        drop(state);
        tracing::info!("transport closed");
    }

    /// The transport failed. Reconnecting is left to the transport.
    pub fn on_transport_error(&self, err: &TransportError) {
        let mut state = lock(&self.state);
        self.transition(&mut state, ConnectionState::Closed);
        drop(state);
        tracing::error!(error = %err, "transport error");
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        lock(&self.state).connection
    }

    /// `Connected` when open, `NotConnected` otherwise.
    #[must_use]
    pub fn connection_status(&self) -> ConnectionStatus {
        match self.connection_state() {
            ConnectionState::Open => ConnectionStatus::Connected,
            ConnectionState::Connecting | ConnectionState::Closed => ConnectionStatus::NotConnected,
        }
    }

    /// Returns a receiver that observes every state change.
    #[must_use]
    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.status_tx.subscribe()
    }

    /// Starts pinging every `interval`, replacing a running probe.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Transport`] if called outside a tokio runtime.
    pub fn start_latency_probe(self: &Arc<Self>, interval: Duration) -> Result<(), ChannelError> {
        self.probe.start(Arc::downgrade(self), interval)?;
        tracing::info!(interval_ms = interval.as_millis(), "latency probe started");
        Ok(())
    }

    /// Stops pinging. Collected samples are kept.
    pub fn stop_latency_probe(&self) {
        self.probe.stop();
        tracing::info!("latency probe stopped");
    }

    /// The latency probe owned by this manager.
    #[must_use]
    pub const fn latency_probe(&self) -> &LatencyProbe {
        &self.probe
    }

    /// Mean RTT over the last samples; `None` while unknown.
    #[must_use]
    pub fn average_rtt(&self) -> Option<f64> {
        self.probe.average_rtt()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        lock(&self.state).registry.len()
    }

    /// Number of envelopes queued for `id`.
    #[must_use]
    pub fn pending_count(&self, id: SubscriberId) -> usize {
        lock(&self.state).registry.pending_len(id)
    }

    /// Sends one ping if the transport is open. Pings are never queued.
    pub(crate) fn send_ping(&self) -> bool {
        let ping = Envelope::ping(self.clock.now_millis(), self.probe.average_rtt());
        let frame = match ping.to_frame() {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, "failed to encode ping");
                return false;
            }
        };

        let state = lock(&self.state);
        if state.connection != ConnectionState::Open {
            return false;
        }
        state
            .transport
            .as_ref()
            .is_some_and(|transport| transport.send(frame).is_ok())
    }

    fn transition(&self, state: &mut ManagerState, next: ConnectionState) {
        let previous = state.connection;
        state.connection = next;
        if previous != next {
            tracing::debug!(from = %previous, to = %next, "connection state changed");
            self.status_tx.send_replace(next);
        }
    }

    /// Flushes every queue in FIFO order. Stops at the first refused frame
    /// and leaves it, and everything after it, queued.
    fn flush(state: &mut ManagerState) -> usize {
        let Some(transport) = state.transport.as_ref() else {
            return 0;
        };

        let mut flushed = 0;
        for entry in state.registry.entries_mut() {
            while let Some(envelope) = entry.pending.pop_front() {
                let frame = match envelope.to_frame() {
                    Ok(frame) => frame,
                    Err(err) => {
                        tracing::warn!(channel = %entry.channel, error = %err, "dropping unencodable envelope");
                        continue;
                    }
                };
                if let Err(err) = transport.send(frame) {
                    tracing::debug!(error = %err, "transport refused flush, keeping queue");
                    entry.pending.push_front(envelope);
                    return flushed;
                }
                flushed += 1;
            }
        }
        flushed
    }
}
