//! Per-channel handle over the shared connection.
//!
//! A [`ChannelBinding`] is what application code holds: it sends on one
//! channel and receives every envelope the manager fans out for that
//! channel. Multiplexing stays hidden behind it.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde::Serialize;
use tokio::sync::mpsc;

use super::lock;
use super::manager::ConnectionManager;
use super::registry::Deliver;
use crate::domain::{ChannelName, Envelope, SubscriberId};
use crate::error::ChannelError;

/// Returns `false` once it wants no further deliveries.
type Listener = Arc<dyn Fn(&Envelope) -> bool + Send + Sync>;

/// Delivery side of a binding, weakly referenced by the registry.
struct BindingShared {
    channel: ChannelName,
    active: AtomicBool,
    listeners: Mutex<Vec<Listener>>,
}

impl fmt::Debug for BindingShared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingShared")
            .field("channel", &self.channel)
            .field("active", &self.active.load(Ordering::Acquire))
            .field("listeners", &lock(&self.listeners).len())
            .finish()
    }
}

impl Deliver for BindingShared {
    fn deliver(&self, envelope: &Envelope) {
        let listeners = lock(&self.listeners).clone();
        let mut finished = Vec::new();
        for listener in listeners {
            // Disposal may happen from inside a listener.
            if !self.active.load(Ordering::Acquire) {
                break;
            }
            match catch_unwind(AssertUnwindSafe(|| listener(envelope))) {
                Ok(true) => {}
                Ok(false) => finished.push(listener),
                Err(_) => tracing::error!(channel = %self.channel, "channel listener panicked"),
            }
        }

        if !finished.is_empty() {
            lock(&self.listeners)
                .retain(|listener| !finished.iter().any(|done| Arc::ptr_eq(listener, done)));
            tracing::debug!(channel = %self.channel, removed = finished.len(), "dropped closed event streams");
        }
    }
}

/// Scoped view of one named channel.
///
/// Dropping the binding disposes it.
#[derive(Debug)]
pub struct ChannelBinding {
    manager: Arc<ConnectionManager>,
    id: SubscriberId,
    shared: Arc<BindingShared>,
}

impl ChannelBinding {
    /// Binds `channel` on the process-wide manager.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidChannel`] if `channel` is empty.
    pub fn create(channel: &str) -> Result<Self, ChannelError> {
        Self::with_manager(&ConnectionManager::global(), channel)
    }

    /// Binds `channel` on an explicit manager.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidChannel`] if `channel` is empty.
    pub fn with_manager(
        manager: &Arc<ConnectionManager>,
        channel: &str,
    ) -> Result<Self, ChannelError> {
        let channel = ChannelName::new(channel)?;
        let shared = Arc::new(BindingShared {
            channel: channel.clone(),
            active: AtomicBool::new(true),
            listeners: Mutex::new(Vec::new()),
        });
        let weak: Weak<BindingShared> = Arc::downgrade(&shared);
        let id = manager.register(channel, weak);
        Ok(Self {
            manager: Arc::clone(manager),
            id,
            shared,
        })
    }

    /// Channel this binding is bound to.
    #[must_use]
    pub fn channel(&self) -> &ChannelName {
        &self.shared.channel
    }

    /// Registry id of this binding.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Serializes `payload` and sends it on this channel.
    ///
    /// Queued while the connection is not open and flushed, in order, once
    /// it opens, unless the binding is disposed first.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Encode`] if `payload` cannot be serialized,
    /// or [`ChannelError::Disposed`] if the binding was disposed.
    pub fn send<T>(&self, payload: &T) -> Result<(), ChannelError>
    where
        T: Serialize + ?Sized,
    {
        self.send_value(serde_json::to_value(payload)?)
    }

    /// Sends an already-built JSON payload on this channel.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Disposed`] if the binding was disposed.
    pub fn send_value(&self, payload: serde_json::Value) -> Result<(), ChannelError> {
        if self.is_disposed() {
            tracing::warn!(channel = %self.shared.channel, "send on disposed binding ignored");
            return Err(ChannelError::Disposed(self.shared.channel.to_string()));
        }
        match self.manager.send(self.id, payload) {
            // Disposed concurrently, after the check above.
            Err(ChannelError::UnknownSubscriber(_)) => {
                Err(ChannelError::Disposed(self.shared.channel.to_string()))
            }
            result => result,
        }
    }

    /// Registers a listener called with every envelope delivered on this
    /// channel. Listeners run in registration order.
    pub fn on_event<F>(&self, listener: F)
    where
        F: Fn(&Envelope) + Send + Sync + 'static,
    {
        lock(&self.shared.listeners).push(Arc::new(move |envelope: &Envelope| {
            listener(envelope);
            true
        }));
    }

    /// Returns a stream of every envelope delivered from now on.
    ///
    /// The stream stops receiving, and its listener is dropped, on the
    /// first delivery after the receiver is dropped.
    #[must_use]
    pub fn events(&self) -> mpsc::UnboundedReceiver<Envelope> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.shared.listeners).push(Arc::new(move |envelope: &Envelope| {
            tx.send(envelope.clone()).is_ok()
        }));
        rx
    }

    /// Returns `true` once the binding has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        !self.shared.active.load(Ordering::Acquire)
    }

    /// Unregisters the binding and discards its queued envelopes.
    ///
    /// Idempotent. Frames already handed to the transport are not recalled.
    pub fn dispose(&self) {
        if self.shared.active.swap(false, Ordering::AcqRel) {
            self.manager.unregister(self.id);
        }
    }
}

impl Drop for ChannelBinding {
    fn drop(&mut self) {
        self.dispose();
    }
}
