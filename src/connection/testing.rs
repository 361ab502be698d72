//! In-memory transport and connector for core tests.

#![allow(clippy::panic)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use super::lock;
use super::manager::ConnectionManager;
use crate::domain::clock::manual::ManualClock;
use crate::domain::{Endpoint, Envelope, parse_frame};
use crate::error::TransportError;
use crate::ws::{Connector, Transport, TransportEvents};

/// Transport that records every frame it accepts.
#[derive(Debug, Default)]
pub(crate) struct RecordingTransport {
    frames: Mutex<Vec<String>>,
    refuse: AtomicBool,
    budget: Mutex<Option<usize>>,
}

impl RecordingTransport {
    pub(crate) fn refuse(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Accepts the next `frames` frames, then refuses until reset with
    /// `None`.
    pub(crate) fn accept_only(&self, frames: Option<usize>) {
        *lock(&self.budget) = frames;
    }

    pub(crate) fn frames(&self) -> Vec<String> {
        lock(&self.frames).clone()
    }

    pub(crate) fn envelopes(&self) -> Vec<Envelope> {
        self.frames()
            .iter()
            .flat_map(|frame| {
                let Ok(envelopes) = parse_frame(frame) else {
                    panic!("transport received malformed frame: {frame}");
                };
                envelopes
            })
            .collect()
    }

    pub(crate) fn payloads(&self) -> Vec<serde_json::Value> {
        self.envelopes()
            .into_iter()
            .filter(|envelope| !envelope.is_ping())
            .map(|envelope| envelope.payload)
            .collect()
    }

    pub(crate) fn ping_count(&self) -> usize {
        self.envelopes().iter().filter(|e| e.is_ping()).count()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, frame: String) -> Result<(), TransportError> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::NotOpen);
        }
        if let Some(remaining) = lock(&self.budget).as_mut() {
            let Some(left) = remaining.checked_sub(1) else {
                return Err(TransportError::NotOpen);
            };
            *remaining = left;
        }
        lock(&self.frames).push(frame);
        Ok(())
    }
}

/// Connector handing out one shared [`RecordingTransport`].
#[derive(Debug, Default)]
pub(crate) struct MockConnector {
    pub(crate) transport: Arc<RecordingTransport>,
    urls: Mutex<Vec<String>>,
    events: Mutex<Option<TransportEvents>>,
}

impl MockConnector {
    pub(crate) fn connect_count(&self) -> usize {
        lock(&self.urls).len()
    }

    pub(crate) fn urls(&self) -> Vec<String> {
        lock(&self.urls).clone()
    }

    pub(crate) fn events(&self) -> TransportEvents {
        let Some(events) = lock(&self.events).clone() else {
            panic!("connector was never asked to connect");
        };
        events
    }
}

impl Connector for MockConnector {
    fn connect(
        &self,
        url: &str,
        events: TransportEvents,
    ) -> Result<Arc<dyn Transport>, TransportError> {
        lock(&self.urls).push(url.to_string());
        *lock(&self.events) = Some(events);
        Ok(Arc::clone(&self.transport) as Arc<dyn Transport>)
    }
}

/// Manager wired to a mock connector and a manual clock.
#[derive(Debug)]
pub(crate) struct Harness {
    pub(crate) manager: Arc<ConnectionManager>,
    pub(crate) connector: Arc<MockConnector>,
    pub(crate) clock: Arc<ManualClock>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let connector = Arc::new(MockConnector::default());
        let clock = Arc::new(ManualClock::at(1_700_000_000_000));
        let manager = ConnectionManager::with_clock(
            Arc::clone(&connector) as Arc<dyn Connector>,
            Arc::clone(&clock) as Arc<dyn crate::domain::Clock>,
        );
        Self {
            manager,
            connector,
            clock,
        }
    }

    /// Creates the transport without opening it.
    pub(crate) fn connect(&self) {
        if let Err(err) = self.manager.ensure_connected(&endpoint()) {
            panic!("ensure_connected failed: {err}");
        }
    }

    /// Creates the transport and opens it.
    pub(crate) fn open(&self) {
        self.connect();
        self.manager.on_transport_open();
    }

    pub(crate) fn transport(&self) -> &RecordingTransport {
        &self.connector.transport
    }
}

pub(crate) fn endpoint() -> Endpoint {
    Endpoint::new("ws://localhost:8000", "double_auction", "3", "n282bsh4")
}
