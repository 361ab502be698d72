//! Round-trip latency sampling over the shared connection.
//!
//! While active, the probe sends a `ping` envelope stamped with the current
//! time, then waits for the configured interval, and repeats. The server
//! echoes pings back; each echo yields one RTT sample. Samples are advisory
//! and never affect delivery.

use std::collections::VecDeque;
use std::sync::{Mutex, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::lock;
use super::manager::ConnectionManager;
use crate::domain::Envelope;
use crate::error::TransportError;

/// Number of most recent samples kept.
pub const RTT_WINDOW_CAPACITY: usize = 10;

/// Default delay between pings.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_millis(1_000);

/// Bounded FIFO of round-trip samples in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RttWindow {
    samples: VecDeque<u64>,
}

impl RttWindow {
    /// Creates an empty window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a sample, evicting the oldest beyond capacity.
    pub fn push(&mut self, rtt_ms: u64) {
        self.samples.push_back(rtt_ms);
        while self.samples.len() > RTT_WINDOW_CAPACITY {
            self.samples.pop_front();
        }
    }

    /// Arithmetic mean of the current samples, `None` while empty.
    #[must_use]
    pub fn average(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: u128 = self.samples.iter().map(|&s| u128::from(s)).sum();
        let mean = sum as f64 / self.samples.len() as f64;
        Some(mean)
    }

    /// Samples, oldest first.
    #[must_use]
    pub fn samples(&self) -> Vec<u64> {
        self.samples.iter().copied().collect()
    }

    /// Number of samples held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns `true` if no sample has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Ping timer and RTT window owned by a
/// [`ConnectionManager`](super::ConnectionManager).
#[derive(Debug, Default)]
pub struct LatencyProbe {
    window: Mutex<RttWindow>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl LatencyProbe {
    /// Creates an idle probe with no samples.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the echo of a ping received at `now`, returning the sample.
    ///
    /// A timestamp in the future counts as zero.
    pub fn record_pong(&self, envelope: &Envelope, now: i64) -> u64 {
        let rtt = u64::try_from(now.saturating_sub(envelope.timestamp)).unwrap_or(0);
        lock(&self.window).push(rtt);
        rtt
    }

    /// Mean of the retained samples; `None` means unknown, not zero.
    #[must_use]
    pub fn average_rtt(&self) -> Option<f64> {
        lock(&self.window).average()
    }

    /// Retained samples, oldest first.
    #[must_use]
    pub fn samples(&self) -> Vec<u64> {
        lock(&self.window).samples()
    }

    /// Returns `true` while the ping timer is running.
    #[must_use]
    pub fn is_active(&self) -> bool {
        lock(&self.ticker)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Starts (or restarts with a new interval) the ping timer.
    pub(crate) fn start(
        &self,
        manager: Weak<ConnectionManager>,
        interval: Duration,
    ) -> Result<(), TransportError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| TransportError::NoRuntime)?;
        let handle = runtime.spawn(async move {
            loop {
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                manager.send_ping();
                drop(manager);
                tokio::time::sleep(interval).await;
            }
        });
        if let Some(previous) = lock(&self.ticker).replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Stops the ping timer. No further pings are sent until restarted.
    pub fn stop(&self) {
        if let Some(handle) = lock(&self.ticker).take() {
            handle.abort();
        }
    }
}

impl Drop for LatencyProbe {
    fn drop(&mut self) {
        self.stop();
    }
}
