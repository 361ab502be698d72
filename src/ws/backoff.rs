//! Reconnect timing for the WebSocket transport.

use std::time::Duration;

/// Connect timeout and exponential reconnect backoff.
///
/// The delay before reconnect attempt `n` (zero-based, reset after every
/// successful handshake) is `reconnect_interval * reconnect_decay^n`,
/// capped at `max_reconnect_interval`.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    /// How long a single connect attempt may take before it is abandoned.
    pub connect_timeout: Duration,
    /// Delay before the first reconnect attempt.
    pub reconnect_interval: Duration,
    /// Upper bound on the reconnect delay.
    pub max_reconnect_interval: Duration,
    /// Growth factor applied per failed attempt. Values below 1 act as 1.
    pub reconnect_decay: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            reconnect_interval: Duration::from_secs(1),
            max_reconnect_interval: Duration::from_secs(30),
            reconnect_decay: 1.5,
        }
    }
}

impl ReconnectPolicy {
    /// Returns the delay to wait before reconnect attempt `attempt`.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let factor = self.reconnect_decay.max(1.0).powi(exponent);
        let cap = self.max_reconnect_interval.as_secs_f64();
        let secs = (self.reconnect_interval.as_secs_f64() * factor).min(cap);
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_reconnect_interval)
    }
}

/// Failed-attempt counter over a [`ReconnectPolicy`].
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: ReconnectPolicy,
    attempt: u32,
}

impl Backoff {
    /// Starts counting from the first attempt.
    #[must_use]
    pub const fn new(policy: ReconnectPolicy) -> Self {
        Self { policy, attempt: 0 }
    }

    /// Number of failed attempts since the last reset.
    #[must_use]
    pub const fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Returns the delay before the next attempt and counts it.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.policy.delay_for(self.attempt);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Back to the base interval, after a successful handshake.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}
