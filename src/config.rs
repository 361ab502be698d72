//! Client configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). Identity fields are optional here;
//! whoever drives the client decides whether they are required.

use std::time::Duration;

use crate::domain::Endpoint;
use crate::error::ChannelError;
use crate::ws::ReconnectPolicy;

/// Top-level client configuration.
///
/// Loaded once at startup via [`ClientConfig::from_env`].
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Scheme and host of the server (e.g. `wss://lab.example.org`).
    pub base_url: String,

    /// Application name used in the socket address.
    pub app_name: Option<String>,

    /// Group identifier used in the socket address.
    pub group_id: Option<String>,

    /// Participant code used in the socket address.
    pub participant_code: Option<String>,

    /// Milliseconds a connect attempt may take before it is abandoned.
    pub connect_timeout_ms: u64,

    /// Milliseconds before the first reconnect attempt.
    pub reconnect_interval_ms: u64,

    /// Upper bound on the reconnect delay, in milliseconds.
    pub max_reconnect_interval_ms: u64,

    /// Backoff growth factor per failed attempt.
    pub reconnect_decay: f64,

    /// Whether latency probing starts with the client.
    pub ping_enabled: bool,

    /// Milliseconds between pings.
    pub ping_interval_ms: u64,

    /// Channels to bind (used by the `redwood-tail` binary).
    pub channels: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "ws://127.0.0.1:8000".to_string(),
            app_name: None,
            group_id: None,
            participant_code: None,
            connect_timeout_ms: 10_000,
            reconnect_interval_ms: 1_000,
            max_reconnect_interval_ms: 30_000,
            reconnect_decay: 1.5,
            ping_enabled: false,
            ping_interval_ms: 1_000,
            channels: Vec::new(),
        }
    }
}

impl ClientConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Config`] if `REDWOOD_BASE_URL` is not a
    /// `ws://` or `wss://` URL, or `REDWOOD_RECONNECT_DECAY` is below 1.
    pub fn from_env() -> Result<Self, ChannelError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ClientConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ChannelError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = lookup("REDWOOD_BASE_URL").unwrap_or(defaults.base_url);
        if !(base_url.starts_with("ws://") || base_url.starts_with("wss://")) {
            return Err(ChannelError::Config(format!(
                "REDWOOD_BASE_URL must start with ws:// or wss://, got {base_url:?}"
            )));
        }

        let reconnect_decay = parse_var(&lookup, "REDWOOD_RECONNECT_DECAY", defaults.reconnect_decay);
        if !reconnect_decay.is_finite() || reconnect_decay < 1.0 {
            return Err(ChannelError::Config(format!(
                "REDWOOD_RECONNECT_DECAY must be a finite number >= 1, got {reconnect_decay}"
            )));
        }

        let channels = lookup("REDWOOD_CHANNELS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            base_url,
            app_name: non_empty(lookup("REDWOOD_APP_NAME")),
            group_id: non_empty(lookup("REDWOOD_GROUP_ID")),
            participant_code: non_empty(lookup("REDWOOD_PARTICIPANT_CODE")),
            connect_timeout_ms: parse_var(
                &lookup,
                "REDWOOD_CONNECT_TIMEOUT_MS",
                defaults.connect_timeout_ms,
            ),
            reconnect_interval_ms: parse_var(
                &lookup,
                "REDWOOD_RECONNECT_INTERVAL_MS",
                defaults.reconnect_interval_ms,
            ),
            max_reconnect_interval_ms: parse_var(
                &lookup,
                "REDWOOD_MAX_RECONNECT_INTERVAL_MS",
                defaults.max_reconnect_interval_ms,
            ),
            reconnect_decay,
            ping_enabled: parse_bool(&lookup, "REDWOOD_PING_ENABLED", defaults.ping_enabled),
            ping_interval_ms: parse_var(&lookup, "REDWOOD_PING_INTERVAL_MS", defaults.ping_interval_ms),
            channels,
        })
    }

    /// Builds the participant's endpoint, if all identity fields are set.
    #[must_use]
    pub fn endpoint(&self) -> Option<Endpoint> {
        Some(Endpoint::new(
            self.base_url.clone(),
            self.app_name.clone()?,
            self.group_id.clone()?,
            self.participant_code.clone()?,
        ))
    }

    /// Reconnect policy for the WebSocket transport.
    #[must_use]
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            reconnect_interval: Duration::from_millis(self.reconnect_interval_ms),
            max_reconnect_interval: Duration::from_millis(self.max_reconnect_interval_ms),
            reconnect_decay: self.reconnect_decay,
        }
    }

    /// Delay between latency probes.
    #[must_use]
    pub const fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses a variable as a boolean. Accepts `"true"`, `"1"`, `"false"`,
/// `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ClientConfig, ChannelError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ClientConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let Ok(config) = load(&[]) else {
            panic!("defaults must load");
        };
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.endpoint(), None);
        assert_eq!(config.reconnect_policy(), ReconnectPolicy::default());
    }

    #[test]
    fn identity_builds_endpoint() {
        let Ok(config) = load(&[
            ("REDWOOD_BASE_URL", "wss://lab.example.org"),
            ("REDWOOD_APP_NAME", "double_auction"),
            ("REDWOOD_GROUP_ID", "4"),
            ("REDWOOD_PARTICIPANT_CODE", "s7zznoq4"),
        ]) else {
            panic!("config must load");
        };
        let Some(endpoint) = config.endpoint() else {
            panic!("endpoint expected");
        };
        assert_eq!(
            endpoint.url(),
            "wss://lab.example.org/redwood/app-name/double_auction/group/4/participant/s7zznoq4/"
        );
    }

    #[test]
    fn numeric_and_bool_overrides() {
        let Ok(config) = load(&[
            ("REDWOOD_CONNECT_TIMEOUT_MS", "2500"),
            ("REDWOOD_RECONNECT_DECAY", "2"),
            ("REDWOOD_PING_ENABLED", "TRUE"),
            ("REDWOOD_PING_INTERVAL_MS", "250"),
            ("REDWOOD_RECONNECT_INTERVAL_MS", "not a number"),
        ]) else {
            panic!("config must load");
        };
        assert_eq!(config.connect_timeout_ms, 2_500);
        assert!((config.reconnect_decay - 2.0).abs() < f64::EPSILON);
        assert!(config.ping_enabled);
        assert_eq!(config.ping_interval(), Duration::from_millis(250));
        assert_eq!(config.reconnect_interval_ms, 1_000);
    }

    #[test]
    fn channels_are_split_and_trimmed() {
        let Ok(config) = load(&[("REDWOOD_CHANNELS", " state, group_decisions ,,orders")]) else {
            panic!("config must load");
        };
        assert_eq!(config.channels, vec!["state", "group_decisions", "orders"]);
    }

    #[test]
    fn rejects_non_websocket_url() {
        let result = load(&[("REDWOOD_BASE_URL", "http://localhost:8000")]);
        assert!(matches!(result, Err(ChannelError::Config(_))));
    }

    #[test]
    fn rejects_shrinking_backoff() {
        let result = load(&[("REDWOOD_RECONNECT_DECAY", "0.5")]);
        assert!(matches!(result, Err(ChannelError::Config(_))));
    }
}
