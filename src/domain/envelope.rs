//! Wire envelope exchanged over the shared connection.
//!
//! Every frame on the socket is the JSON encoding of an [`Envelope`] (or,
//! inbound only, a JSON array of envelopes). The payload is opaque: it is
//! forwarded to listeners untouched.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Reserved channel carrying latency probes. Never delivered to bindings.
pub const PING_CHANNEL: &str = "ping";

/// Name of a logical message stream. Guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChannelName(String);

impl ChannelName {
    /// Creates a channel name.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::InvalidChannel`] if `name` is empty.
    pub fn new(name: impl Into<String>) -> Result<Self, ChannelError> {
        let name = name.into();
        if name.is_empty() {
            return Err(ChannelError::InvalidChannel(name));
        }
        Ok(Self(name))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the reserved [`PING_CHANNEL`].
    #[must_use]
    pub fn is_ping(&self) -> bool {
        self.0 == PING_CHANNEL
    }
}

impl TryFrom<String> for ChannelName {
    type Error = ChannelError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for ChannelName {
    type Error = ChannelError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ChannelName> for String {
    fn from(name: ChannelName) -> Self {
        name.0
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for ChannelName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// The unit exchanged over the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Logical stream this envelope belongs to.
    pub channel: ChannelName,
    /// Channel-defined value, forwarded without interpretation.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Milliseconds since the Unix epoch, set by the sender.
    pub timestamp: i64,
}

impl Envelope {
    /// Creates an envelope.
    #[must_use]
    pub const fn new(channel: ChannelName, payload: serde_json::Value, timestamp: i64) -> Self {
        Self {
            channel,
            payload,
            timestamp,
        }
    }

    /// Builds a latency probe stamped with `now`, carrying the current
    /// average round-trip time (or `null` while unknown).
    #[must_use]
    pub fn ping(now: i64, average_rtt: Option<f64>) -> Self {
        Self {
            channel: ChannelName(PING_CHANNEL.to_string()),
            payload: serde_json::json!({ "avgping_time": average_rtt }),
            timestamp: now,
        }
    }

    /// Returns `true` if this envelope travels on the reserved ping channel.
    #[must_use]
    pub fn is_ping(&self) -> bool {
        self.channel.is_ping()
    }

    /// Encodes the envelope as a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Encode`] if serialization fails.
    pub fn to_frame(&self) -> Result<String, ChannelError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// One inbound text frame: a single envelope or a batch (history replay).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InboundFrame {
    Single(Envelope),
    Batch(Vec<Envelope>),
}

/// Parses an inbound text frame into the envelopes it carries, in order.
///
/// # Errors
///
/// Returns the JSON error if the frame is not an envelope or an array of
/// envelopes. A batch with any invalid element is rejected whole.
pub fn parse_frame(raw: &str) -> Result<Vec<Envelope>, serde_json::Error> {
    match serde_json::from_str::<InboundFrame>(raw)? {
        InboundFrame::Single(envelope) => Ok(vec![envelope]),
        InboundFrame::Batch(envelopes) => Ok(envelopes),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn channel(name: &str) -> ChannelName {
        let Ok(name) = ChannelName::new(name) else {
            panic!("valid channel name");
        };
        name
    }

    #[test]
    fn empty_channel_rejected() {
        assert!(ChannelName::new("").is_err());
        assert!(ChannelName::new("orders").is_ok());
    }

    #[test]
    fn frame_has_exactly_three_fields() {
        let env = Envelope::new(channel("orders"), serde_json::json!({"x": 1}), 42);
        let Ok(frame) = env.to_frame() else {
            panic!("encode failed");
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(&frame) else {
            panic!("frame is not json");
        };
        let Some(obj) = value.as_object() else {
            panic!("frame is not an object");
        };
        assert_eq!(obj.len(), 3);
        assert_eq!(obj.get("channel"), Some(&serde_json::json!("orders")));
        assert_eq!(obj.get("timestamp"), Some(&serde_json::json!(42)));
        assert_eq!(obj.get("payload"), Some(&serde_json::json!({"x": 1})));
    }

    #[test]
    fn parses_single_envelope() {
        let Ok(envs) =
            parse_frame(r#"{"channel":"state","payload":"period_end","timestamp":7}"#)
        else {
            panic!("parse failed");
        };
        assert_eq!(
            envs,
            vec![Envelope::new(channel("state"), serde_json::json!("period_end"), 7)]
        );
    }

    #[test]
    fn parses_history_batch_in_order() {
        let raw = r#"[
            {"channel":"decisions","payload":1,"timestamp":1},
            {"channel":"decisions","payload":2,"timestamp":2}
        ]"#;
        let Ok(envs) = parse_frame(raw) else {
            panic!("parse failed");
        };
        let payloads: Vec<_> = envs.iter().map(|e| e.payload.clone()).collect();
        assert_eq!(payloads, vec![serde_json::json!(1), serde_json::json!(2)]);
    }

    #[test]
    fn missing_payload_defaults_to_null() {
        let Ok(envs) = parse_frame(r#"{"channel":"ping","timestamp":100,"avgping_time":null}"#)
        else {
            panic!("parse failed");
        };
        let Some(env) = envs.first() else {
            panic!("no envelope");
        };
        assert!(env.is_ping());
        assert!(env.payload.is_null());
    }

    #[test]
    fn malformed_frames_rejected() {
        assert!(parse_frame("not json").is_err());
        assert!(parse_frame(r#"{"payload":1,"timestamp":1}"#).is_err());
        assert!(parse_frame(r#"{"channel":"","payload":1,"timestamp":1}"#).is_err());
        assert!(parse_frame(r#"{"channel":"a","payload":1}"#).is_err());
        assert!(
            parse_frame(r#"[{"channel":"a","timestamp":1},{"channel":"","timestamp":2}]"#)
                .is_err()
        );
    }

    #[test]
    fn ping_carries_average() {
        let ping = Envelope::ping(1_000, Some(12.5));
        assert!(ping.is_ping());
        assert_eq!(ping.timestamp, 1_000);
        assert_eq!(ping.payload, serde_json::json!({"avgping_time": 12.5}));

        let unknown = Envelope::ping(1_000, None);
        assert_eq!(unknown.payload, serde_json::json!({"avgping_time": null}));
    }
}
