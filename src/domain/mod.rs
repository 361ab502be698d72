//! Domain layer: wire envelope, identifiers, routing identity, and clock.
//!
//! These are plain value types shared by the connection core and the
//! transport. None of them hold connection state.

pub mod clock;
pub mod endpoint;
pub mod envelope;
pub mod subscriber_id;

pub use clock::{Clock, SystemClock};
pub use endpoint::Endpoint;
pub use envelope::{ChannelName, Envelope, PING_CHANNEL, parse_frame};
pub use subscriber_id::SubscriberId;
