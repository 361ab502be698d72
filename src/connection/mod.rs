//! Connection core: one shared transport, many channel bindings.
//!
//! [`ConnectionManager`] owns the transport and the subscriber registry,
//! buffers outbound envelopes per subscriber while offline, and fans inbound
//! envelopes out by channel. [`ChannelBinding`] is the per-channel handle
//! application code uses. [`LatencyProbe`] samples round-trip time.
//!
//! All shared state sits behind one coarse lock per owner. Fan-out collects
//! the matching subscribers under the lock and delivers after releasing it,
//! so listeners may send or dispose without deadlocking.

pub mod binding;
pub mod latency;
pub mod manager;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

use std::sync::{Mutex, MutexGuard, PoisonError};

pub use binding::ChannelBinding;
pub use latency::{DEFAULT_PING_INTERVAL, LatencyProbe, RTT_WINDOW_CAPACITY, RttWindow};
pub use manager::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use registry::{Deliver, SubscriberRegistry};

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
