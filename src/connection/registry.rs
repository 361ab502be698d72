//! Subscriber registry with per-subscriber outbound queues.
//!
//! Tracks every live binding by [`SubscriberId`], the channel it is bound
//! to, a weak handle used for delivery, and the envelopes it sent while
//! the connection was not open.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};

use crate::domain::{ChannelName, Envelope, SubscriberId};

/// Anything that can receive envelopes fanned out by the manager.
pub trait Deliver: Send + Sync {
    /// Delivers one inbound envelope. Must not panic across this boundary.
    fn deliver(&self, envelope: &Envelope);
}

impl fmt::Debug for dyn Deliver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{Deliver}}")
    }
}

/// One registered subscriber.
#[derive(Debug)]
pub(crate) struct SubscriberEntry {
    pub(crate) channel: ChannelName,
    pub(crate) pending: VecDeque<Envelope>,
    sink: Weak<dyn Deliver>,
}

/// Registry of live subscribers, keyed by id.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    entries: HashMap<SubscriberId, SubscriberEntry>,
}

impl SubscriberRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber and returns its fresh id.
    pub fn insert(&mut self, channel: ChannelName, sink: Weak<dyn Deliver>) -> SubscriberId {
        let id = SubscriberId::new();
        self.entries.insert(
            id,
            SubscriberEntry {
                channel,
                pending: VecDeque::new(),
                sink,
            },
        );
        id
    }

    /// Removes a subscriber, returning how many queued envelopes were
    /// discarded with it, or `None` if it was not registered.
    pub fn remove(&mut self, id: SubscriberId) -> Option<usize> {
        self.entries.remove(&id).map(|entry| entry.pending.len())
    }

    pub(crate) fn get_mut(&mut self, id: SubscriberId) -> Option<&mut SubscriberEntry> {
        self.entries.get_mut(&id)
    }

    pub(crate) fn entries_mut(&mut self) -> impl Iterator<Item = &mut SubscriberEntry> {
        self.entries.values_mut()
    }

    /// Returns the live sinks bound to `channel`, each exactly once.
    #[must_use]
    pub fn matching(&self, channel: &ChannelName) -> Vec<Arc<dyn Deliver>> {
        self.entries
            .values()
            .filter(|entry| entry.channel == *channel)
            .filter_map(|entry| entry.sink.upgrade())
            .collect()
    }

    /// Number of envelopes queued for `id` (0 if unknown).
    #[must_use]
    pub fn pending_len(&self, id: SubscriberId) -> usize {
        self.entries.get(&id).map_or(0, |entry| entry.pending.len())
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no subscriber is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    struct Counter(Mutex<usize>);

    impl Deliver for Counter {
        fn deliver(&self, _envelope: &Envelope) {
            if let Ok(mut n) = self.0.lock() {
                *n += 1;
            }
        }
    }

    fn channel(name: &str) -> ChannelName {
        let Ok(name) = ChannelName::new(name) else {
            panic!("valid channel");
        };
        name
    }

    fn sink(counter: &Arc<Counter>) -> Weak<dyn Deliver> {
        let weak: Weak<Counter> = Arc::downgrade(counter);
        weak
    }

    #[test]
    fn empty_matches_nothing() {
        let registry = SubscriberRegistry::new();
        assert!(registry.matching(&channel("orders")).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn matching_filters_by_channel() {
        let mut registry = SubscriberRegistry::new();
        let a = Arc::new(Counter::default());
        let b = Arc::new(Counter::default());
        let c = Arc::new(Counter::default());
        registry.insert(channel("orders"), sink(&a));
        registry.insert(channel("orders"), sink(&b));
        registry.insert(channel("state"), sink(&c));

        assert_eq!(registry.matching(&channel("orders")).len(), 2);
        assert_eq!(registry.matching(&channel("state")).len(), 1);
        assert!(registry.matching(&channel("decisions")).is_empty());
    }

    #[test]
    fn dropped_sinks_are_skipped() {
        let mut registry = SubscriberRegistry::new();
        let a = Arc::new(Counter::default());
        registry.insert(channel("orders"), sink(&a));
        drop(a);
        assert!(registry.matching(&channel("orders")).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_reports_discarded_queue() {
        let mut registry = SubscriberRegistry::new();
        let a = Arc::new(Counter::default());
        let id = registry.insert(channel("orders"), sink(&a));
        let Some(entry) = registry.get_mut(id) else {
            panic!("entry exists");
        };
        entry
            .pending
            .push_back(Envelope::new(channel("orders"), serde_json::json!(1), 1));
        assert_eq!(registry.pending_len(id), 1);

        assert_eq!(registry.remove(id), Some(1));
        assert_eq!(registry.remove(id), None);
        assert!(registry.is_empty());
        assert_eq!(registry.pending_len(id), 0);
    }
}
