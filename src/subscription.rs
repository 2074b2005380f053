//! Topic-prefix subscriptions for SUB sockets.
//!
//! Filtering is applied on the receiving side: a SUB socket's `recv` never
//! returns a message whose payload matches no current subscription.
//! The empty prefix subscribes to everything; an empty set delivers nothing.

use bytes::Bytes;

/// A single subscribed topic prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicPrefix {
    prefix: Bytes,
}

impl TopicPrefix {
    /// Create a prefix subscription. An empty prefix matches every message.
    #[must_use]
    pub const fn new(prefix: Bytes) -> Self {
        Self { prefix }
    }

    /// Check whether a message payload starts with this prefix.
    #[must_use]
    pub fn matches(&self, payload: &[u8]) -> bool {
        payload.starts_with(&self.prefix)
    }
}

/// The set of topic prefixes a SUB socket is subscribed to.
#[derive(Debug, Default)]
pub struct SubscriptionSet {
    prefixes: Vec<TopicPrefix>,
}

impl SubscriptionSet {
    /// Create an empty subscription set.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            prefixes: Vec::new(),
        }
    }

    /// Subscribe to a topic prefix. Duplicate prefixes are ignored.
    pub fn subscribe(&mut self, prefix: Bytes) {
        if !self.prefixes.iter().any(|p| p.prefix == prefix) {
            self.prefixes.push(TopicPrefix::new(prefix));
        }
    }

    /// Unsubscribe from exactly this prefix. Other prefixes keep matching.
    pub fn unsubscribe(&mut self, prefix: &[u8]) {
        self.prefixes.retain(|p| p.prefix != prefix);
    }

    /// Check whether a payload should be delivered.
    ///
    /// Returns false when the set is empty.
    #[must_use]
    pub fn matches(&self, payload: &[u8]) -> bool {
        self.prefixes.iter().any(|p| p.matches(payload))
    }

    /// True if no prefixes are subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }

    /// Number of subscribed prefixes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.prefixes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_match_is_byte_prefix() {
        let p = TopicPrefix::new(Bytes::from_static(b"weather."));
        assert!(p.matches(b"weather.eu"));
        assert!(!p.matches(b"sports.eu"));
        assert!(!p.matches(b"weather")); // shorter than the prefix
    }

    #[test]
    fn empty_prefix_matches_everything() {
        let mut set = SubscriptionSet::new();
        set.subscribe(Bytes::new());
        assert!(set.matches(b"anything"));
        assert!(set.matches(b""));
    }

    #[test]
    fn empty_set_delivers_nothing() {
        let set = SubscriptionSet::new();
        assert!(!set.matches(b"topic"));
        assert!(!set.matches(b""));
    }

    #[test]
    fn unsubscribe_removes_exactly_that_prefix() {
        let mut set = SubscriptionSet::new();
        set.subscribe(Bytes::from_static(b"topic."));
        set.subscribe(Bytes::from_static(b"events."));
        assert_eq!(set.len(), 2);

        set.unsubscribe(b"topic.");
        assert!(!set.matches(b"topic.foo"));
        assert!(set.matches(b"events.bar"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn duplicate_subscribe_is_ignored() {
        let mut set = SubscriptionSet::new();
        set.subscribe(Bytes::from_static(b"a"));
        set.subscribe(Bytes::from_static(b"a"));
        assert_eq!(set.len(), 1);

        // one unsubscribe clears the prefix entirely
        set.unsubscribe(b"a");
        assert!(!set.matches(b"abc"));
    }
}
