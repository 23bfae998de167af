//! Per-connection subscription bookkeeping used by the subscription
//! manager (C8) to decide when a pooled connection is saturated.

use std::collections::HashSet;

/// Tracks how many (channel, instId) pairs live on one connection, so the
/// pool can cap each connection at `M` subscriptions (default 50, spec
/// §4.7) before opening a new one.
#[derive(Debug, Default)]
pub struct ConnectionSlots {
    subscribed: HashSet<(String, String)>,
    capacity: usize,
}

impl ConnectionSlots {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribed: HashSet::new(),
            capacity,
        }
    }

    pub fn is_saturated(&self) -> bool {
        self.subscribed.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.subscribed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribed.is_empty()
    }

    /// Records a subscription, returning `false` if the connection was
    /// already saturated (caller should open a new connection instead).
    pub fn try_add(&mut self, channel: &str, inst_id: &str) -> bool {
        if self.subscribed.contains(&(channel.to_string(), inst_id.to_string())) {
            return true;
        }
        if self.is_saturated() {
            return false;
        }
        self.subscribed.insert((channel.to_string(), inst_id.to_string()));
        true
    }

    pub fn remove(&mut self, channel: &str, inst_id: &str) {
        self.subscribed.remove(&(channel.to_string(), inst_id.to_string()));
    }

    pub fn contains(&self, channel: &str, inst_id: &str) -> bool {
        self.subscribed.contains(&(channel.to_string(), inst_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_once_saturated() {
        let mut slots = ConnectionSlots::new(2);
        assert!(slots.try_add("tickers", "BTC-USDT"));
        assert!(slots.try_add("tickers", "ETH-USDT"));
        assert!(!slots.try_add("tickers", "SOL-USDT"));
    }

    #[test]
    fn re_adding_the_same_pair_is_a_no_op() {
        let mut slots = ConnectionSlots::new(1);
        assert!(slots.try_add("tickers", "BTC-USDT"));
        assert!(slots.try_add("tickers", "BTC-USDT"));
        assert_eq!(slots.len(), 1);
    }
}
