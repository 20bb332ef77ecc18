//! Bounded transaction-id dedup cache.
//!
//! Both feeds can observe the same underlying trade, and the poll feed
//! re-delivers recent pages every cycle, so every event passes through this
//! gate before it may touch the statistics windows. The cache is bounded:
//! once it exceeds `max_entries` keys it is trimmed to the most recently
//! inserted `trim_to`, after which long-evicted keys can reappear as "new".
//! An approximate filter over unbounded time, not an exact one.

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use whale_watch_core::DetectionConfig;

pub struct TradeDeduplicator {
    inner: Mutex<DedupState>,
    max_entries: usize,
    trim_to: usize,
}

struct DedupState {
    seen: HashSet<String>,
    /// Insertion order, oldest at the front.
    order: VecDeque<String>,
}

impl TradeDeduplicator {
    #[must_use]
    pub fn new(max_entries: usize, trim_to: usize) -> Self {
        debug_assert!(trim_to <= max_entries);
        Self {
            inner: Mutex::new(DedupState {
                seen: HashSet::with_capacity(max_entries + 1),
                order: VecDeque::with_capacity(max_entries + 1),
            }),
            max_entries,
            trim_to,
        }
    }

    #[must_use]
    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.dedup_max_entries, config.dedup_trim_to)
    }

    /// Tests and inserts atomically: returns `true` exactly once per key
    /// while the key remains cached. First caller wins under concurrency.
    pub fn is_new(&self, key: &str) -> bool {
        let mut state = self.inner.lock();

        if state.seen.contains(key) {
            return false;
        }

        state.seen.insert(key.to_string());
        state.order.push_back(key.to_string());

        if state.order.len() > self.max_entries {
            let trimmed = state.order.len() - self.trim_to;
            for _ in 0..trimmed {
                if let Some(old) = state.order.pop_front() {
                    state.seen.remove(&old);
                }
            }
            tracing::debug!(trimmed, retained = self.trim_to, "trimmed dedup cache");
        }

        true
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().order.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_seen_wins() {
        let dedup = TradeDeduplicator::new(100, 50);

        assert!(dedup.is_new("0xabc"));
        assert!(!dedup.is_new("0xabc"));
        assert!(!dedup.is_new("0xabc"));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_distinct_keys_all_accepted() {
        let dedup = TradeDeduplicator::new(100, 50);

        for i in 0..10 {
            assert!(dedup.is_new(&format!("tx-{i}")));
        }
        assert_eq!(dedup.len(), 10);
    }

    #[test]
    fn test_trim_keeps_most_recent() {
        let dedup = TradeDeduplicator::new(10, 5);

        for i in 0..=10 {
            assert!(dedup.is_new(&format!("tx-{i}")));
        }

        // 11th insert pushed the cache over the ceiling; only the most
        // recent 5 keys (tx-6..tx-10) survive.
        assert_eq!(dedup.len(), 5);
        assert!(dedup.is_new("tx-0"), "evicted key is new again");
        assert!(!dedup.is_new("tx-10"), "recent key is still cached");
    }

    #[test]
    fn test_default_limits_from_config() {
        let dedup = TradeDeduplicator::from_config(&DetectionConfig::default());

        for i in 0..10_001 {
            dedup.is_new(&format!("tx-{i}"));
        }
        assert_eq!(dedup.len(), 5_000);
        assert!(dedup.is_new("tx-0"));
    }

    #[test]
    fn test_concurrent_single_winner() {
        use std::sync::Arc;

        let dedup = Arc::new(TradeDeduplicator::new(1_000, 500));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let dedup = Arc::clone(&dedup);
            handles.push(std::thread::spawn(move || {
                (0..100).filter(|i| dedup.is_new(&format!("tx-{i}"))).count()
            }));
        }

        let accepted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(accepted, 100, "each key accepted exactly once across threads");
    }
}
