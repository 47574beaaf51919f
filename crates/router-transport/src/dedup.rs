//! Chat-bot deduplication state (§4.8, §5): `processed` (TTL) + `inflight`
//! sets guarded by a single mutex each, matching the spec's description of
//! process-local, mutex-guarded dedup state with opportunistic pruning.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, PartialEq, Eq)]
pub enum Reservation {
    Accepted,
    Duplicate,
}

pub struct DedupStore {
    ttl: Duration,
    processed: Mutex<HashMap<String, Instant>>,
    inflight: Mutex<HashSet<String>>,
}

impl DedupStore {
    pub fn new(ttl_seconds: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_seconds),
            processed: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashSet::new()),
        }
    }

    /// Reserves `key` for processing. Prunes expired `processed` entries
    /// first, then checks both sets (§4.8: "if the key is present ... reject
    /// as duplicate").
    pub fn reserve(&self, key: &str) -> Reservation {
        self.prune_expired();

        {
            let processed = self.processed.lock().unwrap_or_else(|e| e.into_inner());
            if processed.contains_key(key) {
                return Reservation::Duplicate;
            }
        }

        let mut inflight = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if !inflight.insert(key.to_string()) {
            return Reservation::Duplicate;
        }
        Reservation::Accepted
    }

    /// Moves `key` from `inflight` to `processed` with the current timestamp
    /// (background processing succeeded).
    pub fn mark_processed(&self, key: &str) {
        self.inflight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
        self.processed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), Instant::now());
    }

    /// Drops `key` from `inflight` only, so the platform may retry
    /// (background processing failed).
    pub fn release_inflight(&self, key: &str) {
        self.inflight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(key);
    }

    fn prune_expired(&self) {
        let ttl = self.ttl;
        let mut processed = self.processed.lock().unwrap_or_else(|e| e.into_inner());
        processed.retain(|_, at| at.elapsed() < ttl);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_reservation_is_accepted() {
        let store = DedupStore::new(3600);
        assert_eq!(store.reserve("k1"), Reservation::Accepted);
    }

    #[test]
    fn second_reservation_while_inflight_is_duplicate() {
        let store = DedupStore::new(3600);
        assert_eq!(store.reserve("k1"), Reservation::Accepted);
        assert_eq!(store.reserve("k1"), Reservation::Duplicate);
    }

    #[test]
    fn reservation_after_processed_within_ttl_is_duplicate() {
        let store = DedupStore::new(3600);
        store.reserve("k1");
        store.mark_processed("k1");
        assert_eq!(store.reserve("k1"), Reservation::Duplicate);
    }

    #[test]
    fn reservation_after_release_is_accepted_again() {
        let store = DedupStore::new(3600);
        store.reserve("k1");
        store.release_inflight("k1");
        assert_eq!(store.reserve("k1"), Reservation::Accepted);
    }

    #[test]
    fn expired_processed_entries_are_pruned() {
        let store = DedupStore::new(0);
        store.reserve("k1");
        store.mark_processed("k1");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.reserve("k1"), Reservation::Accepted);
    }
}
