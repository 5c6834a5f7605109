//! # Striped Map
//!
//! Shard keys across independent hash maps, each guarded by its own
//! mutex, so concurrent clients rarely contend on the same lock.
//!
//! ## Design Principles
//!
//! 1. **Striped Locks**: One mutex per stripe keeps critical sections
//!    short and contention local to a key's stripe.
//! 2. **Shared Hash State**: The same `ahash` seed picks stripes and
//!    hashes map entries; the mapping is deterministic per process run.
//! 3. **Arc-backed Values**: Reads clone an `Arc` under the lock, never
//!    the value buffer itself.
//! 4. **TTL on Access**: A read that observes an elapsed deadline removes
//!    the entry in place, complementing the background scheduler.

use std::hash::{BuildHasher, Hasher};
use std::sync::Arc;
use std::time::Instant;

use ahash::RandomState;
use hashbrown::HashMap;
use parking_lot::Mutex;

/// A single cache entry: shared value buffer plus optional deadline.
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) value: Arc<[u8]>,
    /// `None` means the entry never expires.
    pub(crate) expires_at: Option<Instant>,
}

impl Entry {
    /// Returns true once the recorded deadline has elapsed at `now`.
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

/// One stripe: a hash map under its own mutex.
#[derive(Debug)]
struct Stripe {
    map: Mutex<HashMap<Vec<u8>, Entry, RandomState>>,
}

/// Fixed set of stripes with mask-based selection.
///
/// The stripe count is normalized to a power of two at construction so
/// `hash & mask` is exactly `hash mod N`.
#[derive(Debug)]
pub(crate) struct StripedMap {
    stripes: Vec<Stripe>,
    mask: usize,
    hash_state: RandomState,
}

impl StripedMap {
    pub(crate) fn new(stripes: usize) -> Self {
        let count = normalize_stripe_count(stripes);
        let hash_state = RandomState::new();
        let mut vec = Vec::with_capacity(count);
        for _ in 0..count {
            vec.push(Stripe {
                map: Mutex::new(HashMap::with_hasher(hash_state.clone())),
            });
        }

        StripedMap {
            stripes: vec,
            mask: count - 1,
            hash_state,
        }
    }

    pub(crate) fn stripe_count(&self) -> usize {
        self.stripes.len()
    }

    fn stripe_for(&self, key: &[u8]) -> &Stripe {
        let mut hasher = self.hash_state.build_hasher();
        hasher.write(key);
        &self.stripes[(hasher.finish() as usize) & self.mask]
    }

    /// Inserts or replaces the entry for `key` under its stripe lock.
    pub(crate) fn insert(&self, key: Vec<u8>, entry: Entry) {
        let mut map = self.stripe_for(&key).map.lock();
        map.insert(key, entry);
    }

    /// Looks up a live value.
    ///
    /// An entry whose deadline has elapsed is removed in place and
    /// reported as absent; by the time this returns `None` for an expired
    /// key, no other reader can still observe the stale value.
    pub(crate) fn get_live(&self, key: &[u8], now: Instant) -> Option<Arc<[u8]>> {
        let mut map = self.stripe_for(key).map.lock();
        let expired = match map.get(key) {
            Some(entry) => entry.is_expired(now),
            None => return None,
        };
        if expired {
            map.remove(key);
            return None;
        }
        map.get(key).map(|entry| Arc::clone(&entry.value))
    }

    /// Removes `key` unconditionally. Returns whether it was present.
    pub(crate) fn remove(&self, key: &[u8]) -> bool {
        let mut map = self.stripe_for(key).map.lock();
        map.remove(key).is_some()
    }

    /// Removes `key` only when the entry still carries an elapsed deadline.
    ///
    /// Called by the expiry worker after popping a heap entry. An entry
    /// that was overwritten, deleted, or re-set with a later deadline in
    /// the meantime stays put; the stale pop is a no-op.
    pub(crate) fn remove_expired(&self, key: &[u8], now: Instant) -> bool {
        let mut map = self.stripe_for(key).map.lock();
        let due = match map.get(key) {
            Some(entry) => matches!(entry.expires_at, Some(deadline) if deadline <= now),
            None => false,
        };
        if due {
            map.remove(key);
        }
        due
    }

    /// Sum of per-stripe sizes, taking each lock in turn.
    ///
    /// Stripes already counted can change while later stripes are being
    /// read, so the result is approximate under concurrent mutation.
    pub(crate) fn len(&self) -> usize {
        self.stripes.iter().map(|stripe| stripe.map.lock().len()).sum()
    }
}

/// Normalizes stripe counts to a power of two for mask-based selection.
fn normalize_stripe_count(count: usize) -> usize {
    count.max(1).next_power_of_two()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn entry(value: &[u8], expires_at: Option<Instant>) -> Entry {
        Entry {
            value: Arc::from(value),
            expires_at,
        }
    }

    #[test]
    fn insert_get_roundtrip() {
        let map = StripedMap::new(4);
        map.insert(b"alpha".to_vec(), entry(b"one", None));
        let value = map.get_live(b"alpha", Instant::now()).unwrap();
        assert_eq!(&*value, b"one");
    }

    #[test]
    fn insert_replaces_existing_entry() {
        let map = StripedMap::new(4);
        map.insert(b"alpha".to_vec(), entry(b"one", None));
        map.insert(b"alpha".to_vec(), entry(b"two", None));
        let value = map.get_live(b"alpha", Instant::now()).unwrap();
        assert_eq!(&*value, b"two");
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn get_live_removes_elapsed_entry() {
        let map = StripedMap::new(4);
        let now = Instant::now();
        map.insert(b"alpha".to_vec(), entry(b"one", Some(now)));
        assert!(map.get_live(b"alpha", now + Duration::from_millis(1)).is_none());
        // Physically gone, not just hidden.
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn get_live_keeps_future_deadline() {
        let map = StripedMap::new(4);
        let now = Instant::now();
        map.insert(b"alpha".to_vec(), entry(b"one", Some(now + Duration::from_secs(60))));
        assert!(map.get_live(b"alpha", now).is_some());
    }

    #[test]
    fn remove_reports_presence() {
        let map = StripedMap::new(4);
        map.insert(b"alpha".to_vec(), entry(b"one", None));
        assert!(map.remove(b"alpha"));
        assert!(!map.remove(b"alpha"));
    }

    #[test]
    fn remove_expired_skips_no_expiry_entries() {
        let map = StripedMap::new(4);
        map.insert(b"alpha".to_vec(), entry(b"one", None));
        assert!(!map.remove_expired(b"alpha", Instant::now()));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn remove_expired_skips_later_deadlines() {
        let map = StripedMap::new(4);
        let now = Instant::now();
        map.insert(b"alpha".to_vec(), entry(b"one", Some(now + Duration::from_secs(60))));
        assert!(!map.remove_expired(b"alpha", now));
        assert!(map.get_live(b"alpha", now).is_some());
    }

    #[test]
    fn remove_expired_collects_elapsed_deadlines() {
        let map = StripedMap::new(4);
        let now = Instant::now();
        map.insert(b"alpha".to_vec(), entry(b"one", Some(now)));
        assert!(map.remove_expired(b"alpha", now + Duration::from_millis(1)));
        assert_eq!(map.len(), 0);
    }

    #[test]
    fn remove_expired_misses_are_false() {
        let map = StripedMap::new(4);
        assert!(!map.remove_expired(b"missing", Instant::now()));
    }

    #[test]
    fn len_sums_across_stripes() {
        let map = StripedMap::new(8);
        for i in 0..32 {
            map.insert(format!("key-{i}").into_bytes(), entry(b"v", None));
        }
        assert_eq!(map.len(), 32);
    }

    #[test]
    fn stripe_count_is_normalized() {
        assert_eq!(StripedMap::new(0).stripe_count(), 1);
        assert_eq!(StripedMap::new(1).stripe_count(), 1);
        assert_eq!(StripedMap::new(100).stripe_count(), 128);
        assert_eq!(StripedMap::new(128).stripe_count(), 128);
    }
}
