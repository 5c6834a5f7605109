//! # Engine Facade
//!
//! `KvEngine` wires the striped map to the expiry scheduler and owns the
//! lifetime of both: construction spawns the worker thread, drop stops
//! and joins it.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::expiry::{ExpiryQueue, run_expiry_worker};
use crate::store::{Entry, StripedMap};

/// Stripe count used by [`KvEngine::new`]. Server deployments that expect
/// hundreds of concurrent connections should pass a larger count to
/// [`KvEngine::with_stripes`].
pub const DEFAULT_STRIPES: usize = 64;

/// Thread-safe key-value cache with optional per-key TTL.
///
/// All operations take `&self` and may be called concurrently; share the
/// engine as `Arc<KvEngine>`. Values are returned as `Arc<[u8]>` clones
/// taken under the owning stripe's lock, so readers never observe a torn
/// value.
#[derive(Debug)]
pub struct KvEngine {
    map: Arc<StripedMap>,
    queue: Arc<ExpiryQueue>,
    worker: Option<JoinHandle<()>>,
}

impl KvEngine {
    /// Creates an engine with [`DEFAULT_STRIPES`] stripes.
    pub fn new() -> Self {
        Self::with_stripes(DEFAULT_STRIPES)
    }

    /// Creates an engine with a caller-provided stripe count.
    ///
    /// The count is clamped to at least one stripe and rounded up to the
    /// next power of two.
    pub fn with_stripes(stripes: usize) -> Self {
        let map = Arc::new(StripedMap::new(stripes));
        let queue = Arc::new(ExpiryQueue::new());

        let worker_queue = Arc::clone(&queue);
        let worker_map = Arc::clone(&map);
        let worker = std::thread::spawn(move || run_expiry_worker(worker_queue, worker_map));

        KvEngine {
            map,
            queue,
            worker: Some(worker),
        }
    }

    /// Inserts or replaces `key`. A `ttl_seconds` of zero means no expiry.
    ///
    /// A positive TTL also schedules the key with the expiry worker. A
    /// deadline too large to represent is treated as no expiry.
    pub fn set(&self, key: Vec<u8>, value: Vec<u8>, ttl_seconds: u64) {
        let expires_at = if ttl_seconds > 0 {
            Instant::now().checked_add(Duration::from_secs(ttl_seconds))
        } else {
            None
        };

        let scheduled = expires_at.map(|when| (key.clone(), when));
        self.map.insert(
            key,
            Entry {
                value: Arc::from(value),
                expires_at,
            },
        );
        if let Some((key, when)) = scheduled {
            self.queue.schedule(key, when);
        }
    }

    /// Returns the live value for `key`, or `None` when missing or expired.
    ///
    /// An entry whose deadline has elapsed is removed in place (lazy
    /// expiry, complementing the background worker).
    pub fn get(&self, key: &[u8]) -> Option<Arc<[u8]>> {
        self.map.get_live(key, Instant::now())
    }

    /// Removes `key`. Returns whether a removal occurred.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.map.remove(key)
    }

    /// Number of stored keys, summed stripe by stripe.
    ///
    /// Approximate while writers are active, and may briefly include
    /// entries whose deadline elapsed but which have not been collected
    /// yet.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stripe count after normalization.
    pub fn stripe_count(&self) -> usize {
        self.map.stripe_count()
    }
}

impl Default for KvEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for KvEngine {
    /// Stops the expiry worker and waits for it to exit. Bounded by the
    /// worker's one-second idle wait.
    fn drop(&mut self) {
        self.queue.request_stop();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}
