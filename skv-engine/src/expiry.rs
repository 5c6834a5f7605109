//! # Expiry Scheduler
//!
//! A single background worker draining a min-heap of `(deadline, key)`
//! pairs and removing entries whose TTL has elapsed.
//!
//! ## Design Principles
//!
//! 1. **One Heap, One Lock**: Deadlines live in a binary heap behind a
//!    dedicated mutex paired with a condvar; requests only push and
//!    notify.
//! 2. **Stale Tolerance**: Overwrites and deletes never search the heap.
//!    A popped entry re-reads the map and removes the key only if its
//!    recorded deadline still qualifies; stale pops are no-ops.
//! 3. **Lock Ordering**: The heap mutex is released before any stripe
//!    mutex is taken, so the worker cannot deadlock with requests.
//! 4. **Bounded Shutdown**: An idle worker wakes at least once per
//!    second, and the stop broadcast happens under the heap mutex so the
//!    wakeup cannot fall between the worker's flag check and its wait.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::store::StripedMap;

/// Upper bound on how long an idle worker sleeps before rechecking.
const IDLE_WAIT: Duration = Duration::from_secs(1);

/// A scheduled removal: the deadline and the key it belongs to.
///
/// Ordered by deadline so `Reverse<ExpireItem>` turns `BinaryHeap` into a
/// min-heap; keys break ties to keep the ordering total.
#[derive(Debug, PartialEq, Eq)]
struct ExpireItem {
    when: Instant,
    key: Vec<u8>,
}

impl Ord for ExpireItem {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.when.cmp(&other.when).then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for ExpireItem {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Heap, condvar, and stop flag shared between the engine and its worker.
#[derive(Debug)]
pub(crate) struct ExpiryQueue {
    heap: Mutex<BinaryHeap<Reverse<ExpireItem>>>,
    wakeup: Condvar,
    stop: AtomicBool,
}

impl ExpiryQueue {
    pub(crate) fn new() -> Self {
        ExpiryQueue {
            heap: Mutex::new(BinaryHeap::new()),
            wakeup: Condvar::new(),
            stop: AtomicBool::new(false),
        }
    }

    /// Enqueues a deadline and wakes the worker so it can re-aim its wait.
    pub(crate) fn schedule(&self, key: Vec<u8>, when: Instant) {
        let mut heap = self.heap.lock();
        heap.push(Reverse(ExpireItem { when, key }));
        self.wakeup.notify_one();
    }

    /// Requests worker shutdown.
    ///
    /// The flag is published while holding the heap mutex: the worker is
    /// either before its flag check (and will see it) or parked inside a
    /// wait (and will be notified), never in between.
    pub(crate) fn request_stop(&self) {
        let _heap = self.heap.lock();
        self.stop.store(true, Ordering::Release);
        self.wakeup.notify_all();
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// Worker loop: wait for the nearest deadline, pop due items, and remove
/// each from the map iff the re-read entry still carries an elapsed
/// deadline.
pub(crate) fn run_expiry_worker(queue: Arc<ExpiryQueue>, map: Arc<StripedMap>) {
    loop {
        let mut heap = queue.heap.lock();
        if queue.stopped() {
            return;
        }

        let deadline = match heap.peek() {
            Some(Reverse(item)) => item.when,
            None => {
                let _ = queue.wakeup.wait_for(&mut heap, IDLE_WAIT);
                continue;
            }
        };

        let now = Instant::now();
        if deadline <= now {
            if let Some(Reverse(item)) = heap.pop() {
                // The heap mutex must not be held across a stripe lock.
                drop(heap);
                map.remove_expired(&item.key, now);
            }
        } else {
            let _ = queue.wakeup.wait_until(&mut heap, deadline);
        }
    }
}
