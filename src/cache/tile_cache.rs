//! Concurrent tile cache for one pyramid.
//!
//! The cache keeps two kinds of entries for tile addresses:
//!
//! - **Pending** entries track an address whose fetch is outstanding, with
//!   the list of waiters to notify and a flag recording whether a fetch round
//!   has claimed the address yet.
//! - **Resolved** entries hold the immutable payload in an LRU map bounded by
//!   the configured resident-tile budget.
//!
//! Both live under one mutex, which is what makes the core guarantee cheap
//! to state: while a pending or resolved entry exists for an address, at most
//! one fetch is ever issued for it. [`new_requests`](TileCache::new_requests)
//! claims addresses and creates entries in the same critical section, so
//! concurrent requesters cannot race a second fetch into existence.
//!
//! Resolution is terminal and happens once per entry: `provide_tile` or
//! `abandon`, never both. Abandoned entries are dropped on the spot; absence
//! is never cached, so the next request for that address starts a fresh
//! cycle. Waiters are always notified outside the lock, in arbitrary order.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::cache::waiter::TileWaiter;
use crate::pyramid::TileAddress;
use crate::tile::TileData;

struct PendingEntry<T> {
    waiters: Vec<Arc<dyn TileWaiter<T>>>,
    /// Set once a fetch round has claimed this address
    dispatched: bool,
}

impl<T> PendingEntry<T> {
    fn new() -> Self {
        Self {
            waiters: Vec::new(),
            dispatched: false,
        }
    }
}

struct CacheState<T> {
    resolved: LruCache<TileAddress, Arc<TileData<T>>>,
    pending: HashMap<TileAddress, PendingEntry<T>>,
}

/// Bounded, fetch-deduplicating tile cache for a single pyramid.
///
/// Any number of threads may use it concurrently; tile payloads come back as
/// shared `Arc`s. Waiter counts per entry are unbounded by design;
/// backpressure belongs to the fetching side.
pub struct TileCache<T> {
    state: Mutex<CacheState<T>>,
    capacity: usize,
}

impl<T: Send + Sync + 'static> TileCache<T> {
    /// Create a cache holding at most `max_resident_tiles` resolved tiles.
    ///
    /// Pending entries are not counted against the budget and are never
    /// evicted.
    pub fn new(max_resident_tiles: usize) -> Self {
        let capacity = max_resident_tiles.max(1);
        Self {
            state: Mutex::new(CacheState {
                resolved: LruCache::new(
                    NonZeroUsize::new(capacity).expect("capacity clamped to at least 1"),
                ),
                pending: HashMap::new(),
            }),
            capacity,
        }
    }

    /// Request a tile, registering `waiter` for the outcome.
    ///
    /// - Already resolved: `on_resolved` fires synchronously on the calling
    ///   thread and the entry's recency is refreshed. No fetch is triggered.
    /// - Already pending: the waiter joins the entry. No fetch is triggered.
    /// - Unknown: a pending entry is created, unclaimed until the next
    ///   [`new_requests`](Self::new_requests) round picks it up.
    pub fn request_tile(&self, address: TileAddress, waiter: Arc<dyn TileWaiter<T>>) {
        let resolved = {
            let mut state = self.state.lock();
            match state.resolved.get(&address) {
                Some(tile) => Some(tile.clone()),
                None => {
                    state
                        .pending
                        .entry(address)
                        .or_insert_with(PendingEntry::new)
                        .waiters
                        .push(waiter.clone());
                    None
                }
            }
        };
        if let Some(tile) = resolved {
            waiter.on_resolved(&tile);
        }
    }

    /// Claim the subsequence of `addresses` that still needs a fetch.
    ///
    /// Filtering and entry creation happen atomically: an address comes back
    /// at most once across all rounds while its entry lives, so the caller
    /// can hand the result straight to the backing store without a second
    /// deduplication pass. Addresses never seen before get a pending entry
    /// here (the prefetch path); duplicates within one call collapse.
    pub fn new_requests(&self, addresses: &[TileAddress]) -> Vec<TileAddress> {
        let mut state = self.state.lock();
        let mut fresh = Vec::new();
        for &address in addresses {
            if state.resolved.contains(&address) {
                continue;
            }
            let entry = state.pending.entry(address).or_insert_with(PendingEntry::new);
            if !entry.dispatched {
                entry.dispatched = true;
                fresh.push(address);
            }
        }
        fresh
    }

    /// Resolve an address with its fetched payload.
    ///
    /// Called exactly once per pending entry on fetch success, from whichever
    /// thread ran the fetch. The payload is stored resolved, every registered
    /// waiter is notified outside the lock, and if the resident budget
    /// overflows the least-recently-accessed resolved tile is evicted.
    pub fn provide_tile(&self, tile: TileData<T>) {
        let address = tile.address();
        let tile = Arc::new(tile);
        let waiters = {
            let mut state = self.state.lock();
            let waiters = state
                .pending
                .remove(&address)
                .map(|entry| entry.waiters)
                .unwrap_or_default();
            if let Some((evicted, _)) = state.resolved.push(address, tile.clone()) {
                if evicted != address {
                    trace!(tile = %evicted, "evicted least-recently-used tile");
                }
            }
            waiters
        };
        for waiter in &waiters {
            waiter.on_resolved(&tile);
        }
    }

    /// Drop a pending entry whose fetch yielded no data.
    ///
    /// All waiters get `on_abandoned` and the entry is removed entirely:
    /// the next request for this address starts over with a fresh fetch.
    pub fn abandon(&self, address: TileAddress) {
        let waiters = {
            let mut state = self.state.lock();
            state
                .pending
                .remove(&address)
                .map(|entry| entry.waiters)
                .unwrap_or_default()
        };
        if !waiters.is_empty() {
            debug!(tile = %address, waiters = waiters.len(), "abandoning tile request");
        }
        for waiter in &waiters {
            waiter.on_abandoned();
        }
    }

    /// Whether a resolved payload is resident, without touching recency.
    pub fn contains_resolved(&self, address: TileAddress) -> bool {
        self.state.lock().resolved.peek(&address).is_some()
    }

    /// Number of resolved tiles currently resident.
    pub fn resident_tiles(&self) -> usize {
        self.state.lock().resolved.len()
    }

    /// Number of addresses with an outstanding fetch.
    pub fn pending_requests(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Configured resident-tile budget.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;

    use crate::cache::waiter::BlockingWaiter;

    /// Waiter that records every notification it receives.
    struct RecorderWaiter {
        resolved: Mutex<Option<Arc<TileData<i32>>>>,
        resolved_count: AtomicUsize,
        abandoned_count: AtomicUsize,
    }

    impl RecorderWaiter {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                resolved: Mutex::new(None),
                resolved_count: AtomicUsize::new(0),
                abandoned_count: AtomicUsize::new(0),
            })
        }

        fn payload(&self) -> Option<Arc<TileData<i32>>> {
            self.resolved.lock().clone()
        }
    }

    impl TileWaiter<i32> for RecorderWaiter {
        fn on_resolved(&self, tile: &Arc<TileData<i32>>) {
            *self.resolved.lock() = Some(tile.clone());
            self.resolved_count.fetch_add(1, Ordering::SeqCst);
        }

        fn on_abandoned(&self) {
            self.abandoned_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn addr(level: u32, x: u32, y: u32) -> TileAddress {
        TileAddress::new(level, x, y).unwrap()
    }

    fn make_tile(address: TileAddress, value: i32) -> TileData<i32> {
        TileData::filled(address, 2, 2, value).unwrap()
    }

    #[test]
    fn test_request_then_single_fetch_claim() {
        let cache = TileCache::new(10);
        let address = addr(3, 1, 2);

        cache.request_tile(address, RecorderWaiter::new());

        assert_eq!(cache.new_requests(&[address]), vec![address]);
        // Claimed: later rounds must not fetch it again
        assert_eq!(cache.new_requests(&[address]), Vec::new());
    }

    #[test]
    fn test_new_requests_creates_prefetch_entries() {
        let cache: TileCache<i32> = TileCache::new(10);
        let address = addr(2, 0, 3);

        // First sighting comes through the fetch round itself
        assert_eq!(cache.new_requests(&[address]), vec![address]);
        assert_eq!(cache.pending_requests(), 1);

        // A waiter arriving afterwards joins the pending entry, no new fetch
        cache.request_tile(address, RecorderWaiter::new());
        assert_eq!(cache.new_requests(&[address]), Vec::new());
    }

    #[test]
    fn test_new_requests_collapses_duplicates() {
        let cache: TileCache<i32> = TileCache::new(10);
        let address = addr(1, 1, 0);

        assert_eq!(cache.new_requests(&[address, address]), vec![address]);
    }

    #[test]
    fn test_provide_resolves_every_waiter_with_shared_payload() {
        let cache = TileCache::new(10);
        let address = addr(4, 5, 9);

        let waiters: Vec<_> = (0..8).map(|_| RecorderWaiter::new()).collect();
        for waiter in &waiters {
            cache.request_tile(address, waiter.clone());
        }
        assert_eq!(cache.new_requests(&[address]), vec![address]);

        cache.provide_tile(make_tile(address, 42));

        let first = waiters[0].payload().unwrap();
        for waiter in &waiters {
            assert_eq!(waiter.resolved_count.load(Ordering::SeqCst), 1);
            assert!(Arc::ptr_eq(&waiter.payload().unwrap(), &first));
        }
        assert_eq!(cache.pending_requests(), 0);
        assert_eq!(cache.resident_tiles(), 1);
    }

    #[test]
    fn test_resolved_entry_answers_synchronously() {
        let cache = TileCache::new(10);
        let address = addr(2, 1, 1);

        assert_eq!(cache.new_requests(&[address]), vec![address]);
        cache.provide_tile(make_tile(address, 7));

        let waiter = RecorderWaiter::new();
        cache.request_tile(address, waiter.clone());

        // Answered on the calling thread, before anything else runs
        assert_eq!(waiter.resolved_count.load(Ordering::SeqCst), 1);
        assert_eq!(cache.new_requests(&[address]), Vec::new());
    }

    #[test]
    fn test_abandon_notifies_and_forgets() {
        let cache = TileCache::new(10);
        let address = addr(3, 0, 0);

        let waiters: Vec<_> = (0..3).map(|_| RecorderWaiter::new()).collect();
        for waiter in &waiters {
            cache.request_tile(address, waiter.clone());
        }
        assert_eq!(cache.new_requests(&[address]), vec![address]);

        cache.abandon(address);

        for waiter in &waiters {
            assert_eq!(waiter.abandoned_count.load(Ordering::SeqCst), 1);
            assert_eq!(waiter.resolved_count.load(Ordering::SeqCst), 0);
        }
        // Absence is not cached: the address needs a fresh fetch again
        assert_eq!(cache.pending_requests(), 0);
        assert_eq!(cache.new_requests(&[address]), vec![address]);
    }

    #[test]
    fn test_eviction_is_lru_over_resolved_only() {
        let cache = TileCache::new(2);
        let a = addr(2, 0, 0);
        let b = addr(2, 1, 0);
        let c = addr(2, 2, 0);

        cache.new_requests(&[a, b, c]);
        cache.provide_tile(make_tile(a, 1));
        cache.provide_tile(make_tile(b, 2));

        // Touch `a` so `b` is the least recently accessed
        cache.request_tile(a, RecorderWaiter::new());

        cache.provide_tile(make_tile(c, 3));

        assert_eq!(cache.resident_tiles(), 2);
        assert!(cache.contains_resolved(a));
        assert!(!cache.contains_resolved(b));
        assert!(cache.contains_resolved(c));
    }

    #[test]
    fn test_pending_entries_survive_eviction_pressure() {
        let cache = TileCache::new(1);
        let pending = addr(3, 3, 3);
        let a = addr(3, 0, 0);
        let b = addr(3, 1, 0);

        let waiter = RecorderWaiter::new();
        cache.request_tile(pending, waiter.clone());
        cache.new_requests(&[pending, a, b]);

        // Churn the resolved side well past capacity
        cache.provide_tile(make_tile(a, 1));
        cache.provide_tile(make_tile(b, 2));

        assert_eq!(cache.resident_tiles(), 1);
        assert_eq!(cache.pending_requests(), 1);

        // The pending entry is intact and still resolvable
        cache.provide_tile(make_tile(pending, 3));
        assert_eq!(waiter.resolved_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_requesters_single_fetch() {
        let cache = Arc::new(TileCache::new(10));
        let address = addr(5, 10, 20);
        let threads = 8;

        let barrier = Arc::new(Barrier::new(threads + 1));
        let mut handles = Vec::new();
        for _ in 0..threads {
            let cache = cache.clone();
            let barrier = barrier.clone();
            handles.push(thread::spawn(move || {
                let waiter = BlockingWaiter::new();
                cache.request_tile(address, waiter.clone());
                barrier.wait();
                waiter.wait()
            }));
        }

        // All requesters are registered once the barrier releases
        barrier.wait();
        assert_eq!(cache.new_requests(&[address]), vec![address]);
        cache.provide_tile(make_tile(address, 99));

        let mut payloads = Vec::new();
        for handle in handles {
            payloads.push(handle.join().unwrap().unwrap());
        }
        for payload in &payloads[1..] {
            assert!(Arc::ptr_eq(payload, &payloads[0]));
        }
    }

    #[test]
    fn test_capacity_accessor() {
        let cache: TileCache<i32> = TileCache::new(32);
        assert_eq!(cache.capacity(), 32);
        // Zero is clamped so the cache can always hold something
        assert_eq!(TileCache::<i32>::new(0).capacity(), 1);
    }
}
