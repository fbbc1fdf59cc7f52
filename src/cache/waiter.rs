//! Waiter bridges between cache resolution and blocked callers.
//!
//! The cache itself only knows the [`TileWaiter`] callback shape: each
//! registered waiter is told exactly once that its tile was resolved or
//! abandoned, from whichever thread completed the fetch. The adapters here
//! bridge that callback to the two ways callers actually wait:
//!
//! - [`BlockingWaiter`] parks a synchronous thread on a condition variable
//! - [`ChannelWaiter`] feeds a oneshot channel awaited by an async task
//!
//! The raw callback path never blocks; only the adapters do, on their own
//! side of the bridge.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tokio::sync::oneshot;

use crate::tile::TileData;

/// Callback registered with the cache for one tile request.
///
/// Exactly one of the two methods is invoked per registration, in arbitrary
/// order relative to other waiters of the same entry, and always outside the
/// cache's lock. Implementations must not assume which thread calls them.
pub trait TileWaiter<T>: Send + Sync {
    /// The entry resolved with a payload.
    fn on_resolved(&self, tile: &Arc<TileData<T>>);

    /// The entry was abandoned; no data will arrive for this request.
    fn on_abandoned(&self);
}

// =============================================================================
// BlockingWaiter
// =============================================================================

enum WaitOutcome<T> {
    Waiting,
    Resolved(Arc<TileData<T>>),
    Abandoned,
}

/// Condition-variable bridge for synchronous requester threads.
///
/// Register it with the cache, then call [`wait`](Self::wait) to park until
/// the entry reaches a terminal state. Abandonment and a timed-out wait both
/// read as "no tile": a caller that stopped waiting is indistinguishable
/// from genuine absence at this boundary.
pub struct BlockingWaiter<T> {
    outcome: Mutex<WaitOutcome<T>>,
    signal: Condvar,
}

impl<T> BlockingWaiter<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            outcome: Mutex::new(WaitOutcome::Waiting),
            signal: Condvar::new(),
        })
    }

    /// Block the calling thread until the request resolves or is abandoned.
    pub fn wait(&self) -> Option<Arc<TileData<T>>> {
        let mut outcome = self.outcome.lock();
        while matches!(*outcome, WaitOutcome::Waiting) {
            self.signal.wait(&mut outcome);
        }
        match &*outcome {
            WaitOutcome::Resolved(tile) => Some(tile.clone()),
            _ => None,
        }
    }

    /// Block up to `timeout`, then give up and report "no tile".
    ///
    /// The fetch itself is not cancelled; once dispatched it runs to
    /// completion either way; this caller just stops listening.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Arc<TileData<T>>> {
        let deadline = Instant::now() + timeout;
        let mut outcome = self.outcome.lock();
        while matches!(*outcome, WaitOutcome::Waiting) {
            if self.signal.wait_until(&mut outcome, deadline).timed_out() {
                break;
            }
        }
        match &*outcome {
            WaitOutcome::Resolved(tile) => Some(tile.clone()),
            _ => None,
        }
    }
}

impl<T: Send + Sync> TileWaiter<T> for BlockingWaiter<T> {
    fn on_resolved(&self, tile: &Arc<TileData<T>>) {
        *self.outcome.lock() = WaitOutcome::Resolved(tile.clone());
        self.signal.notify_all();
    }

    fn on_abandoned(&self) {
        *self.outcome.lock() = WaitOutcome::Abandoned;
        self.signal.notify_all();
    }
}

// =============================================================================
// ChannelWaiter
// =============================================================================

/// Oneshot bridge for async callers.
///
/// [`channel`](Self::channel) returns the waiter to register and the receiver
/// to await: `Some(tile)` on resolution, `None` on abandonment. Dropping the
/// receiver mid-wait simply discards the outcome for this caller.
pub struct ChannelWaiter<T> {
    sender: Mutex<Option<oneshot::Sender<Option<Arc<TileData<T>>>>>>,
}

impl<T> ChannelWaiter<T> {
    #[allow(clippy::type_complexity)]
    pub fn channel() -> (Arc<Self>, oneshot::Receiver<Option<Arc<TileData<T>>>>) {
        let (sender, receiver) = oneshot::channel();
        (
            Arc::new(Self {
                sender: Mutex::new(Some(sender)),
            }),
            receiver,
        )
    }

    fn complete(&self, outcome: Option<Arc<TileData<T>>>) {
        if let Some(sender) = self.sender.lock().take() {
            // A closed receiver means the caller already tore down
            let _ = sender.send(outcome);
        }
    }
}

impl<T: Send + Sync> TileWaiter<T> for ChannelWaiter<T> {
    fn on_resolved(&self, tile: &Arc<TileData<T>>) {
        self.complete(Some(tile.clone()));
    }

    fn on_abandoned(&self) {
        self.complete(None);
    }
}

// =============================================================================
// Tests
// =============================================================================
