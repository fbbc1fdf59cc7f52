//! Concurrent tile caching.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │           CachingTileService                │
//! │  per-pyramid caches · metadata · fallback   │
//! │  ┌───────────────┐  ┌────────────────────┐  │
//! │  │  TileCache    │  │ fetch orchestration│  │
//! │  │  (pending +   │  │ (new_requests →    │  │
//! │  │   resolved)   │  │  store → provide/  │  │
//! │  │               │  │  abandon)          │  │
//! │  └───────────────┘  └────────────────────┘  │
//! └──────────────────────┬──────────────────────┘
//!                        │
//!                        ▼
//! ┌─────────────────────────────────────────────┐
//! │              TileStore (async)              │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileCache`]: per-pyramid entry map handling fetch deduplication, waiter
//!   registration, bounded LRU eviction of resolved tiles
//! - [`TileWaiter`]: callback shape every waiter implements
//! - [`BlockingWaiter`] / [`ChannelWaiter`]: bridges to synchronous threads
//!   and async tasks
//! - [`CachingTileService`]: the cache-owning service object applications
//!   construct and inject
//!
//! The contract the whole module exists to uphold: at most one in-flight
//! fetch per address, broadcast on resolve to every waiter, and no negative
//! caching of absence.

pub mod service;
pub mod tile_cache;
pub mod waiter;

pub use service::CachingTileService;
pub use tile_cache::TileCache;
pub use waiter::{BlockingWaiter, ChannelWaiter, TileWaiter};
