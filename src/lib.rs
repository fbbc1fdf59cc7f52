//! # bintiles
//!
//! A caching tile client for binned data pyramids.
//!
//! A pyramid is a quadtree of zoom levels: level `L` holds `2^L x 2^L`
//! tiles, each tile a fixed-size 2D grid of bins holding scalar or array
//! aggregates. This crate serves those tiles to rendering and query clients
//! from an asynchronous backing store, deduplicating concurrent fetches,
//! bounding resident memory, and substituting coarser ancestor tiles when
//! the exact tile is unavailable.
//!
//! ## Features
//!
//! - **Addressing algebra**: ancestor arithmetic and bin-window mapping
//!   between pyramid levels, as pure functions over validated addresses
//! - **Sub-tile views**: expose a bin-rectangle of a coarse tile as an
//!   independent finer tile, without copying bin data
//! - **Fetch deduplication**: concurrent requests for one address share a
//!   single backing-store read and a single shared payload
//! - **Bounded caching**: per-pyramid LRU eviction of resolved tiles;
//!   in-flight entries are never evicted, absence is never cached
//! - **Coarseness fallback**: probe shallower levels first and window the
//!   first hit down to the requested address
//!
//! ## Architecture
//!
//! - [`pyramid`] - tile addresses, level arithmetic, bin windows, metadata
//! - [`tile`] - bin-grid payloads, views, the consumer-facing [`TileGrid`]
//! - [`cache`] - the concurrent cache, waiter bridges, and the caching
//!   service
//! - [`store`] - the backing-store trait this crate consumes
//! - [`config`] - service tuning knobs
//! - [`error`] - one error enum per failure domain
//!
//! ## Example
//!
//! ```rust,no_run
//! use bintiles::{CacheConfig, CachingTileService, TileAddress, TileGrid, TileStore};
//!
//! # async fn example<S: TileStore<f64>>(store: S) -> Option<()> {
//! let config = CacheConfig::new().with_max_resident_tiles(10_000);
//! let service = CachingTileService::<f64, _>::with_config(store, config);
//!
//! service.register_pyramid("tweet-heatmap").await.ok()?;
//!
//! // Exact read; `None` means the store has no data for the address
//! let address = TileAddress::new(4, 7, 9).ok()?;
//! let tile = service.read_tile("tweet-heatmap", address).await?;
//! let total: f64 = *tile.bin(0, 0).ok()?;
//!
//! // Tolerate up to two shallower levels standing in for the exact tile
//! let resolved = service
//!     .read_tile_coarse("tweet-heatmap", address, 3)
//!     .await
//!     .ok()??;
//! assert_eq!(resolved.definition().address, address);
//! # Some(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod pyramid;
pub mod store;
pub mod tile;

// Re-export commonly used types
pub use cache::{BlockingWaiter, CachingTileService, ChannelWaiter, TileCache, TileWaiter};
pub use config::{
    CacheConfig, DEFAULT_COARSENESS, DEFAULT_FETCH_CONCURRENCY, DEFAULT_MAX_RESIDENT_TILES,
};
pub use error::{MetadataError, ServiceError, StoreError, TileError};
pub use pyramid::{
    bin_window, BinWindow, LevelExtrema, PyramidMetadata, TileAddress, DEFAULT_TILE_SIZE,
    MAX_LEVEL,
};
pub use store::TileStore;
pub use tile::{BinValue, ResolvedTile, SubTileView, TileData, TileDefinition, TileGrid};
