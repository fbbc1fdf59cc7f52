//! Caching tile service.
//!
//! [`CachingTileService`] is the one object an application constructs and
//! injects wherever tiles are read. It owns a [`TileCache`] and a metadata
//! record per pyramid id, orchestrates backing-store fetches for addresses
//! the caches report as new, and layers the coarseness-fallback search on
//! top. Cache lifetime is the service's lifetime; there is no process-global
//! state.
//!
//! The service is generic over the bin element type: a
//! `CachingTileService<f64, _>` can only serve pyramids whose metadata
//! declares `double` bins, checked once at registration rather than at every
//! read.
//!
//! # Fetch deduplication
//!
//! Every read path funnels through [`request_tiles`](CachingTileService::request_tiles):
//! the cache atomically claims the addresses that still need a fetch, the
//! store is asked for exactly those, and each address is then either resolved
//! or abandoned. Concurrent readers of the same address share one store read
//! and one payload.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::cache::tile_cache::TileCache;
use crate::cache::waiter::ChannelWaiter;
use crate::config::CacheConfig;
use crate::error::{MetadataError, ServiceError, StoreError, TileError};
use crate::pyramid::{PyramidMetadata, TileAddress};
use crate::store::TileStore;
use crate::tile::{BinValue, ResolvedTile, TileData};

/// Cache-owning façade over a backing store.
///
/// Construct once, share as `Arc`, drop to release every cache it owns.
pub struct CachingTileService<T, S> {
    store: S,
    config: CacheConfig,
    caches: Mutex<HashMap<String, Arc<TileCache<T>>>>,
    metadata: Mutex<HashMap<String, Arc<PyramidMetadata>>>,
    fetch_slots: Semaphore,
}

impl<T, S> CachingTileService<T, S>
where
    T: BinValue,
    S: TileStore<T>,
{
    /// Create a service with default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, CacheConfig::default())
    }

    /// Create a service with explicit cache and fetch bounds.
    pub fn with_config(store: S, config: CacheConfig) -> Self {
        let fetch_slots = Semaphore::new(config.fetch_concurrency.max(1));
        Self {
            store,
            config,
            caches: Mutex::new(HashMap::new()),
            metadata: Mutex::new(HashMap::new()),
            fetch_slots,
        }
    }

    /// The tile cache for a pyramid, created on first use.
    pub fn cache(&self, pyramid_id: &str) -> Arc<TileCache<T>> {
        self.caches
            .lock()
            .entry(pyramid_id.to_string())
            .or_insert_with(|| Arc::new(TileCache::new(self.config.max_resident_tiles)))
            .clone()
    }

    /// Register a pyramid: read its metadata and verify the element type.
    ///
    /// The metadata's `valueType` tag must match `T::type_tag()`; a document
    /// without a tag is accepted as-is. Registration is idempotent: repeat
    /// calls return the cached document without touching the store.
    ///
    /// # Errors
    ///
    /// Fails if the store cannot produce the document, the document does not
    /// decode, or the declared element type disagrees with this service.
    pub async fn register_pyramid(
        &self,
        pyramid_id: &str,
    ) -> Result<Arc<PyramidMetadata>, ServiceError> {
        if let Some(existing) = self.metadata.lock().get(pyramid_id) {
            return Ok(existing.clone());
        }

        let raw = self.store.read_metadata(pyramid_id).await?;
        let metadata = PyramidMetadata::from_json(&raw).map_err(ServiceError::Metadata)?;
        if let Some(declared) = &metadata.value_type {
            if *declared != T::type_tag() {
                return Err(MetadataError::ValueTypeMismatch {
                    declared: Some(declared.clone()),
                    expected: T::type_tag(),
                }
                .into());
            }
        }

        let metadata = Arc::new(metadata);
        self.metadata
            .lock()
            .insert(pyramid_id.to_string(), metadata.clone());
        self.cache(pyramid_id);
        Ok(metadata)
    }

    /// The registered metadata for a pyramid.
    pub fn metadata(&self, pyramid_id: &str) -> Result<Arc<PyramidMetadata>, ServiceError> {
        self.metadata
            .lock()
            .get(pyramid_id)
            .cloned()
            .ok_or_else(|| ServiceError::NotRegistered(pyramid_id.to_string()))
    }

    /// Fetch whatever subset of `addresses` still needs the backing store.
    ///
    /// The cache claims the new addresses atomically, so concurrent rounds
    /// for overlapping address sets issue each fetch once. Every claimed
    /// address ends this call resolved or abandoned: tiles the store omitted
    /// are abandoned individually, and a store error abandons the whole
    /// round. The error is returned for logging only; nothing about it is
    /// cached, so the next round retries from scratch.
    pub async fn request_tiles(
        &self,
        pyramid_id: &str,
        addresses: &[TileAddress],
    ) -> Result<(), StoreError> {
        let cache = self.cache(pyramid_id);
        let fresh = cache.new_requests(addresses);
        if fresh.is_empty() {
            return Ok(());
        }
        debug!(
            pyramid = pyramid_id,
            count = fresh.len(),
            "fetching tiles from backing store"
        );

        let result = {
            let _permit = self
                .fetch_slots
                .acquire()
                .await
                .map_err(|_| StoreError::Backend("fetch limiter closed".to_string()))?;
            self.store.read_tiles(pyramid_id, &fresh).await
        };

        match result {
            Ok(tiles) => {
                let mut missing: HashSet<TileAddress> = fresh.iter().copied().collect();
                for tile in tiles {
                    missing.remove(&tile.address());
                    cache.provide_tile(tile);
                }
                for address in missing {
                    cache.abandon(address);
                }
                Ok(())
            }
            Err(error) => {
                warn!(
                    pyramid = pyramid_id,
                    error = %error,
                    "backing store read failed, abandoning round"
                );
                for address in fresh {
                    cache.abandon(address);
                }
                Err(error)
            }
        }
    }

    /// Read one tile, fetching it if needed.
    ///
    /// Returns `None` when the store has no data for the address or the
    /// fetch failed; absence and failure are indistinguishable here, and
    /// neither is cached.
    pub async fn read_tile(
        &self,
        pyramid_id: &str,
        address: TileAddress,
    ) -> Option<Arc<TileData<T>>> {
        let cache = self.cache(pyramid_id);
        let (waiter, receiver) = ChannelWaiter::channel();
        cache.request_tile(address, waiter);

        if let Err(error) = self.request_tiles(pyramid_id, &[address]).await {
            debug!(pyramid = pyramid_id, tile = %address, error = %error, "tile read failed");
        }

        receiver.await.unwrap_or(None)
    }

    /// Read a batch of tiles with a single fetch round.
    ///
    /// The result is positionally aligned with `addresses`; unavailable tiles
    /// come back as `None`.
    pub async fn read_tiles(
        &self,
        pyramid_id: &str,
        addresses: &[TileAddress],
    ) -> Vec<Option<Arc<TileData<T>>>> {
        let cache = self.cache(pyramid_id);
        let mut receivers = Vec::with_capacity(addresses.len());
        for &address in addresses {
            let (waiter, receiver) = ChannelWaiter::channel();
            cache.request_tile(address, waiter);
            receivers.push(receiver);
        }

        if let Err(error) = self.request_tiles(pyramid_id, addresses).await {
            debug!(pyramid = pyramid_id, error = %error, "batch read failed");
        }

        let mut tiles = Vec::with_capacity(receivers.len());
        for receiver in receivers {
            tiles.push(receiver.await.unwrap_or(None));
        }
        tiles
    }

    /// Read a tile, accepting a shallower ancestor as a substitute.
    ///
    /// With coarseness factor `c >= 1`, levels `max(L - (c-1), 0) ..= L` are
    /// probed shallow-to-deep and the search stops at the first level with
    /// data: a coarse tile already resident wins over an exact tile that
    /// would need a fetch. A substituted result is windowed down to `address`
    /// so the caller sees the requested shape either way. `None` means no
    /// level in range had data: absence, not an error.
    ///
    /// # Errors
    ///
    /// Fails with [`TileError::InvalidCoarseness`] for `coarseness == 0`.
    pub async fn read_tile_coarse(
        &self,
        pyramid_id: &str,
        address: TileAddress,
        coarseness: u32,
    ) -> Result<Option<ResolvedTile<T>>, TileError> {
        if coarseness == 0 {
            return Err(TileError::InvalidCoarseness { coarseness });
        }

        let shallowest = address.level().saturating_sub(coarseness - 1);
        for level in shallowest..=address.level() {
            let probe = address.ancestor_at(level)?;
            let Some(tile) = self.read_tile(pyramid_id, probe).await else {
                continue;
            };
            if level == address.level() {
                return Ok(Some(ResolvedTile::exact(tile)));
            }
            match ResolvedTile::substituted(tile, address) {
                Ok(resolved) => return Ok(Some(resolved)),
                Err(error) => {
                    // Ancestor grid too coarse to window down: treat this
                    // level as absent and keep searching deeper
                    debug!(
                        pyramid = pyramid_id,
                        tile = %address,
                        ancestor_level = level,
                        error = %error,
                        "ancestor unusable as substitute"
                    );
                }
            }
        }
        Ok(None)
    }

    /// The backing store this service reads from.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Resident and pending entry counts for a pyramid's cache.
    ///
    /// Returns `(resident_tiles, pending_requests, capacity)`.
    pub fn cache_stats(&self, pyramid_id: &str) -> (usize, usize, usize) {
        let cache = self.cache(pyramid_id);
        (
            cache.resident_tiles(),
            cache.pending_requests(),
            cache.capacity(),
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
