//! Service configuration.
//!
//! The caching service is configured programmatically by the embedding
//! application; this crate owns no CLI or file format for it. All knobs have
//! documented defaults sized for a typical rendering workload.

// =============================================================================
// Default Values
// =============================================================================

/// Default resident resolved-tile budget per pyramid.
pub const DEFAULT_MAX_RESIDENT_TILES: usize = 100;

/// Default bound on concurrent backing-store read rounds.
pub const DEFAULT_FETCH_CONCURRENCY: usize = 8;

/// Default coarseness factor: exact tiles only, no fallback levels.
pub const DEFAULT_COARSENESS: u32 = 1;

// =============================================================================
// CacheConfig
// =============================================================================

/// Tuning knobs for a [`CachingTileService`](crate::cache::CachingTileService).
///
/// `max_resident_tiles` bounds how many resolved tiles each pyramid's cache
/// keeps before least-recently-accessed eviction kicks in; pending fetches
/// are never counted. `fetch_concurrency` bounds how many backing-store read
/// rounds run at once; the store itself is assumed unbounded, so this is the
/// only backpressure on it.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum resolved tiles resident per pyramid
    pub max_resident_tiles: usize,

    /// Maximum concurrent backing-store read rounds
    pub fetch_concurrency: usize,
}

impl CacheConfig {
    /// Configuration with all defaults.
    pub fn new() -> Self {
        Self {
            max_resident_tiles: DEFAULT_MAX_RESIDENT_TILES,
            fetch_concurrency: DEFAULT_FETCH_CONCURRENCY,
        }
    }

    /// Override the per-pyramid resident-tile budget.
    pub fn with_max_resident_tiles(mut self, max_resident_tiles: usize) -> Self {
        self.max_resident_tiles = max_resident_tiles;
        self
    }

    /// Override the backing-store concurrency bound.
    pub fn with_fetch_concurrency(mut self, fetch_concurrency: usize) -> Self {
        self.fetch_concurrency = fetch_concurrency.max(1);
        self
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new()
    }
}
