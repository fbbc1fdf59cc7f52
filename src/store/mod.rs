//! Backing-store interface.
//!
//! The durable source of tile data lives behind [`TileStore`]; this crate
//! only consumes it. Implementations are free to read from object storage, a
//! database, or anything else that can materialize bin grids; the cache
//! layer never learns which.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::pyramid::TileAddress;
use crate::tile::TileData;

/// Read-only source of tiles and pyramid metadata.
///
/// `read_tiles` may block for as long as the backend needs and may omit any
/// address it has no data for; an omitted address is *absence*, not an
/// error, and the caller reports it as such. Once a read is dispatched there
/// is no cancellation; it runs to completion or failure.
#[async_trait]
pub trait TileStore<T>: Send + Sync {
    /// Read the tiles the store has among `addresses`, in any order.
    async fn read_tiles(
        &self,
        pyramid_id: &str,
        addresses: &[TileAddress],
    ) -> Result<Vec<TileData<T>>, StoreError>;

    /// Read the pyramid's serialized metadata document.
    async fn read_metadata(&self, pyramid_id: &str) -> Result<String, StoreError>;
}
