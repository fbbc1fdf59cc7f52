//! Tile payloads and views.
//!
//! # Components
//!
//! - [`TileData`]: owned, immutable bin grid for one address
//! - [`TileGrid`]: the read-only surface consumers see
//! - [`SubTileView`]: borrowed bin-rectangle of a coarser tile, addressed as
//!   an independent deeper tile
//! - [`ResolvedTile`]: owning lookup outcome, either the exact payload or an ancestor
//!   windowed to the requested address
//! - [`BinValue`]: element-type tags matched against pyramid metadata
//!
//! Tiles are created by a backing-store read and never mutated afterwards,
//! so the cache shares them as `Arc<TileData<T>>` across threads without
//! copying; views add an origin offset on top, never a copy of the bins.

pub mod data;
pub mod view;

pub use data::{BinValue, TileData, TileDefinition, TileGrid};
pub use view::{ResolvedTile, SubTileView};
