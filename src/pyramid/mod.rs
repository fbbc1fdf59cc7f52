//! Pyramid addressing algebra and metadata.
//!
//! Everything here is stateless arithmetic or plain data:
//!
//! - [`TileAddress`]: validated `(level, x, y)` tile identifier
//! - [`ancestor_at`](TileAddress::ancestor_at): walk up the quadtree
//! - [`bin_window`]: map a descendant tile's footprint onto an ancestor's
//!   bin grid
//! - [`PyramidMetadata`]: decoded pyramid description from the backing store
//!
//! The cache layer builds on these; nothing here touches I/O or locks.

pub mod address;
pub mod metadata;
pub mod window;

pub use address::{TileAddress, MAX_LEVEL};
pub use metadata::{LevelExtrema, PyramidMetadata, DEFAULT_TILE_SIZE};
pub use window::{bin_window, BinWindow};
