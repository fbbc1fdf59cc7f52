use thiserror::Error;

use crate::pyramid::TileAddress;

/// Usage errors in the pyramid addressing algebra.
///
/// Every variant is a local caller mistake: a malformed address relationship
/// or an out-of-range bin access. These fail immediately at the call site and
/// are never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TileError {
    /// Tile coordinates exceed the 2^level x 2^level grid at their level
    #[error("tile {x},{y} out of range at level {level} ({count} tiles per axis)")]
    AddressOutOfRange { level: u32, x: u32, y: u32, count: u64 },

    /// Level exceeds the supported pyramid depth
    #[error("pyramid level {level} too deep: maximum supported level is {max}")]
    LevelTooDeep { level: u32, max: u32 },

    /// Ancestor lookup asked for a level deeper than the tile itself
    #[error("level {requested} is not an ancestor level of a level-{level} tile")]
    NotAnAncestorLevel { requested: u32, level: u32 },

    /// Descendant-side address is shallower than the ancestor-side address
    #[error("negative relative level: target level {target} is above source level {source_level}")]
    NegativeRelativeLevel { source_level: u32, target: u32 },

    /// Target tile does not fall inside the source's descendant block
    #[error("tile {target} is outside the descendant footprint of {source_tile}")]
    OutsideFootprint {
        source_tile: TileAddress,
        target: TileAddress,
    },

    /// Sub-tile request deeper than the source grid can resolve
    #[error(
        "relative level {relative_level} too deep for source resolution ({x_bins}x{y_bins} bins)"
    )]
    ViewTooDeep {
        relative_level: u32,
        x_bins: usize,
        y_bins: usize,
    },

    /// Bin coordinates outside the tile's grid
    #[error("bin ({col},{row}) out of range for a {x_bins}x{y_bins} grid")]
    BinOutOfRange {
        col: usize,
        row: usize,
        x_bins: usize,
        y_bins: usize,
    },

    /// Grid dimensions and value count disagree at tile construction
    #[error("bad tile dimensions: {x_bins}x{y_bins} bins cannot hold {values} values")]
    BadDimensions {
        x_bins: usize,
        y_bins: usize,
        values: usize,
    },

    /// Coarseness factor of zero makes the fallback search empty
    #[error("invalid coarseness factor {coarseness}: must be at least 1")]
    InvalidCoarseness { coarseness: u32 },
}

/// Failures surfaced by the backing store.
///
/// The cache never retains these: a store failure is reported to waiters as
/// abandonment and the next request retries the store from scratch.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The pyramid id is unknown to the store
    #[error("pyramid not found: {0}")]
    PyramidNotFound(String),

    /// Backend-specific read failure
    #[error("backing store error: {0}")]
    Backend(String),

    /// Network or connection error
    #[error("connection error: {0}")]
    Connection(String),
}

/// Errors decoding or validating pyramid metadata.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// Metadata document is not valid JSON
    #[error("metadata decode error: {0}")]
    Json(#[from] serde_json::Error),

    /// Zoom range is inverted
    #[error("invalid zoom range: minZoom {min} exceeds maxZoom {max}")]
    InvalidZoomRange { min: u32, max: u32 },

    /// Tile grid dimensions must be positive
    #[error("invalid tile grid size: {x_bins}x{y_bins}")]
    InvalidGridSize { x_bins: usize, y_bins: usize },

    /// Declared element type does not match the cache's element type
    #[error("pyramid value type mismatch: metadata declares {declared:?}, cache holds {expected}")]
    ValueTypeMismatch {
        declared: Option<String>,
        expected: String,
    },
}

/// Errors from the caching service's pyramid registration path.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Backing store failed while reading metadata
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Metadata decoded but failed validation
    #[error(transparent)]
    Metadata(#[from] MetadataError),

    /// Pyramid was never registered with the service
    #[error("pyramid not registered: {0}")]
    NotRegistered(String),
}
