//! Bin-grid payloads.
//!
//! A [`TileData`] owns the rectangular grid of bin values behind one tile
//! address. Tiles are immutable once constructed: the cache shares them
//! across threads as `Arc<TileData<T>>` without copying, and every consumer
//! reads them through the [`TileGrid`] interface.
//!
//! Bin storage is row-major with row 0 at the top of the grid, which is the
//! binning convention of the stores this crate reads from. Tile `y`
//! coordinates count from the bottom of the pyramid instead; the view layer
//! reconciles the two.

use crate::error::TileError;
use crate::pyramid::TileAddress;

// =============================================================================
// TileGrid
// =============================================================================

/// Shape of a tile as seen by consumers: its address and bin dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileDefinition {
    pub address: TileAddress,
    pub x_bins: usize,
    pub y_bins: usize,
}

/// Read-only consumer interface over any tile-shaped value.
///
/// Rendering and query clients only ever see this surface; they never mutate
/// a tile and never learn whether the bins live in an owned grid or a window
/// over a coarser one.
pub trait TileGrid<T> {
    /// The address and bin dimensions this grid presents as.
    fn definition(&self) -> TileDefinition;

    /// The value of one bin.
    ///
    /// # Errors
    ///
    /// Fails with [`TileError::BinOutOfRange`] outside
    /// `[0, x_bins) x [0, y_bins)`.
    fn bin(&self, col: usize, row: usize) -> Result<&T, TileError>;
}

// =============================================================================
// BinValue
// =============================================================================

/// Bin element types the store can declare in pyramid metadata.
///
/// The tag is matched against the metadata's `valueType` field when a pyramid
/// is registered, so a cache of `f64` bins cannot silently consume a pyramid
/// binned as something else.
pub trait BinValue: Clone + Send + Sync + 'static {
    /// Metadata tag for this element type, e.g. `"double"`.
    fn type_tag() -> String;
}

impl BinValue for f64 {
    fn type_tag() -> String {
        "double".to_string()
    }
}

impl BinValue for f32 {
    fn type_tag() -> String {
        "float".to_string()
    }
}

impl BinValue for i32 {
    fn type_tag() -> String {
        "int".to_string()
    }
}

impl BinValue for i64 {
    fn type_tag() -> String {
        "long".to_string()
    }
}

impl<V: BinValue> BinValue for Vec<V> {
    fn type_tag() -> String {
        format!("[{}]", V::type_tag())
    }
}

// =============================================================================
// TileData
// =============================================================================

/// Owned, immutable bin grid for one tile address.
#[derive(Debug, Clone, PartialEq)]
pub struct TileData<T> {
    address: TileAddress,
    x_bins: usize,
    y_bins: usize,
    values: Vec<T>,
}

impl<T> TileData<T> {
    /// Create a tile from a row-major value vector.
    ///
    /// # Errors
    ///
    /// Fails with [`TileError::BadDimensions`] when either dimension is zero
    /// or `values.len() != x_bins * y_bins`.
    pub fn new(
        address: TileAddress,
        x_bins: usize,
        y_bins: usize,
        values: Vec<T>,
    ) -> Result<Self, TileError> {
        if x_bins == 0 || y_bins == 0 || values.len() != x_bins * y_bins {
            return Err(TileError::BadDimensions {
                x_bins,
                y_bins,
                values: values.len(),
            });
        }
        Ok(Self {
            address,
            x_bins,
            y_bins,
            values,
        })
    }

    /// The address this tile was binned for.
    pub fn address(&self) -> TileAddress {
        self.address
    }

    /// Bins along x.
    pub fn x_bins(&self) -> usize {
        self.x_bins
    }

    /// Bins along y.
    pub fn y_bins(&self) -> usize {
        self.y_bins
    }
}

impl<T: Clone> TileData<T> {
    /// Create a tile with every bin set to `value`.
    pub fn filled(
        address: TileAddress,
        x_bins: usize,
        y_bins: usize,
        value: T,
    ) -> Result<Self, TileError> {
        Self::new(address, x_bins, y_bins, vec![value; x_bins * y_bins])
    }
}

impl<T> TileGrid<T> for TileData<T> {
    fn definition(&self) -> TileDefinition {
        TileDefinition {
            address: self.address,
            x_bins: self.x_bins,
            y_bins: self.y_bins,
        }
    }

    fn bin(&self, col: usize, row: usize) -> Result<&T, TileError> {
        if col >= self.x_bins || row >= self.y_bins {
            return Err(TileError::BinOutOfRange {
                col,
                row,
                x_bins: self.x_bins,
                y_bins: self.y_bins,
            });
        }
        Ok(&self.values[row * self.x_bins + col])
    }
}

// =============================================================================
// Tests
// =============================================================================
