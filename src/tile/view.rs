//! Windows over coarser tiles.
//!
//! When the exact tile for an address is unavailable, a rectangle of bins cut
//! out of a shallower ancestor can stand in for it. [`SubTileView`] borrows a
//! source [`TileData`] and presents such a rectangle as an independent tile
//! at a deeper address; [`ResolvedTile`] is its owning counterpart for cache
//! lookups, holding the shared ancestor payload itself. Neither copies any
//! bin values.
//!
//! Tile `y` counts from the bottom of the pyramid while bin rows count from
//! the top, so the window's row origin is flipped within the source grid;
//! columns map straight through.

use std::sync::Arc;

use crate::error::TileError;
use crate::pyramid::TileAddress;
use crate::tile::data::{TileData, TileDefinition, TileGrid};

// =============================================================================
// Window computation
// =============================================================================

/// Validated placement of a deeper tile inside a source grid.
#[derive(Debug, Clone, Copy)]
struct ViewWindow {
    target: TileAddress,
    origin_col: usize,
    origin_row: usize,
    x_bins: usize,
    y_bins: usize,
}

impl ViewWindow {
    /// Place `target` inside the grid described by `source`.
    ///
    /// The target must sit at the source's level or deeper, inside the
    /// source's descendant block, and shallow enough that the source grid
    /// still has at least one bin per target bin axis.
    fn compute(source: TileDefinition, target: TileAddress) -> Result<Self, TileError> {
        let source_address = source.address;
        if target.level() < source_address.level() {
            return Err(TileError::NegativeRelativeLevel {
                source_level: source_address.level(),
                target: target.level(),
            });
        }
        let delta = target.level() - source_address.level();
        let blocks = 1u64 << delta;

        let x_bins = (source.x_bins as u64) / blocks;
        let y_bins = (source.y_bins as u64) / blocks;
        if x_bins < 1 || y_bins < 1 {
            return Err(TileError::ViewTooDeep {
                relative_level: delta,
                x_bins: source.x_bins,
                y_bins: source.y_bins,
            });
        }

        if !source_address.contains(target) {
            return Err(TileError::OutsideFootprint {
                source_tile: source_address,
                target,
            });
        }

        let rel_x = u64::from(target.x()) - (u64::from(source_address.x()) << delta);
        let rel_y = u64::from(target.y()) - (u64::from(source_address.y()) << delta);

        // Tile y grows upward, bin rows grow downward: flip the row block.
        Ok(ViewWindow {
            target,
            origin_col: (rel_x * x_bins) as usize,
            origin_row: ((blocks - 1 - rel_y) * y_bins) as usize,
            x_bins: x_bins as usize,
            y_bins: y_bins as usize,
        })
    }

    fn definition(&self) -> TileDefinition {
        TileDefinition {
            address: self.target,
            x_bins: self.x_bins,
            y_bins: self.y_bins,
        }
    }

    fn check_bounds(&self, col: usize, row: usize) -> Result<(), TileError> {
        if col >= self.x_bins || row >= self.y_bins {
            return Err(TileError::BinOutOfRange {
                col,
                row,
                x_bins: self.x_bins,
                y_bins: self.y_bins,
            });
        }
        Ok(())
    }
}

// =============================================================================
// SubTileView
// =============================================================================

/// Borrowed window over a source tile, addressed at a deeper level.
///
/// The view never takes ownership: the source must outlive it, and reads are
/// forwarded bin-by-bin with an origin offset. Fully immutable once
/// constructed: every invariant is checked in [`from_source`](Self::from_source)
/// and can never be violated afterwards.
pub struct SubTileView<'a, T> {
    source: &'a TileData<T>,
    window: ViewWindow,
}

impl<'a, T> SubTileView<'a, T> {
    /// Expose the part of `source` covered by `target` as its own tile.
    ///
    /// # Errors
    ///
    /// Fails with [`TileError::NegativeRelativeLevel`] if the target is
    /// shallower than the source, [`TileError::ViewTooDeep`] if the source
    /// grid cannot resolve a tile that deep, and
    /// [`TileError::OutsideFootprint`] if the target does not descend from
    /// the source address.
    pub fn from_source(source: &'a TileData<T>, target: TileAddress) -> Result<Self, TileError> {
        let window = ViewWindow::compute(source.definition(), target)?;
        Ok(Self { source, window })
    }
}

impl<T> TileGrid<T> for SubTileView<'_, T> {
    fn definition(&self) -> TileDefinition {
        self.window.definition()
    }

    fn bin(&self, col: usize, row: usize) -> Result<&T, TileError> {
        self.window.check_bounds(col, row)?;
        self.source
            .bin(self.window.origin_col + col, self.window.origin_row + row)
    }
}

// =============================================================================
// ResolvedTile
// =============================================================================

/// Outcome of a cache lookup that may have fallen back to a coarser level.
///
/// Downstream consumers see a tile of the requested shape either way; whether
/// the bins come from the exact payload or from a window over a shallower
/// ancestor is visible only through [`is_substituted`](Self::is_substituted).
#[derive(Debug, Clone)]
pub struct ResolvedTile<T> {
    source: Arc<TileData<T>>,
    window: Option<ViewWindow>,
}

impl<T> ResolvedTile<T> {
    /// Wrap the exact payload for the requested address.
    pub fn exact(tile: Arc<TileData<T>>) -> Self {
        Self {
            source: tile,
            window: None,
        }
    }

    /// Address a shallower ancestor's payload as the requested tile.
    ///
    /// Fails like [`SubTileView::from_source`] on any malformed relationship
    /// between the ancestor and the requested address.
    pub fn substituted(source: Arc<TileData<T>>, target: TileAddress) -> Result<Self, TileError> {
        let window = ViewWindow::compute(source.definition(), target)?;
        Ok(Self {
            source,
            window: Some(window),
        })
    }

    /// Whether a coarser ancestor supplied the bins.
    pub fn is_substituted(&self) -> bool {
        self.window.is_some()
    }

    /// Level of the tile that actually supplied the data.
    pub fn source_level(&self) -> u32 {
        self.source.address().level()
    }

    /// The payload backing this tile (the ancestor itself when substituted).
    pub fn source(&self) -> &Arc<TileData<T>> {
        &self.source
    }
}

impl<T> TileGrid<T> for ResolvedTile<T> {
    fn definition(&self) -> TileDefinition {
        match &self.window {
            Some(window) => window.definition(),
            None => self.source.definition(),
        }
    }

    fn bin(&self, col: usize, row: usize) -> Result<&T, TileError> {
        match &self.window {
            Some(window) => {
                window.check_bounds(col, row)?;
                self.source
                    .bin(window.origin_col + col, window.origin_row + row)
            }
            None => self.source.bin(col, row),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(level: u32, x: u32, y: u32) -> TileAddress {
        TileAddress::new(level, x, y).unwrap()
    }

    /// 4x4 source at the pyramid root, bins 0..15 row-major:
    ///    0  1  2  3
    ///    4  5  6  7
    ///    8  9 10 11
    ///   12 13 14 15
    fn source16() -> TileData<i32> {
        TileData::new(addr(0, 0, 0), 4, 4, (0..16).collect()).unwrap()
    }

    #[test]
    fn test_simple() {
        let source = source16();
        let view = SubTileView::from_source(&source, addr(1, 1, 1)).unwrap();

        let definition = view.definition();
        assert_eq!(definition.address, addr(1, 1, 1));
        assert_eq!(definition.x_bins, 2);
        assert_eq!(definition.y_bins, 2);

        assert_eq!(view.bin(0, 0), Ok(&2));
        assert_eq!(view.bin(1, 0), Ok(&3));
        assert_eq!(view.bin(0, 1), Ok(&6));
        assert_eq!(view.bin(1, 1), Ok(&7));
    }

    #[test]
    fn test_simple_two_levels() {
        let source = source16();
        let view = SubTileView::from_source(&source, addr(2, 1, 1)).unwrap();

        let definition = view.definition();
        assert_eq!(definition.address, addr(2, 1, 1));
        assert_eq!(definition.x_bins, 1);
        assert_eq!(definition.y_bins, 1);

        assert_eq!(view.bin(0, 0), Ok(&9));
    }

    #[test]
    fn test_all_quadrants() {
        // Tile y counts from the bottom: (1,0,0) is the bottom-left quadrant
        let source = source16();
        let cases = [
            (addr(1, 0, 0), [8, 9, 12, 13]),
            (addr(1, 1, 0), [10, 11, 14, 15]),
            (addr(1, 0, 1), [0, 1, 4, 5]),
            (addr(1, 1, 1), [2, 3, 6, 7]),
        ];

        for (target, expected) in cases {
            let view = SubTileView::from_source(&source, target).unwrap();
            assert_eq!(view.bin(0, 0), Ok(&expected[0]), "{target}");
            assert_eq!(view.bin(1, 0), Ok(&expected[1]), "{target}");
            assert_eq!(view.bin(0, 1), Ok(&expected[2]), "{target}");
            assert_eq!(view.bin(1, 1), Ok(&expected[3]), "{target}");
        }
    }

    #[test]
    fn test_view_forwards_to_source_window() {
        // Every in-range view bin equals the source bin at origin + offset
        let source = source16();
        let view = SubTileView::from_source(&source, addr(1, 1, 0)).unwrap();

        for row in 0..2 {
            for col in 0..2 {
                assert_eq!(
                    view.bin(col, row).unwrap(),
                    source.bin(2 + col, 2 + row).unwrap()
                );
            }
        }
    }

    #[test]
    fn test_bad_relative_level() {
        let source = TileData::filled(addr(3, 0, 0), 4, 4, 0).unwrap();
        let result = SubTileView::from_source(&source, addr(2, 1, 1));
        assert_eq!(
            result.err(),
            Some(TileError::NegativeRelativeLevel {
                source_level: 3,
                target: 2
            })
        );
    }

    #[test]
    fn test_bad_relative_index() {
        let source = TileData::filled(addr(1, 0, 0), 4, 4, 0).unwrap();
        let result = SubTileView::from_source(&source, addr(2, 2, 1));
        assert!(matches!(
            result.err(),
            Some(TileError::OutsideFootprint { .. })
        ));
    }

    #[test]
    fn test_relative_level_too_deep() {
        // A 4x4 grid splits twice; three levels down there is less than one
        // bin per target
        let source = source16();
        let result = SubTileView::from_source(&source, addr(3, 1, 1));
        assert_eq!(
            result.err(),
            Some(TileError::ViewTooDeep {
                relative_level: 3,
                x_bins: 4,
                y_bins: 4
            })
        );
    }

    #[test]
    fn test_out_of_bounds_bin() {
        let source = source16();
        let view = SubTileView::from_source(&source, addr(1, 1, 1)).unwrap();

        assert!(matches!(
            view.bin(2, 1),
            Err(TileError::BinOutOfRange { .. })
        ));
        assert!(matches!(
            view.bin(1, 2),
            Err(TileError::BinOutOfRange { .. })
        ));
    }

    #[test]
    fn test_resolved_tile_exact() {
        let tile = Arc::new(source16());
        let resolved = ResolvedTile::exact(tile.clone());

        assert!(!resolved.is_substituted());
        assert_eq!(resolved.source_level(), 0);
        assert_eq!(resolved.definition(), tile.definition());
        assert_eq!(resolved.bin(3, 2), Ok(&11));
    }

    #[test]
    fn test_resolved_tile_substituted() {
        let ancestor = Arc::new(source16());
        let resolved = ResolvedTile::substituted(ancestor, addr(2, 1, 1)).unwrap();

        assert!(resolved.is_substituted());
        assert_eq!(resolved.source_level(), 0);

        let definition = resolved.definition();
        assert_eq!(definition.address, addr(2, 1, 1));
        assert_eq!(definition.x_bins, 1);
        assert_eq!(definition.y_bins, 1);
        assert_eq!(resolved.bin(0, 0), Ok(&9));
        assert!(resolved.bin(1, 0).is_err());
    }

    #[test]
    fn test_resolved_tile_substituted_validates() {
        let ancestor = Arc::new(source16());
        assert!(matches!(
            ResolvedTile::substituted(ancestor, addr(3, 0, 0)).err(),
            Some(TileError::ViewTooDeep { .. })
        ));
    }
}
