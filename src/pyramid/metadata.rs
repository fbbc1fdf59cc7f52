//! Pyramid metadata decoding.
//!
//! The backing store describes each pyramid with a JSON document: the bin
//! grid size of its tiles, the zoom range it was binned over, and per-level
//! value extrema that consumers use to scale color ramps. This module decodes
//! and validates that document; it owns no serialization format beyond the
//! JSON shape itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::MetadataError;

/// Bin grid size used when the metadata document omits one.
pub const DEFAULT_TILE_SIZE: usize = 256;

fn default_tile_size() -> usize {
    DEFAULT_TILE_SIZE
}

/// Per-level aggregate statistics carried in the metadata's `meta` block.
///
/// Keys are decimal level numbers; the document producer writes them as
/// strings, so they stay strings here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelExtrema {
    #[serde(default)]
    pub level_minimums: BTreeMap<String, f64>,

    #[serde(default)]
    pub level_maximums: BTreeMap<String, f64>,
}

/// Decoded description of one pyramid.
///
/// Used to size caches, validate the cache's element type against the data,
/// and interpret bin windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PyramidMetadata {
    /// Pyramid name (usually the layer id)
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Bins per tile along x
    #[serde(default = "default_tile_size")]
    pub tile_size_x: usize,

    /// Bins per tile along y
    #[serde(default = "default_tile_size")]
    pub tile_size_y: usize,

    /// Shallowest binned level
    #[serde(default)]
    pub min_zoom: u32,

    /// Deepest binned level
    pub max_zoom: u32,

    /// Tiling scheme tag, e.g. "TMS"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projection: Option<String>,

    /// Data-space bounds as `[min_x, min_y, max_x, max_y]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<[f64; 4]>,

    /// Element-type tag of the bin values, e.g. "double" or "[double]"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_type: Option<String>,

    #[serde(default)]
    pub meta: LevelExtrema,
}

impl PyramidMetadata {
    /// Decode and validate a metadata document.
    ///
    /// # Errors
    ///
    /// Fails on malformed JSON, an inverted zoom range, or a zero-sized bin
    /// grid.
    pub fn from_json(raw: &str) -> Result<Self, MetadataError> {
        let metadata: PyramidMetadata = serde_json::from_str(raw)?;
        metadata.validate()?;
        Ok(metadata)
    }

    fn validate(&self) -> Result<(), MetadataError> {
        if self.min_zoom > self.max_zoom {
            return Err(MetadataError::InvalidZoomRange {
                min: self.min_zoom,
                max: self.max_zoom,
            });
        }
        if self.tile_size_x == 0 || self.tile_size_y == 0 {
            return Err(MetadataError::InvalidGridSize {
                x_bins: self.tile_size_x,
                y_bins: self.tile_size_y,
            });
        }
        Ok(())
    }

    /// Number of binned levels.
    pub fn level_count(&self) -> u32 {
        self.max_zoom - self.min_zoom + 1
    }

    /// Whether `level` falls inside the binned zoom range.
    pub fn has_level(&self, level: u32) -> bool {
        (self.min_zoom..=self.max_zoom).contains(&level)
    }

    /// Minimum and maximum bin value recorded for a level.
    ///
    /// Returns `None` when the document carries no extrema for that level.
    pub fn level_extrema(&self, level: u32) -> Option<(f64, f64)> {
        let key = level.to_string();
        let min = self.meta.level_minimums.get(&key)?;
        let max = self.meta.level_maximums.get(&key)?;
        Some((*min, *max))
    }
}

// =============================================================================
// Tests
// =============================================================================
