//! Tile grid lookup tables
//!
//! Maps a named resolution to the tile counts and pixel sizes GIBS
//! serves for each projection. These are fixed tables taken from the
//! GIBS tile matrix sets; nothing here is computed dynamically beyond
//! linear interpolation of per-tile windows.

use crate::catalog::{Extent, Projection};
use crate::error::{DatagenError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Edge length of every GIBS tile, in pixels
pub const TILE_SIZE: u32 = 512;

/// Named imagery resolutions, coarsest to finest
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Resolution {
    #[serde(rename = "8km")]
    R8km,
    #[serde(rename = "4km")]
    R4km,
    #[serde(rename = "2km")]
    R2km,
    #[serde(rename = "1km")]
    R1km,
    #[serde(rename = "500m")]
    R500m,
    #[serde(rename = "250m")]
    R250m,
}

impl Resolution {
    /// All resolutions, coarsest first
    pub fn all() -> [Resolution; 6] {
        [
            Self::R8km,
            Self::R4km,
            Self::R2km,
            Self::R1km,
            Self::R500m,
            Self::R250m,
        ]
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::R8km => "8km",
            Self::R4km => "4km",
            Self::R2km => "2km",
            Self::R1km => "1km",
            Self::R500m => "500m",
            Self::R250m => "250m",
        };
        f.write_str(name)
    }
}

impl FromStr for Resolution {
    type Err = DatagenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "8km" => Ok(Self::R8km),
            "4km" => Ok(Self::R4km),
            "2km" => Ok(Self::R2km),
            "1km" => Ok(Self::R1km),
            "500m" => Ok(Self::R500m),
            "250m" => Ok(Self::R250m),
            _ => Err(DatagenError::catalog(format!(
                "Unknown resolution '{}'. Supported: 8km, 4km, 2km, 1km, 500m, 250m",
                s
            ))),
        }
    }
}

/// Tile grid for one (projection, resolution) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub projection: Projection,
    pub resolution: Resolution,
    /// Tile level in the service's tile matrix set
    pub level: u8,
    /// Tile columns across the projection extent
    pub cols: u32,
    /// Tile rows down the projection extent
    pub rows: u32,
    /// Per-tile edge length in pixels
    pub tile_size: u32,
}

impl TileGrid {
    /// Look up the grid for a resolution under a projection
    pub fn for_resolution(projection: Projection, resolution: Resolution) -> Self {
        let (level, cols, rows) = match projection {
            Projection::Geographic => match resolution {
                Resolution::R8km => (3, 10, 5),
                Resolution::R4km => (4, 20, 10),
                Resolution::R2km => (5, 40, 20),
                Resolution::R1km => (6, 80, 40),
                Resolution::R500m => (7, 160, 80),
                Resolution::R250m => (8, 320, 160),
            },
            Projection::Arctic | Projection::Antarctic => match resolution {
                Resolution::R8km => (0, 2, 2),
                Resolution::R4km => (1, 4, 4),
                Resolution::R2km => (2, 8, 8),
                Resolution::R1km => (3, 16, 16),
                Resolution::R500m => (4, 32, 32),
                Resolution::R250m => (5, 64, 64),
            },
            Projection::WebMercator => match resolution {
                Resolution::R8km => (4, 16, 16),
                Resolution::R4km => (5, 32, 32),
                Resolution::R2km => (6, 64, 64),
                Resolution::R1km => (7, 128, 128),
                Resolution::R500m => (8, 256, 256),
                Resolution::R250m => (9, 512, 512),
            },
        };
        Self {
            projection,
            resolution,
            level,
            cols,
            rows,
            tile_size: TILE_SIZE,
        }
    }

    /// Tile matrix set identifier used in GIBS request URLs
    pub fn tile_matrix_set(&self) -> String {
        match self.projection {
            Projection::WebMercator => format!("GoogleMapsCompatible_Level{}", self.level),
            _ => self.resolution.to_string(),
        }
    }

    /// Full-image pixel width over the projection extent
    pub fn image_width(&self) -> u32 {
        self.cols * self.tile_size
    }

    /// Full-image pixel height over the projection extent
    pub fn image_height(&self) -> u32 {
        self.rows * self.tile_size
    }

    /// Total number of tiles in the grid
    pub fn tile_count(&self) -> u64 {
        u64::from(self.cols) * u64::from(self.rows)
    }

    /// Iterate tile positions in row-major order
    pub fn tiles(&self) -> impl Iterator<Item = (u32, u32)> {
        let cols = self.cols;
        (0..self.rows).flat_map(move |row| (0..cols).map(move |col| (row, col)))
    }

    /// Projection-space window of one tile, interpolated over the
    /// projection's true extent
    pub fn tile_window(&self, row: u32, col: u32) -> Extent {
        let full = self.projection.extent();
        let width = (full.lrx - full.ulx) / f64::from(self.cols);
        let height = (full.lry - full.uly) / f64::from(self.rows);
        Extent {
            ulx: full.ulx + f64::from(col) * width,
            uly: full.uly + f64::from(row) * height,
            lrx: full.ulx + f64::from(col + 1) * width,
            lry: full.uly + f64::from(row + 1) * height,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_parse_roundtrip() {
        for res in Resolution::all() {
            assert_eq!(res.to_string().parse::<Resolution>().unwrap(), res);
        }
        assert!("16km".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_resolution_ordering_coarse_to_fine() {
        assert!(Resolution::R8km < Resolution::R250m);
        assert!(Resolution::R500m < Resolution::R250m);
        assert!(Resolution::R2km > Resolution::R4km);
    }

    #[test]
    fn test_geographic_grid_table() {
        let grid = TileGrid::for_resolution(Projection::Geographic, Resolution::R250m);
        assert_eq!(grid.level, 8);
        assert_eq!((grid.cols, grid.rows), (320, 160));
        assert_eq!(grid.image_width(), 163_840);
        assert_eq!(grid.image_height(), 81_920);
        assert_eq!(grid.tile_matrix_set(), "250m");
    }

    #[test]
    fn test_mercator_matrix_set_name() {
        let grid = TileGrid::for_resolution(Projection::WebMercator, Resolution::R2km);
        assert_eq!(grid.tile_matrix_set(), "GoogleMapsCompatible_Level6");
        assert_eq!(grid.cols, grid.rows);
    }

    #[test]
    fn test_tiles_row_major_and_exact_count() {
        let grid = TileGrid::for_resolution(Projection::Geographic, Resolution::R8km);
        let tiles: Vec<(u32, u32)> = grid.tiles().collect();
        assert_eq!(tiles.len() as u64, grid.tile_count());
        assert_eq!(tiles[0], (0, 0));
        assert_eq!(tiles[1], (0, 1));
        assert_eq!(tiles[grid.cols as usize], (1, 0));
        assert_eq!(*tiles.last().unwrap(), (grid.rows - 1, grid.cols - 1));
    }

    #[test]
    fn test_tile_windows_partition_extent() {
        let grid = TileGrid::for_resolution(Projection::Geographic, Resolution::R8km);
        let full = Projection::Geographic.extent();

        let first = grid.tile_window(0, 0);
        assert_eq!(first.ulx, full.ulx);
        assert_eq!(first.uly, full.uly);

        let last = grid.tile_window(grid.rows - 1, grid.cols - 1);
        assert!((last.lrx - full.lrx).abs() < 1e-9);
        assert!((last.lry - full.lry).abs() < 1e-9);

        // adjacent tiles share an edge
        let right = grid.tile_window(0, 1);
        assert!((first.lrx - right.ulx).abs() < 1e-9);
    }

    #[test]
    fn test_polar_windows_are_square() {
        let grid = TileGrid::for_resolution(Projection::Arctic, Resolution::R1km);
        let w = grid.tile_window(3, 7);
        assert!(((w.lrx - w.ulx) - (w.uly - w.lry)).abs() < 1e-6);
    }
}
