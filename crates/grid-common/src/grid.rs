//! Spatial grid descriptors for simulation rasters.

use serde::{Deserialize, Serialize};

use crate::crs::EpsgCode;
use crate::error::{GridError, GridResult};

/// Specification of a regular north-up raster grid.
///
/// `west` and `north` are the outer edges of the grid, so cell centres sit
/// half a cell inside them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialGrid {
    /// Number of rows (y direction, north to south)
    pub rows: usize,
    /// Number of columns (x direction, west to east)
    pub cols: usize,
    /// Cell size in CRS units (degrees or meters)
    pub cellsize: f64,
    /// Western edge of the grid
    pub west: f64,
    /// Northern edge of the grid
    pub north: f64,
    /// Native coordinate reference system
    #[serde(default)]
    pub crs: EpsgCode,
}

impl SpatialGrid {
    /// Create a new grid, rejecting empty or degenerate definitions.
    pub fn new(
        rows: usize,
        cols: usize,
        cellsize: f64,
        west: f64,
        north: f64,
        crs: EpsgCode,
    ) -> GridResult<Self> {
        if rows == 0 || cols == 0 {
            return Err(GridError::InvalidGrid(format!(
                "grid must have at least one cell, got {}x{}",
                rows, cols
            )));
        }
        if !(cellsize.is_finite() && cellsize > 0.0) {
            return Err(GridError::InvalidGrid(format!(
                "cellsize must be positive, got {}",
                cellsize
            )));
        }

        Ok(Self {
            rows,
            cols,
            cellsize,
            west,
            north,
            crs,
        })
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    /// X coordinates of the cell centres, west to east.
    pub fn x_coords(&self) -> Vec<f64> {
        (0..self.cols)
            .map(|c| self.west + (c as f64 + 0.5) * self.cellsize)
            .collect()
    }

    /// Y coordinates of the cell centres, north to south.
    pub fn y_coords(&self) -> Vec<f64> {
        (0..self.rows)
            .map(|r| self.north - (r as f64 + 0.5) * self.cellsize)
            .collect()
    }

    /// Eastern edge of the grid.
    pub fn east(&self) -> f64 {
        self.west + self.cols as f64 * self.cellsize
    }

    /// Southern edge of the grid.
    pub fn south(&self) -> f64 {
        self.north - self.rows as f64 * self.cellsize
    }
}
