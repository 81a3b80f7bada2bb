//! In-memory raster snapshots exchanged with the simulation.

use crate::error::{GridError, GridResult};

/// A single 2-D field at one timestep.
///
/// Values are stored row-major (row 0 is the northern row). No-data cells are
/// represented as NaN; conversion to and from a numeric missing-value sentinel
/// happens at the file boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Raster {
    /// Create a raster from row-major data.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> GridResult<Self> {
        if data.len() != rows * cols {
            return Err(GridError::InvalidGrid(format!(
                "raster of {}x{} needs {} values, got {}",
                rows,
                cols,
                rows * cols,
                data.len()
            )));
        }
        Ok(Self { rows, cols, data })
    }

    /// A raster filled with zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    /// A raster filled with a constant.
    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Build a raster from nested rows, e.g. `[[1.0, 2.0], [3.0, 4.0]]`.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> GridResult<Self> {
        let cols = rows.first().map(|r| r.as_ref().len()).unwrap_or(0);
        let mut data = Vec::with_capacity(rows.len() * cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != cols {
                return Err(GridError::InvalidGrid(format!(
                    "ragged raster rows: expected {} columns, got {}",
                    cols,
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Self::new(rows.len(), cols, data)
    }

    /// Rebuild a raster from a file array, mapping the sentinel back to NaN.
    pub fn from_filled(rows: usize, cols: usize, values: &[f64], missing: f64) -> GridResult<Self> {
        let data = values
            .iter()
            .map(|&v| if is_missing(v, missing) { f64::NAN } else { v })
            .collect();
        Self::new(rows, cols, data)
    }

    /// Export the raster as a plain numeric array with NaN replaced by the sentinel.
    pub fn to_filled(&self, missing: f64) -> Vec<f64> {
        self.data
            .iter()
            .map(|&v| if v.is_nan() { missing } else { v })
            .collect()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    /// Value at (row, col), or `None` when out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(self.data[row * self.cols + col])
    }

    /// Ensure this raster matches an expected shape.
    pub fn check_shape(&self, rows: usize, cols: usize) -> GridResult<()> {
        if self.rows != rows || self.cols != cols {
            return Err(GridError::ShapeMismatch {
                expected_rows: rows,
                expected_cols: cols,
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }
}

fn is_missing(value: f64, missing: f64) -> bool {
    value.is_nan() || value == missing || (value as f32) == (missing as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows() {
        let raster = Raster::from_rows(&[[1.0, 2.0], [3.0, 4.0]]).unwrap();
        assert_eq!(raster.shape(), (2, 2));
        assert_eq!(raster.get(1, 0), Some(3.0));
        assert_eq!(raster.get(2, 0), None);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let rows: Vec<Vec<f64>> = vec![vec![1.0, 2.0], vec![3.0]];
        assert!(Raster::from_rows(&rows).is_err());
    }

    #[test]
    fn test_missing_sentinel_conversion() {
        let raster = Raster::new(1, 3, vec![1.0, f64::NAN, 3.0]).unwrap();
        let filled = raster.to_filled(-9999.0);
        assert_eq!(filled, vec![1.0, -9999.0, 3.0]);

        let back = Raster::from_filled(1, 3, &filled, -9999.0).unwrap();
        assert_eq!(back.get(0, 0), Some(1.0));
        assert!(back.get(0, 1).unwrap().is_nan());
    }

    #[test]
    fn test_shape_check() {
        let raster = Raster::zeros(2, 3);
        assert!(raster.check_shape(2, 3).is_ok());
        assert!(matches!(
            raster.check_shape(3, 2),
            Err(GridError::ShapeMismatch { .. })
        ));
    }
}
