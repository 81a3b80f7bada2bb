//! Raster generators for creating synthetic simulation output.
//!
//! These generators create predictable, verifiable test data patterns
//! that can be used across the test suite.

use grid_common::Raster;

/// Creates a test raster with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// This makes it easy to verify that data is being read/written correctly
/// by checking that raster[row][col] == col * 1000 + row.
///
/// # Example
///
/// ```
/// use test_utils::create_test_raster;
///
/// let raster = create_test_raster(5, 10);
/// assert_eq!(raster.get(0, 1), Some(1000.0));
/// assert_eq!(raster.get(1, 0), Some(1.0));
/// ```
pub fn create_test_raster(rows: usize, cols: usize) -> Raster {
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            data.push((col * 1000 + row) as f64);
        }
    }
    raster(rows, cols, data)
}

/// Creates the raster a simulation would emit at `timestep` (1-based).
///
/// Cells count up from `(timestep - 1) * rows * cols + 1`, so a 2x2 grid
/// yields `[[1,2],[3,4]]` at step 1 and `[[5,6],[7,8]]` at step 2. Every
/// value across a run is unique, which exposes slices landing at the wrong
/// time offset.
pub fn create_sequence_raster(rows: usize, cols: usize, timestep: usize) -> Raster {
    let base = timestep.saturating_sub(1) * rows * cols;
    let data = (0..rows * cols).map(|i| (base + i + 1) as f64).collect();
    raster(rows, cols, data)
}

/// Creates a precipitation-like raster in mm.
///
/// Uses a simple hash-based approach for reproducibility. Most values are 0,
/// some are up to 50 mm.
pub fn create_precipitation_raster(rows: usize, cols: usize, seed: u32) -> Raster {
    let mut data = Vec::with_capacity(rows * cols);
    for row in 0..rows {
        for col in 0..cols {
            // Simple deterministic pseudo-random
            let hash = simple_hash(col as u32, row as u32, seed);
            let precip = if hash % 4 == 0 {
                (hash % 5000) as f64 / 100.0
            } else {
                0.0
            };
            data.push(precip);
        }
    }
    raster(rows, cols, data)
}

/// Creates a raster with NaN (no-data) at the given `(row, col)` positions,
/// `value` elsewhere.
pub fn create_raster_with_nans(
    rows: usize,
    cols: usize,
    value: f64,
    nan_positions: &[(usize, usize)],
) -> Raster {
    let mut data = vec![value; rows * cols];
    for &(row, col) in nan_positions {
        if row < rows && col < cols {
            data[row * cols + col] = f64::NAN;
        }
    }
    raster(rows, cols, data)
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}

fn raster(rows: usize, cols: usize, data: Vec<f64>) -> Raster {
    Raster::new(rows, cols, data).expect("generator produced a consistent raster")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_test_raster() {
        let r = create_test_raster(3, 4);
        assert_eq!(r.shape(), (3, 4));
        assert_eq!(r.get(2, 3), Some(3002.0));
    }

    #[test]
    fn test_sequence_raster_values() {
        let r = create_sequence_raster(2, 2, 2);
        assert_eq!(r.data(), &[5.0, 6.0, 7.0, 8.0]);
        let r = create_sequence_raster(2, 2, 1);
        assert_eq!(r.data(), &[1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_precipitation_is_deterministic() {
        let a = create_precipitation_raster(10, 10, 42);
        let b = create_precipitation_raster(10, 10, 42);
        assert_eq!(a, b);
        assert!(a.data().iter().all(|&v| (0.0..50.0).contains(&v)));
    }

    #[test]
    fn test_raster_with_nans() {
        let r = create_raster_with_nans(2, 3, 1.5, &[(1, 2), (5, 5)]);
        assert!(r.get(1, 2).unwrap().is_nan());
        assert_eq!(r.get(0, 0), Some(1.5));
        assert_eq!(r.data().iter().filter(|v| v.is_nan()).count(), 1);
    }
}
