//! Error types for the shared grid model.

use thiserror::Error;

/// Result type alias using GridError.
pub type GridResult<T> = Result<T, GridError>;

/// Errors raised while building or validating grid model values.
#[derive(Debug, Error)]
pub enum GridError {
    #[error("Invalid CRS identifier: {0}")]
    InvalidCrs(String),

    #[error("Invalid grid definition: {0}")]
    InvalidGrid(String),

    #[error("Raster shape mismatch: expected {expected_rows}x{expected_cols}, got {rows}x{cols}")]
    ShapeMismatch {
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Invalid time units '{units}': {message}")]
    InvalidTimeUnits { units: String, message: String },

    #[error("Unsupported calendar: {0}")]
    UnsupportedCalendar(String),
}
