//! Error types for grid-file streaming.

use std::path::PathBuf;

use grid_common::GridError;
use projection::ProjectionError;
use thiserror::Error;

/// Result type for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;

/// Error types for reading and writing grid files.
#[derive(Error, Debug)]
pub enum StreamError {
    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error raised by the NetCDF library
    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    Netcdf(#[from] netcdf::Error),

    /// Invalid grid, raster or time definition
    #[error(transparent)]
    Grid(#[from] GridError),

    /// CRS resolution or coordinate transform failure
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    /// Input file does not exist
    #[error("input file not found: {}", .0.display())]
    MissingInput(PathBuf),

    /// Timestep outside the time axis
    #[error("timestep {timestep} outside 1..={count}")]
    TimestepOutOfRange { timestep: usize, count: usize },

    /// Read before the start of the current window
    #[error("timestep {timestep} precedes the read window starting at step {window_start}")]
    BackwardRead { timestep: usize, window_start: usize },

    /// Raster does not match the grid of the stream
    #[error("raster for '{variable}' is {rows}x{cols}, stream grid is {expected_rows}x{expected_cols}")]
    ShapeMismatch {
        variable: String,
        expected_rows: usize,
        expected_cols: usize,
        rows: usize,
        cols: usize,
    },

    /// Missing required variable, dimension or attribute
    #[error("Missing required data: {0}")]
    MissingData(String),

    /// Invalid data layout in a file
    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Metadata document could not be parsed
    #[error("invalid metadata: {0}")]
    Metadata(#[from] serde_json::Error),

    /// Operation on a stream whose handle was already released
    #[error("stream already finished")]
    Finished,
}
