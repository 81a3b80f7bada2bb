//! Error types for CRS resolution and coordinate transforms.

use grid_common::GridError;
use thiserror::Error;

/// Result type for projection operations.
pub type ProjectionResult<T> = Result<T, ProjectionError>;

#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The identifier could not be parsed at all
    #[error("invalid CRS identifier: {0}")]
    InvalidIdentifier(#[from] GridError),

    /// The EPSG code is well-formed but not in the registry
    #[error("EPSG code not supported: EPSG:{0}")]
    UnsupportedEpsg(u32),

    /// Coordinate arrays passed to a transform differ in length
    #[error("coordinate length mismatch: {xs} x values vs {ys} y values")]
    LengthMismatch { xs: usize, ys: usize },

    /// A coordinate fell outside the domain of the projection
    #[error("coordinate out of projection domain: ({x}, {y})")]
    OutOfDomain { x: f64, y: f64 },
}
