//! Common types shared across the gridstream crates.

pub mod crs;
pub mod error;
pub mod grid;
pub mod raster;
pub mod time;

pub use crs::EpsgCode;
pub use error::{GridError, GridResult};
pub use grid::SpatialGrid;
pub use raster::Raster;
pub use time::{Calendar, TimeAxis, TimeUnit, TimeUnits};
