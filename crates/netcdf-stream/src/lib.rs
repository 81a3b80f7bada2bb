//! Buffered time-series streams over CF-1.4 grid files.
//!
//! A simulation writes one raster per timestep per variable through a
//! [`TimestepWriter`], which buffers a block of timesteps in memory and appends
//! it to the file in one call. Forcing input is read back through a
//! [`BlockReader`], which prefetches a window of timesteps per variable, or a
//! [`StaticReader`] for direct positional reads.
//!
//! # File layout
//!
//! ```text
//! dimensions: time (unlimited), lat, lon          (geographic grids)
//!             time (unlimited), y, x              (projected grids)
//! variables:  time(time), lat, lon, [y, x], crs, <data>(time, lat|y, lon|x)
//! ```
//!
//! Storage goes through the [`GridDataset`] trait. With the `netcdf` feature
//! (default) [`NetcdfDataset`] writes real NetCDF-4 files; [`MemoryDataset`]
//! keeps everything in process.

pub mod config;
pub mod dataset;
pub mod error;
pub mod initializer;
pub mod memory;
pub mod metadata;
pub mod reader;
pub mod writer;

#[cfg(feature = "netcdf")]
pub mod native;

pub use config::{FileFormat, ReaderConfig, StreamConfig};
pub use dataset::{AttrValue, GridDataset, ValueKind, VariableSpec};
pub use error::{StreamError, StreamResult};
pub use initializer::GridFileInitializer;
pub use memory::{MemoryDataset, PutRecord};
pub use metadata::GlobalMetadata;
pub use reader::{BlockReader, GridSlice, StaticReader, WindowStats};
pub use writer::{FinishReport, TimestepWriter, WriteMode};

#[cfg(feature = "netcdf")]
pub use native::{silence_hdf5_errors, NetcdfDataset};
