//! Coordinate reference system resolution and transformations.
//!
//! Implements the map projections needed for simulation grids from scratch
//! without external dependencies: transverse Mercator (UTM zones) and
//! spherical Web Mercator, plus an EPSG registry for the codes we support.

pub mod ellipsoid;
pub mod epsg;
pub mod error;
pub mod resolver;
pub mod transform;
pub mod transverse_mercator;
pub mod web_mercator;

pub use ellipsoid::Ellipsoid;
pub use epsg::{CrsDefinition, ProjectionKind};
pub use error::{ProjectionError, ProjectionResult};
pub use resolver::{CoordinateAxes, CoordinateResolver};
pub use transform::{BuiltinTransform, CoordinateTransform};
pub use transverse_mercator::TransverseMercator;
pub use web_mercator::WebMercator;
