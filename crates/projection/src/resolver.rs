//! Coordinate axes for grid files.
//!
//! Turns a grid's native CRS and cell-centre coordinates into the axes a CF
//! file needs: plain 1-D lat/lon for geographic grids, or 1-D x/y plus full
//! 2-D lat/lon fields for projected grids.

use grid_common::EpsgCode;
use tracing::{debug, error};

use crate::epsg::CrsDefinition;
use crate::error::ProjectionResult;
use crate::transform::{BuiltinTransform, CoordinateTransform};

/// Coordinate variables for one grid.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinateAxes {
    Geographic {
        lat: Vec<f64>,
        lon: Vec<f64>,
    },
    Projected {
        y: Vec<f64>,
        x: Vec<f64>,
        /// Row-major `rows × cols` latitude field
        lat: Vec<f64>,
        /// Row-major `rows × cols` longitude field
        lon: Vec<f64>,
    },
}

impl CoordinateAxes {
    pub fn is_projected(&self) -> bool {
        matches!(self, Self::Projected { .. })
    }

    /// Grid shape `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        match self {
            Self::Geographic { lat, lon } => (lat.len(), lon.len()),
            Self::Projected { y, x, .. } => (y.len(), x.len()),
        }
    }

    /// Names of the spatial dimensions, row axis first.
    pub fn dimension_names(&self) -> [&'static str; 2] {
        match self {
            Self::Geographic { .. } => ["lat", "lon"],
            Self::Projected { .. } => ["y", "x"],
        }
    }
}

/// Resolves CRS identifiers and builds coordinate axes.
pub struct CoordinateResolver<T: CoordinateTransform = BuiltinTransform> {
    transform: T,
    target: CrsDefinition,
}

impl Default for CoordinateResolver<BuiltinTransform> {
    fn default() -> Self {
        Self::new(BuiltinTransform)
    }
}

impl<T: CoordinateTransform> CoordinateResolver<T> {
    /// Create a resolver that projects to WGS84 with the given transform.
    pub fn new(transform: T) -> Self {
        Self {
            transform,
            target: CrsDefinition::wgs84(),
        }
    }

    /// Parse and resolve a CRS identifier such as `"EPSG:32631"`.
    pub fn definition(&self, crs_id: &str) -> ProjectionResult<CrsDefinition> {
        let result = EpsgCode::parse(crs_id)
            .map_err(Into::into)
            .and_then(CrsDefinition::resolve);

        if let Err(e) = &result {
            error!(crs = %crs_id, error = %e, "Failed to resolve CRS");
        }
        result
    }

    /// Build coordinate axes for cell centres `xs` (columns) and `ys` (rows).
    ///
    /// For projected systems the full meshgrid is transformed in one call.
    pub fn resolve(&self, crs_id: &str, xs: &[f64], ys: &[f64]) -> ProjectionResult<CoordinateAxes> {
        let definition = self.definition(crs_id)?;
        self.axes_for(&definition, xs, ys)
    }

    /// Build coordinate axes for an already resolved definition.
    pub fn axes_for(
        &self,
        definition: &CrsDefinition,
        xs: &[f64],
        ys: &[f64],
    ) -> ProjectionResult<CoordinateAxes> {
        if !definition.is_projected() {
            return Ok(CoordinateAxes::Geographic {
                lat: ys.to_vec(),
                lon: xs.to_vec(),
            });
        }

        let (mesh_x, mesh_y) = meshgrid(xs, ys);
        let (lon, lat) = self
            .transform
            .transform(definition, &self.target, &mesh_x, &mesh_y)
            .map_err(|e| {
                error!(crs = %definition.epsg, error = %e, "Coordinate transform failed");
                e
            })?;

        debug!(
            crs = %definition.epsg,
            rows = ys.len(),
            cols = xs.len(),
            "Computed lat/lon fields for projected grid"
        );

        Ok(CoordinateAxes::Projected {
            y: ys.to_vec(),
            x: xs.to_vec(),
            lat,
            lon,
        })
    }
}

/// Row-major meshgrid of `xs` (varying fastest) and `ys`.
fn meshgrid(xs: &[f64], ys: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let n = xs.len() * ys.len();
    let mut mesh_x = Vec::with_capacity(n);
    let mut mesh_y = Vec::with_capacity(n);
    for &y in ys {
        for &x in xs {
            mesh_x.push(x);
            mesh_y.push(y);
        }
    }
    (mesh_x, mesh_y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProjectionError;

    #[test]
    fn test_meshgrid_is_row_major() {
        let (mx, my) = meshgrid(&[1.0, 2.0, 3.0], &[10.0, 20.0]);
        assert_eq!(mx, vec![1.0, 2.0, 3.0, 1.0, 2.0, 3.0]);
        assert_eq!(my, vec![10.0, 10.0, 10.0, 20.0, 20.0, 20.0]);
    }

    #[test]
    fn test_geographic_axes_pass_through() {
        let resolver = CoordinateResolver::default();
        let axes = resolver
            .resolve("EPSG:4326", &[4.25, 4.75], &[52.25, 51.75])
            .unwrap();
        assert_eq!(
            axes,
            CoordinateAxes::Geographic {
                lat: vec![52.25, 51.75],
                lon: vec![4.25, 4.75],
            }
        );
        assert_eq!(axes.dimension_names(), ["lat", "lon"]);
    }

    #[test]
    fn test_invalid_identifier() {
        let resolver = CoordinateResolver::default();
        assert!(matches!(
            resolver.definition("not-a-crs"),
            Err(ProjectionError::InvalidIdentifier(_))
        ));
        assert!(matches!(
            resolver.definition("EPSG:99999"),
            Err(ProjectionError::UnsupportedEpsg(99999))
        ));
    }

    struct FailingTransform;

    impl CoordinateTransform for FailingTransform {
        fn transform(
            &self,
            _src: &CrsDefinition,
            _dst: &CrsDefinition,
            _xs: &[f64],
            _ys: &[f64],
        ) -> ProjectionResult<(Vec<f64>, Vec<f64>)> {
            Err(ProjectionError::OutOfDomain { x: 0.0, y: 0.0 })
        }
    }

    #[test]
    fn test_transform_failure_propagates() {
        let resolver = CoordinateResolver::new(FailingTransform);
        assert!(resolver.resolve("EPSG:32631", &[500_000.0], &[0.0]).is_err());
        // Geographic grids never call the transform
        assert!(resolver.resolve("EPSG:4326", &[3.0], &[0.0]).is_ok());
    }
}
