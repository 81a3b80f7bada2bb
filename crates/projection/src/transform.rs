//! Coordinate transformation between supported systems.

use crate::epsg::{CrsDefinition, ProjectionKind};
use crate::error::{ProjectionError, ProjectionResult};
use crate::transverse_mercator::TransverseMercator;
use crate::web_mercator::WebMercator;

/// Transforms coordinate arrays from one CRS into another.
///
/// Implementations receive parallel x/y arrays (longitude/latitude for
/// geographic systems) and return arrays of the same length.
pub trait CoordinateTransform {
    fn transform(
        &self,
        src: &CrsDefinition,
        dst: &CrsDefinition,
        xs: &[f64],
        ys: &[f64],
    ) -> ProjectionResult<(Vec<f64>, Vec<f64>)>;
}

/// Pure-Rust transform for the built-in registry.
///
/// Every conversion goes through geographic coordinates. Datum shifts are
/// ignored: WGS84, ETRS89 and NAD83 are treated as coincident, which holds to
/// about a metre.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinTransform;

impl BuiltinTransform {
    fn to_geographic(def: &CrsDefinition, x: f64, y: f64) -> ProjectionResult<(f64, f64)> {
        let (lon, lat) = match def.kind {
            ProjectionKind::Geographic => (x, y),
            ProjectionKind::Utm { zone, north } => {
                TransverseMercator::utm(zone, north, def.ellipsoid).to_geographic(x, y)
            }
            ProjectionKind::WebMercator => WebMercator::new().to_geographic(x, y),
        };
        if lon.is_finite() && lat.is_finite() {
            Ok((lon, lat))
        } else {
            Err(ProjectionError::OutOfDomain { x, y })
        }
    }

    fn from_geographic(def: &CrsDefinition, lon: f64, lat: f64) -> ProjectionResult<(f64, f64)> {
        let projected = match def.kind {
            ProjectionKind::Geographic => Some((lon, lat)),
            ProjectionKind::Utm { zone, north } => {
                Some(TransverseMercator::utm(zone, north, def.ellipsoid).from_geographic(lon, lat))
            }
            ProjectionKind::WebMercator => WebMercator::new().from_geographic(lon, lat),
        };
        match projected {
            Some((x, y)) if x.is_finite() && y.is_finite() => Ok((x, y)),
            _ => Err(ProjectionError::OutOfDomain { x: lon, y: lat }),
        }
    }
}

impl CoordinateTransform for BuiltinTransform {
    fn transform(
        &self,
        src: &CrsDefinition,
        dst: &CrsDefinition,
        xs: &[f64],
        ys: &[f64],
    ) -> ProjectionResult<(Vec<f64>, Vec<f64>)> {
        if xs.len() != ys.len() {
            return Err(ProjectionError::LengthMismatch {
                xs: xs.len(),
                ys: ys.len(),
            });
        }

        let mut out_x = Vec::with_capacity(xs.len());
        let mut out_y = Vec::with_capacity(ys.len());
        for (&x, &y) in xs.iter().zip(ys) {
            let (lon, lat) = Self::to_geographic(src, x, y)?;
            let (tx, ty) = Self::from_geographic(dst, lon, lat)?;
            out_x.push(tx);
            out_y.push(ty);
        }
        Ok((out_x, out_y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_common::EpsgCode;

    #[test]
    fn test_utm_to_wgs84() {
        let utm = CrsDefinition::resolve(EpsgCode::new(32631)).unwrap();
        let (lon, lat) = BuiltinTransform
            .transform(&utm, &CrsDefinition::wgs84(), &[500_000.0], &[0.0])
            .unwrap();
        assert!((lon[0] - 3.0).abs() < 1e-9);
        assert!(lat[0].abs() < 1e-9);
    }

    #[test]
    fn test_between_projected_systems() {
        let utm = CrsDefinition::resolve(EpsgCode::new(32631)).unwrap();
        let merc = CrsDefinition::resolve(EpsgCode::new(3857)).unwrap();
        let (x, y) = BuiltinTransform
            .transform(&utm, &merc, &[500_000.0], &[0.0])
            .unwrap();
        let expected_x = 6378137.0 * 3.0_f64.to_radians();
        assert!((x[0] - expected_x).abs() < 1e-3);
        assert!(y[0].abs() < 1e-3);
    }

    #[test]
    fn test_length_mismatch() {
        let wgs = CrsDefinition::wgs84();
        assert!(matches!(
            BuiltinTransform.transform(&wgs, &wgs, &[1.0, 2.0], &[1.0]),
            Err(ProjectionError::LengthMismatch { xs: 2, ys: 1 })
        ));
    }

    #[test]
    fn test_pole_to_web_mercator_out_of_domain() {
        let merc = CrsDefinition::resolve(EpsgCode::new(3857)).unwrap();
        let result = BuiltinTransform.transform(&CrsDefinition::wgs84(), &merc, &[0.0], &[90.0]);
        assert!(matches!(result, Err(ProjectionError::OutOfDomain { .. })));
    }
}
