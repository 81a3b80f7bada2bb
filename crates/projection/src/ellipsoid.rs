//! Reference ellipsoids.

/// A reference ellipsoid defined by its semi-major axis and inverse flattening.
///
/// An inverse flattening of zero denotes a sphere, matching the convention
/// used in CF `grid_mapping` attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Short name used in proj4 strings ("WGS84", "GRS80")
    pub name: &'static str,
    /// Semi-major axis (meters)
    pub semi_major: f64,
    /// Inverse flattening (1/f), zero for a sphere
    pub inverse_flattening: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        name: "WGS84",
        semi_major: 6378137.0,
        inverse_flattening: 298.257223563,
    };

    pub const GRS80: Ellipsoid = Ellipsoid {
        name: "GRS80",
        semi_major: 6378137.0,
        inverse_flattening: 298.257222101,
    };

    /// Sphere with the WGS84 equatorial radius (Web Mercator).
    pub const WEB_SPHERE: Ellipsoid = Ellipsoid {
        name: "sphere",
        semi_major: 6378137.0,
        inverse_flattening: 0.0,
    };

    /// Flattening f.
    pub fn flattening(&self) -> f64 {
        if self.inverse_flattening == 0.0 {
            0.0
        } else {
            1.0 / self.inverse_flattening
        }
    }

    /// Semi-minor axis (meters).
    pub fn semi_minor(&self) -> f64 {
        self.semi_major * (1.0 - self.flattening())
    }

    /// First eccentricity e.
    pub fn eccentricity(&self) -> f64 {
        let f = self.flattening();
        (f * (2.0 - f)).sqrt()
    }

    /// Third flattening n = f / (2 - f).
    pub fn third_flattening(&self) -> f64 {
        let f = self.flattening();
        f / (2.0 - f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wgs84_semi_minor() {
        assert!((Ellipsoid::WGS84.semi_minor() - 6356752.314245).abs() < 1e-3);
    }

    #[test]
    fn test_sphere_has_no_flattening() {
        assert_eq!(Ellipsoid::WEB_SPHERE.flattening(), 0.0);
        assert_eq!(Ellipsoid::WEB_SPHERE.eccentricity(), 0.0);
        assert_eq!(Ellipsoid::WEB_SPHERE.semi_minor(), 6378137.0);
    }
}
