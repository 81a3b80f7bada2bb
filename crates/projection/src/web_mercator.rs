//! Spherical Web Mercator (EPSG:3857).

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use crate::ellipsoid::Ellipsoid;

/// Latitude limit of the square Web Mercator world (degrees).
pub const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

/// Spherical Mercator on the WGS84 equatorial radius.
#[derive(Debug, Clone)]
pub struct WebMercator {
    /// Sphere radius (meters)
    pub radius: f64,
}

impl Default for WebMercator {
    fn default() -> Self {
        Self {
            radius: Ellipsoid::WEB_SPHERE.semi_major,
        }
    }
}

impl WebMercator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert geographic coordinates (degrees) to x/y (meters).
    ///
    /// Returns `None` at the poles, where y is unbounded.
    pub fn from_geographic(&self, lon: f64, lat: f64) -> Option<(f64, f64)> {
        if lat.abs() >= 90.0 {
            return None;
        }
        let x = self.radius * lon.to_radians();
        let y = self.radius * (FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
        Some((x, y))
    }

    /// Convert x/y (meters) to geographic coordinates (degrees).
    pub fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        let lon = (x / self.radius).to_degrees();
        let lat = (2.0 * (y / self.radius).exp().atan() - FRAC_PI_2).to_degrees();
        (lon, lat)
    }
}
