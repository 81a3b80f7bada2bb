//! Transverse Mercator projection (UTM zones).
//!
//! Uses the Krüger series in the third flattening `n`, carried to fourth
//! order, as given by Karney (2011), "Transverse Mercator with an accuracy of
//! a few nanometers". Within a UTM zone the truncation error is far below a
//! millimetre.
//!
//! Projection coordinates are easting/northing in meters, geographic
//! coordinates are longitude/latitude in degrees.

use crate::ellipsoid::Ellipsoid;

/// UTM scale factor on the central meridian.
pub const UTM_SCALE_FACTOR: f64 = 0.9996;
/// UTM false easting (meters).
pub const UTM_FALSE_EASTING: f64 = 500_000.0;
/// UTM false northing for southern-hemisphere zones (meters).
pub const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Transverse Mercator projection parameters.
#[derive(Debug, Clone)]
pub struct TransverseMercator {
    /// Reference ellipsoid
    pub ellipsoid: Ellipsoid,
    /// Central meridian in degrees
    pub lon0: f64,
    /// Scale factor on the central meridian
    pub k0: f64,
    /// False easting (meters)
    pub false_easting: f64,
    /// False northing (meters)
    pub false_northing: f64,
    /// Rectifying radius A
    a_rect: f64,
    /// Eccentricity e
    e: f64,
    /// Forward series coefficients
    alpha: [f64; 4],
    /// Inverse series coefficients
    beta: [f64; 4],
    /// Conformal-to-geodetic latitude coefficients
    delta: [f64; 4],
}

impl TransverseMercator {
    /// Create a projection with an arbitrary central meridian and offsets.
    pub fn new(
        ellipsoid: Ellipsoid,
        lon0: f64,
        k0: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let n = ellipsoid.third_flattening();
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;

        let a_rect = ellipsoid.semi_major / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0,
            49561.0 * n4 / 161280.0,
        ];
        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0,
            n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0,
            17.0 * n3 / 480.0 - 37.0 * n4 / 840.0,
            4397.0 * n4 / 161280.0,
        ];
        let delta = [
            2.0 * n - 2.0 * n2 / 3.0 - 2.0 * n3 + 116.0 * n4 / 45.0,
            7.0 * n2 / 3.0 - 8.0 * n3 / 5.0 - 227.0 * n4 / 45.0,
            56.0 * n3 / 15.0 - 136.0 * n4 / 35.0,
            4279.0 * n4 / 630.0,
        ];

        Self {
            ellipsoid,
            lon0,
            k0,
            false_easting,
            false_northing,
            a_rect,
            e: ellipsoid.eccentricity(),
            alpha,
            beta,
            delta,
        }
    }

    /// Create a UTM zone projection.
    ///
    /// # Arguments
    /// * `zone` - UTM zone number (1-60)
    /// * `north` - true for the northern hemisphere
    /// * `ellipsoid` - Reference ellipsoid (WGS84, GRS80, ...)
    pub fn utm(zone: u8, north: bool, ellipsoid: Ellipsoid) -> Self {
        let lon0 = zone as f64 * 6.0 - 183.0;
        let false_northing = if north { 0.0 } else { UTM_FALSE_NORTHING_SOUTH };
        Self::new(
            ellipsoid,
            lon0,
            UTM_SCALE_FACTOR,
            UTM_FALSE_EASTING,
            false_northing,
        )
    }

    /// Convert geographic coordinates (degrees) to easting/northing (meters).
    pub fn from_geographic(&self, lon: f64, lat: f64) -> (f64, f64) {
        let phi = lat.to_radians();
        let dlon = normalize_lon(lon - self.lon0).to_radians();

        // Conformal latitude via tau' = sinh(atanh(sin phi) - e atanh(e sin phi))
        let sin_phi = phi.sin();
        let t = (sin_phi.atanh() - self.e * (self.e * sin_phi).atanh()).sinh();

        let xi_p = t.atan2(dlon.cos());
        let eta_p = (dlon.sin() / (1.0 + t * t).sqrt()).atanh();

        let mut xi = xi_p;
        let mut eta = eta_p;
        for (j, a) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi += a * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += a * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        let x = self.false_easting + self.k0 * self.a_rect * eta;
        let y = self.false_northing + self.k0 * self.a_rect * xi;
        (x, y)
    }

    /// Convert easting/northing (meters) to geographic coordinates (degrees).
    ///
    /// Returns `(longitude, latitude)`.
    pub fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        let xi = (y - self.false_northing) / (self.k0 * self.a_rect);
        let eta = (x - self.false_easting) / (self.k0 * self.a_rect);

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, b) in self.beta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            xi_p -= b * (k * xi).sin() * (k * eta).cosh();
            eta_p -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let chi = (xi_p.sin() / eta_p.cosh()).asin();
        let mut phi = chi;
        for (j, d) in self.delta.iter().enumerate() {
            let k = 2.0 * (j as f64 + 1.0);
            phi += d * (k * chi).sin();
        }

        let dlon = eta_p.sinh().atan2(xi_p.cos());
        let lon = normalize_lon(self.lon0 + dlon.to_degrees());
        (lon, phi.to_degrees())
    }
}

/// Wrap a longitude difference into [-180, 180).
fn normalize_lon(lon: f64) -> f64 {
    let mut l = lon;
    while l >= 180.0 {
        l -= 360.0;
    }
    while l < -180.0 {
        l += 360.0;
    }
    l
}
