//! EPSG registry for the coordinate systems simulation grids are delivered in.

use grid_common::EpsgCode;

use crate::ellipsoid::Ellipsoid;
use crate::error::{ProjectionError, ProjectionResult};

/// The projection family behind an EPSG code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProjectionKind {
    /// Longitude/latitude in degrees
    Geographic,
    /// Universal Transverse Mercator zone
    Utm { zone: u8, north: bool },
    /// Spherical Web Mercator
    WebMercator,
}

/// Resolved parameters of a supported EPSG code.
#[derive(Debug, Clone, PartialEq)]
pub struct CrsDefinition {
    pub epsg: EpsgCode,
    pub kind: ProjectionKind,
    pub ellipsoid: Ellipsoid,
    /// Datum name used in proj4 strings
    pub datum: &'static str,
}

impl CrsDefinition {
    /// WGS84 geographic, the target of every lat/lon field we write.
    pub fn wgs84() -> Self {
        Self {
            epsg: EpsgCode::WGS84,
            kind: ProjectionKind::Geographic,
            ellipsoid: Ellipsoid::WGS84,
            datum: "WGS84",
        }
    }

    /// Look up an EPSG code in the registry.
    pub fn resolve(epsg: EpsgCode) -> ProjectionResult<Self> {
        let code = epsg.code();
        let (kind, ellipsoid, datum) = match code {
            4326 => (ProjectionKind::Geographic, Ellipsoid::WGS84, "WGS84"),
            4258 => (ProjectionKind::Geographic, Ellipsoid::GRS80, "ETRS89"),
            4269 => (ProjectionKind::Geographic, Ellipsoid::GRS80, "NAD83"),
            32601..=32660 => (
                ProjectionKind::Utm {
                    zone: (code - 32600) as u8,
                    north: true,
                },
                Ellipsoid::WGS84,
                "WGS84",
            ),
            32701..=32760 => (
                ProjectionKind::Utm {
                    zone: (code - 32700) as u8,
                    north: false,
                },
                Ellipsoid::WGS84,
                "WGS84",
            ),
            25828..=25838 => (
                ProjectionKind::Utm {
                    zone: (code - 25800) as u8,
                    north: true,
                },
                Ellipsoid::GRS80,
                "ETRS89",
            ),
            26901..=26923 => (
                ProjectionKind::Utm {
                    zone: (code - 26900) as u8,
                    north: true,
                },
                Ellipsoid::GRS80,
                "NAD83",
            ),
            3857 => (
                ProjectionKind::WebMercator,
                Ellipsoid::WEB_SPHERE,
                "WGS84",
            ),
            _ => return Err(ProjectionError::UnsupportedEpsg(code)),
        };

        Ok(Self {
            epsg,
            kind,
            ellipsoid,
            datum,
        })
    }

    /// True for every non-geographic system.
    pub fn is_projected(&self) -> bool {
        !matches!(self.kind, ProjectionKind::Geographic)
    }

    /// UTM zone number, if this is a UTM system.
    pub fn utm_zone(&self) -> Option<u8> {
        match self.kind {
            ProjectionKind::Utm { zone, .. } => Some(zone),
            _ => None,
        }
    }

    /// CF `grid_mapping_name`.
    pub fn grid_mapping_name(&self) -> &'static str {
        match self.kind {
            ProjectionKind::Geographic => "latitude_longitude",
            ProjectionKind::Utm { .. } => "universal_transverse_mercator",
            ProjectionKind::WebMercator => "mercator",
        }
    }

    pub fn semi_major(&self) -> f64 {
        self.ellipsoid.semi_major
    }

    pub fn inverse_flattening(&self) -> f64 {
        self.ellipsoid.inverse_flattening
    }

    /// Value of the `long_name` attribute on the CRS marker variable.
    pub fn long_name(&self) -> String {
        match self.kind {
            ProjectionKind::Geographic if self.epsg == EpsgCode::WGS84 => "wgs84".to_string(),
            _ => self.epsg.to_string(),
        }
    }

    /// proj4 parameter string.
    pub fn proj4(&self) -> String {
        match self.kind {
            ProjectionKind::Geographic => format!(
                "+proj=longlat +ellps={} +datum={} +no_defs",
                self.ellipsoid.name, self.datum
            ),
            ProjectionKind::Utm { zone, north } => format!(
                "+proj=utm +zone={}{} +ellps={} +datum={} +units=m +no_defs",
                zone,
                if north { "" } else { " +south" },
                self.ellipsoid.name,
                self.datum
            ),
            ProjectionKind::WebMercator => "+proj=merc +a=6378137 +b=6378137 +lat_ts=0 +lon_0=0 \
                 +x_0=0 +y_0=0 +k=1 +units=m +nadgrids=@null +wktext +no_defs"
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_geographic() {
        let def = CrsDefinition::resolve(EpsgCode::WGS84).unwrap();
        assert!(!def.is_projected());
        assert_eq!(def.grid_mapping_name(), "latitude_longitude");
        assert_eq!(def.long_name(), "wgs84");
        assert_eq!(def.proj4(), "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs");
    }

    #[test]
    fn test_resolve_utm_north_and_south() {
        let north = CrsDefinition::resolve(EpsgCode::new(32631)).unwrap();
        assert_eq!(north.kind, ProjectionKind::Utm { zone: 31, north: true });
        assert_eq!(north.utm_zone(), Some(31));
        assert_eq!(north.long_name(), "EPSG:32631");
        assert!(north.proj4().contains("+zone=31 "));

        let south = CrsDefinition::resolve(EpsgCode::new(32733)).unwrap();
        assert_eq!(south.kind, ProjectionKind::Utm { zone: 33, north: false });
        assert!(south.proj4().contains("+south"));
    }

    #[test]
    fn test_resolve_etrs89_utm() {
        let def = CrsDefinition::resolve(EpsgCode::new(25832)).unwrap();
        assert_eq!(def.utm_zone(), Some(32));
        assert_eq!(def.ellipsoid, Ellipsoid::GRS80);
        assert_eq!(def.inverse_flattening(), 298.257222101);
    }

    #[test]
    fn test_web_mercator() {
        let def = CrsDefinition::resolve(EpsgCode::new(3857)).unwrap();
        assert!(def.is_projected());
        assert_eq!(def.utm_zone(), None);
        assert_eq!(def.grid_mapping_name(), "mercator");
    }

    #[test]
    fn test_unsupported_code() {
        assert!(matches!(
            CrsDefinition::resolve(EpsgCode::new(28992)),
            Err(ProjectionError::UnsupportedEpsg(28992))
        ));
        assert!(CrsDefinition::resolve(EpsgCode::new(32600)).is_err());
    }
}
