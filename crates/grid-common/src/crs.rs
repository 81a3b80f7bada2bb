//! Coordinate Reference System identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::GridError;

/// An EPSG registry code such as `EPSG:4326`.
///
/// Only the identifier is carried here; resolving it into projection
/// parameters is the job of the `projection` crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EpsgCode(u32);

impl EpsgCode {
    /// WGS84 geographic (lat/lon in degrees).
    pub const WGS84: EpsgCode = EpsgCode(4326);

    pub const fn new(code: u32) -> Self {
        Self(code)
    }

    pub fn code(&self) -> u32 {
        self.0
    }

    /// Parse an identifier string.
    ///
    /// Accepts formats like:
    /// - "EPSG:4326"
    /// - "epsg:32631"
    /// - " EPSG:28992 " (surrounding whitespace is ignored)
    pub fn parse(s: &str) -> Result<Self, GridError> {
        let trimmed = s.trim();
        let (authority, code) = trimmed
            .split_once(':')
            .ok_or_else(|| GridError::InvalidCrs(s.to_string()))?;

        if !authority.eq_ignore_ascii_case("EPSG") {
            return Err(GridError::InvalidCrs(s.to_string()));
        }

        code.trim()
            .parse::<u32>()
            .map(EpsgCode)
            .map_err(|_| GridError::InvalidCrs(s.to_string()))
    }
}

impl Default for EpsgCode {
    fn default() -> Self {
        Self::WGS84
    }
}

impl fmt::Display for EpsgCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

impl FromStr for EpsgCode {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EpsgCode {
    type Error = GridError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<EpsgCode> for String {
    fn from(code: EpsgCode) -> Self {
        code.to_string()
    }
}
