//! Configuration for grid-file streams.

use grid_common::{Calendar, EpsgCode, TimeUnits};
use serde::{Deserialize, Serialize};

/// Prefix shared by every environment variable read here.
pub const ENV_PREFIX: &str = "GRIDSTREAM_";

fn env_var(name: &str) -> Option<String> {
    std::env::var(format!("{}{}", ENV_PREFIX, name)).ok()
}

fn parse_bool(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

/// Configuration for writing a time-series grid file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// CRS of the simulation grid, e.g. "EPSG:4326".
    pub crs: String,

    /// Length of one timestep in seconds.
    pub timestep_secs: i64,

    /// Enable deflate compression of data variables.
    pub compression: bool,

    /// Deflate level (1-9).
    pub compression_level: u8,

    /// On-disk format.
    pub format: FileFormat,

    /// Upper bound on the number of timesteps buffered per variable.
    pub max_buffer_steps: usize,

    /// Keep this many significant decimal digits when writing.
    pub least_significant_digit: Option<u32>,

    /// CF units of the time variable; seconds since the first step when unset.
    pub time_units: Option<String>,

    /// Calendar attribute of the time variable.
    pub calendar: Calendar,

    /// Sentinel written for no-data cells.
    pub fill_value: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            crs: EpsgCode::WGS84.to_string(),
            timestep_secs: 86400,
            compression: true,
            compression_level: 9,
            format: FileFormat::Netcdf4,
            max_buffer_steps: 25,
            least_significant_digit: None,
            time_units: None,
            calendar: Calendar::Gregorian,
            fill_value: -9999.0,
        }
    }
}

impl StreamConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(val) = env_var("CRS") {
            config.crs = val;
        }

        if let Some(val) = env_var("TIMESTEP_SECS") {
            if let Ok(secs) = val.parse() {
                config.timestep_secs = secs;
            }
        }

        if let Some(val) = env_var("COMPRESSION") {
            config.compression = parse_bool(&val);
        }

        if let Some(val) = env_var("COMPRESSION_LEVEL") {
            if let Ok(level) = val.parse() {
                config.compression_level = level;
            }
        }

        if let Some(val) = env_var("FORMAT") {
            if let Some(format) = FileFormat::from_str(&val) {
                config.format = format;
            }
        }

        if let Some(val) = env_var("MAX_BUFFER_STEPS") {
            if let Ok(steps) = val.parse() {
                config.max_buffer_steps = steps;
            }
        }

        if let Some(val) = env_var("LEAST_SIGNIFICANT_DIGIT") {
            config.least_significant_digit = val.parse().ok();
        }

        if let Some(val) = env_var("TIME_UNITS") {
            config.time_units = Some(val).filter(|s| !s.trim().is_empty());
        }

        if let Some(val) = env_var("CALENDAR") {
            if let Ok(calendar) = Calendar::parse(&val) {
                config.calendar = calendar;
            }
        }

        if let Some(val) = env_var("FILL_VALUE") {
            if let Ok(fill) = val.parse() {
                config.fill_value = fill;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        EpsgCode::parse(&self.crs).map_err(|e| e.to_string())?;

        if self.timestep_secs <= 0 {
            return Err("timestep_secs must be > 0".to_string());
        }

        if self.compression_level == 0 || self.compression_level > 9 {
            return Err("compression_level must be 1-9".to_string());
        }

        if self.max_buffer_steps == 0 {
            return Err("max_buffer_steps must be > 0".to_string());
        }

        if let Some(units) = &self.time_units {
            TimeUnits::parse(units).map_err(|e| e.to_string())?;
        }

        if !self.fill_value.is_finite() {
            return Err("fill_value must be finite".to_string());
        }

        Ok(())
    }

    /// Number of timesteps buffered per variable for a run of `timesteps`.
    pub fn buffer_depth(&self, timesteps: usize) -> usize {
        self.max_buffer_steps.min(timesteps).max(1)
    }
}

/// On-disk NetCDF flavour.
///
/// Only NetCDF-4 based formats are offered: data variables are defined after
/// data has already been written, which classic files do not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileFormat {
    #[default]
    Netcdf4,
    Netcdf4Classic,
}

impl FileFormat {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NETCDF4" => Some(Self::Netcdf4),
            "NETCDF4_CLASSIC" => Some(Self::Netcdf4Classic),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Netcdf4 => "NETCDF4",
            Self::Netcdf4Classic => "NETCDF4_CLASSIC",
        }
    }
}

impl std::fmt::Display for FileFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration for block reads of forcing files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Memory budget for one read window in megabytes.
    pub memory_budget_mb: usize,

    /// Fixed window depth in timesteps, overriding the budget.
    pub window_steps: Option<usize>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            memory_budget_mb: 4000,
            window_steps: None,
        }
    }
}

impl ReaderConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(val) = env_var("MEMORY_BUDGET_MB") {
            if let Ok(mb) = val.parse() {
                config.memory_budget_mb = mb;
            }
        }

        if let Some(val) = env_var("WINDOW_STEPS") {
            config.window_steps = val.parse().ok().filter(|&n: &usize| n > 0);
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.memory_budget_mb == 0 && self.window_steps.is_none() {
            return Err("memory_budget_mb must be > 0".to_string());
        }

        if self.window_steps == Some(0) {
            return Err("window_steps must be > 0".to_string());
        }

        Ok(())
    }

    /// Get the memory budget in bytes.
    pub fn memory_budget_bytes(&self) -> usize {
        self.memory_budget_mb * 1024 * 1024
    }

    /// Timesteps per read window for a grid of `cells` cells.
    pub fn window_depth(&self, cells: usize) -> usize {
        match self.window_steps {
            Some(steps) => steps.max(1),
            None => self.memory_budget_bytes() / (cells.max(1) * 8) + 1,
        }
    }
}
