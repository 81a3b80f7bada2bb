//! Creates the skeleton of a CF-1.4 output file.
//!
//! Writes the time axis, spatial coordinates, the `crs` grid-mapping marker
//! and global attributes. Data variables are added later by the writer as
//! they are first seen.

use grid_common::{TimeAxis, TimeUnits};
use projection::{CoordinateAxes, CrsDefinition};
use tracing::{debug, info};

use crate::config::StreamConfig;
use crate::dataset::{AttrValue, GridDataset, ValueKind, VariableSpec};
use crate::error::{StreamError, StreamResult};
use crate::metadata::GlobalMetadata;

/// Fill value of the coordinate variables.
pub const COORDINATE_FILL: f64 = -9999.0;

/// Name of the scalar grid-mapping variable.
pub const CRS_VARIABLE: &str = "crs";

/// Sets up dimensions, coordinates and metadata of a new file.
pub struct GridFileInitializer<'a> {
    config: &'a StreamConfig,
}

impl<'a> GridFileInitializer<'a> {
    pub fn new(config: &'a StreamConfig) -> Self {
        Self { config }
    }

    /// Write the file skeleton and sync it.
    pub fn initialize<D: GridDataset>(
        &self,
        dataset: &mut D,
        axis: &TimeAxis,
        axes: &CoordinateAxes,
        crs: &CrsDefinition,
        metadata: &GlobalMetadata,
    ) -> StreamResult<()> {
        let (rows, cols) = axes.shape();
        info!(
            steps = axis.count,
            rows = rows,
            cols = cols,
            crs = %crs.epsg,
            "Setting up dimensions and attributes"
        );

        self.write_time(dataset, axis)?;
        match axes {
            CoordinateAxes::Geographic { lat, lon } => {
                self.write_geographic(dataset, lat, lon)?;
            }
            CoordinateAxes::Projected { y, x, lat, lon } => {
                self.write_projected(dataset, y, x, lat, lon)?;
            }
        }
        self.write_crs(dataset, crs)?;

        let merged = GlobalMetadata::baseline().merged(metadata);
        for (name, value) in merged.iter() {
            dataset.put_attribute(None, name, value.into())?;
        }

        dataset.sync()
    }

    fn compression(&self) -> Option<u8> {
        self.config
            .compression
            .then_some(self.config.compression_level)
    }

    fn coordinate_spec(&self, name: &str, dims: &[&str]) -> VariableSpec {
        VariableSpec::new(name, dims, ValueKind::F32)
            .fill_value(COORDINATE_FILL)
            .compression(self.compression())
    }

    fn write_time<D: GridDataset>(&self, dataset: &mut D, axis: &TimeAxis) -> StreamResult<()> {
        let (units, units_text) = match &self.config.time_units {
            Some(text) => (TimeUnits::parse(text)?, text.clone()),
            None => {
                let units = axis.default_units();
                let text = units.to_string();
                (units, text)
            }
        };

        // A single-step file gets a fixed time dimension
        let len = if axis.count > 1 { None } else { Some(1) };
        dataset.add_dimension("time", len)?;
        dataset.add_variable(
            &VariableSpec::new("time", &["time"], ValueKind::F64)
                .fill_value(COORDINATE_FILL)
                .compression(self.compression()),
        )?;

        put_all(
            dataset,
            "time",
            &[
                ("units", units_text.into()),
                ("calendar", self.config.calendar.as_str().into()),
                ("standard_name", "time".into()),
                ("long_name", "time".into()),
                ("axis", "T".into()),
            ],
        )?;

        dataset.put_values("time", &axis.offsets(&units))?;
        debug!(steps = axis.count, units = %units, "Wrote time axis");
        Ok(())
    }

    fn write_geographic<D: GridDataset>(
        &self,
        dataset: &mut D,
        lat: &[f64],
        lon: &[f64],
    ) -> StreamResult<()> {
        dataset.add_dimension("lat", Some(lat.len()))?;
        dataset.add_dimension("lon", Some(lon.len()))?;

        dataset.add_variable(&self.coordinate_spec("lat", &["lat"]))?;
        put_all(
            dataset,
            "lat",
            &[
                ("standard_name", "latitude".into()),
                ("long_name", "latitude".into()),
                ("units", "degrees_north".into()),
                ("axis", "Y".into()),
            ],
        )?;

        dataset.add_variable(&self.coordinate_spec("lon", &["lon"]))?;
        put_all(
            dataset,
            "lon",
            &[
                ("standard_name", "longitude".into()),
                ("long_name", "longitude".into()),
                ("units", "degrees_east".into()),
                ("axis", "X".into()),
            ],
        )?;

        dataset.put_values("lat", lat)?;
        dataset.put_values("lon", lon)?;
        Ok(())
    }

    fn write_projected<D: GridDataset>(
        &self,
        dataset: &mut D,
        y: &[f64],
        x: &[f64],
        lat: &[f64],
        lon: &[f64],
    ) -> StreamResult<()> {
        let cells = y.len() * x.len();
        if lat.len() != cells || lon.len() != cells {
            return Err(StreamError::InvalidFormat(format!(
                "lat/lon fields hold {}/{} values, grid has {} cells",
                lat.len(),
                lon.len(),
                cells
            )));
        }

        dataset.add_dimension("y", Some(y.len()))?;
        dataset.add_dimension("x", Some(x.len()))?;

        dataset.add_variable(&self.coordinate_spec("y", &["y"]))?;
        put_all(
            dataset,
            "y",
            &[
                ("standard_name", "projection_y_coordinate".into()),
                ("long_name", "y-coordinate in Cartesian system".into()),
                ("units", "m".into()),
                ("axis", "Y".into()),
            ],
        )?;

        dataset.add_variable(&self.coordinate_spec("x", &["x"]))?;
        put_all(
            dataset,
            "x",
            &[
                ("standard_name", "projection_x_coordinate".into()),
                ("long_name", "x-coordinate in Cartesian system".into()),
                ("units", "m".into()),
                ("axis", "X".into()),
            ],
        )?;

        dataset.put_values("y", y)?;
        dataset.put_values("x", x)?;

        for (name, standard, units, values) in [
            ("lat", "latitude", "degrees_north", lat),
            ("lon", "longitude", "degrees_east", lon),
        ] {
            dataset.add_variable(&VariableSpec::new(name, &["y", "x"], ValueKind::F32))?;
            put_all(
                dataset,
                name,
                &[
                    ("standard_name", standard.into()),
                    ("long_name", format!("{} coordinate", standard).into()),
                    ("units", units.into()),
                    ("coordinates", "lat lon".into()),
                    ("grid_mapping", "wgs84".into()),
                ],
            )?;
            dataset.put_values(name, values)?;
        }
        Ok(())
    }

    fn write_crs<D: GridDataset>(&self, dataset: &mut D, crs: &CrsDefinition) -> StreamResult<()> {
        dataset.add_variable(&VariableSpec::new(CRS_VARIABLE, &[], ValueKind::Byte))?;

        let mut attrs: Vec<(&str, AttrValue)> = vec![
            ("long_name", crs.long_name().into()),
            ("grid_mapping_name", crs.grid_mapping_name().into()),
        ];
        if crs.is_projected() {
            if let Some(zone) = crs.utm_zone() {
                attrs.push(("utm_zone_number", (zone as i32).into()));
            }
            attrs.push(("semi_major_axis", crs.semi_major().into()));
            attrs.push(("inverse_flattening", crs.inverse_flattening().into()));
            attrs.push(("_CoordinateTransformType", "Projection".into()));
            attrs.push(("_CoordinateAxisTypes", "y x".into()));
        }
        attrs.push(("proj4_params", crs.proj4().into()));
        attrs.push(("EPSG_code", crs.epsg.to_string().into()));

        put_all(dataset, CRS_VARIABLE, &attrs)
    }
}

fn put_all<D: GridDataset>(
    dataset: &mut D,
    variable: &str,
    attrs: &[(&str, AttrValue)],
) -> StreamResult<()> {
    for (name, value) in attrs {
        dataset.put_attribute(Some(variable), name, value.clone())?;
    }
    Ok(())
}
