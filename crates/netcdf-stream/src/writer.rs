//! Buffered per-timestep writer.
//!
//! Each variable gets a ring of `depth` slices. A timestep lands in slot
//! `(t - 1) % depth`; when the ring is full, or the last timestep of the run
//! arrives, the contiguous block written since the previous flush goes to the
//! file in one call and the file is synced.

use std::collections::HashMap;
use std::path::Path;

use grid_common::{Raster, SpatialGrid, TimeAxis};
use projection::CoordinateResolver;
use tracing::{debug, error, info, warn};

use crate::config::StreamConfig;
use crate::dataset::{AttrValue, GridDataset, ValueKind, VariableSpec};
use crate::error::{StreamError, StreamResult};
use crate::initializer::GridFileInitializer;
use crate::metadata::GlobalMetadata;

/// What the stream holds. Named in the warning about unflushed data at close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteMode {
    /// Regular model output
    #[default]
    Output,
    /// Model state snapshots
    State,
}

/// Outcome of closing a writer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FinishReport {
    /// Variables whose buffers still held unwritten timesteps, sorted
    pub unflushed: Vec<String>,
    /// Number of block writes performed
    pub flushes: usize,
}

impl FinishReport {
    pub fn is_clean(&self) -> bool {
        self.unflushed.is_empty()
    }
}

#[derive(Debug)]
struct VariableBuffer {
    ring: Vec<f64>,
    dirty: bool,
}

/// Writes one raster per timestep per variable to a grid file.
pub struct TimestepWriter<D: GridDataset> {
    dataset: Option<D>,
    label: String,
    config: StreamConfig,
    mode: WriteMode,
    rows: usize,
    cols: usize,
    timesteps: usize,
    depth: usize,
    dims: [&'static str; 3],
    projected: bool,
    buffers: HashMap<String, VariableBuffer>,
    flushes: usize,
    report: Option<FinishReport>,
}

#[cfg(feature = "netcdf")]
impl TimestepWriter<crate::native::NetcdfDataset> {
    /// Create a NetCDF file at `path` and prepare it for writing.
    pub fn create(
        path: impl AsRef<Path>,
        grid: &SpatialGrid,
        axis: TimeAxis,
        config: StreamConfig,
        metadata: &GlobalMetadata,
        mode: WriteMode,
    ) -> StreamResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Setting up grid file output");
        check_setup(&config, &axis)?;
        let dataset = crate::native::NetcdfDataset::create(path, config.format)?;
        let label = dataset.path().display().to_string();
        Self::new(dataset, &label, grid, axis, config, metadata, mode)
    }
}

impl<D: GridDataset> TimestepWriter<D> {
    /// Initialize `dataset` for `grid` and `axis` and return a writer for it.
    pub fn new(
        mut dataset: D,
        label: &str,
        grid: &SpatialGrid,
        axis: TimeAxis,
        config: StreamConfig,
        metadata: &GlobalMetadata,
        mode: WriteMode,
    ) -> StreamResult<Self> {
        check_setup(&config, &axis)?;

        let resolver = CoordinateResolver::default();
        let crs = resolver.definition(&config.crs)?;
        if crs.epsg != grid.crs {
            error!(config = %crs.epsg, grid = %grid.crs, "CRS of grid and configuration differ");
            return Err(StreamError::Config(format!(
                "grid is in {} but the stream is configured for {}",
                grid.crs, crs.epsg
            )));
        }

        let axes = resolver.axes_for(&crs, &grid.x_coords(), &grid.y_coords())?;
        GridFileInitializer::new(&config).initialize(&mut dataset, &axis, &axes, &crs, metadata)?;

        let depth = config.buffer_depth(axis.count);
        let [row_dim, col_dim] = axes.dimension_names();
        info!(
            path = %label,
            steps = axis.count,
            buffer_steps = depth,
            mode = ?mode,
            "Grid file ready for writing"
        );

        Ok(Self {
            dataset: Some(dataset),
            label: label.to_string(),
            config,
            mode,
            rows: grid.rows,
            cols: grid.cols,
            timesteps: axis.count,
            depth,
            dims: ["time", row_dim, col_dim],
            projected: crs.is_projected(),
            buffers: HashMap::new(),
            flushes: 0,
            report: None,
        })
    }

    /// Buffer the raster of `variable` at `timestep` (1-based).
    ///
    /// `variable` may be a path; only its file-name component is used.
    /// `unit` and `display_name` are recorded when the variable is created.
    pub fn write(
        &mut self,
        timestep: usize,
        variable: &str,
        unit: &str,
        display_name: &str,
        raster: &Raster,
    ) -> StreamResult<()> {
        if self.dataset.is_none() {
            return Err(StreamError::Finished);
        }
        let name = base_name(variable);

        if timestep == 0 || timestep > self.timesteps {
            return Err(StreamError::TimestepOutOfRange {
                timestep,
                count: self.timesteps,
            });
        }
        if raster.shape() != (self.rows, self.cols) {
            return Err(StreamError::ShapeMismatch {
                variable: name.to_string(),
                expected_rows: self.rows,
                expected_cols: self.cols,
                rows: raster.rows(),
                cols: raster.cols(),
            });
        }

        self.ensure_variable(name, unit, display_name)?;

        let cells = self.rows * self.cols;
        let idx = timestep - 1;
        let pos = idx % self.depth;
        let fill = self.config.fill_value;
        let digits = self.config.least_significant_digit;

        let buffer = self
            .buffers
            .get_mut(name)
            .ok_or_else(|| StreamError::MissingData(format!("buffer for '{}'", name)))?;
        let slot = &mut buffer.ring[pos * cells..(pos + 1) * cells];
        for (dst, v) in slot.iter_mut().zip(raster.to_filled(fill)) {
            *dst = match digits {
                Some(d) if v != fill => quantize(v, d),
                _ => v,
            };
        }
        buffer.dirty = true;

        if (idx + 1) % self.depth == 0 || timestep >= self.timesteps {
            self.flush(name, idx - pos, pos + 1)?;
        }
        Ok(())
    }

    fn ensure_variable(&mut self, name: &str, unit: &str, display_name: &str) -> StreamResult<()> {
        if self.buffers.contains_key(name) {
            return Ok(());
        }
        let dataset = self.dataset.as_mut().ok_or(StreamError::Finished)?;

        if dataset.has_variable(name) {
            debug!(variable = %name, "Reusing existing variable");
        } else {
            debug!(variable = %name, path = %self.label, format = %self.config.format, "Creating variable");
            let spec = VariableSpec::new(name, &self.dims, ValueKind::F32)
                .fill_value(self.config.fill_value)
                .compression(self.config.compression.then_some(self.config.compression_level))
                .chunking(vec![1, self.rows, self.cols]);
            dataset.add_variable(&spec)?;

            let mut attrs: Vec<(&str, AttrValue)> = vec![
                ("units", unit.into()),
                ("standard_name", display_name.into()),
                ("coordinates", "lat lon".into()),
            ];
            if self.projected {
                attrs.push(("grid_mapping", "crs".into()));
            }
            if let Some(digits) = self.config.least_significant_digit {
                attrs.push(("least_significant_digit", (digits as i32).into()));
            }
            for (attr, value) in attrs {
                dataset.put_attribute(Some(name), attr, value)?;
            }
            dataset.sync()?;
        }

        self.buffers.insert(
            name.to_string(),
            VariableBuffer {
                ring: vec![self.config.fill_value; self.depth * self.rows * self.cols],
                dirty: false,
            },
        );
        Ok(())
    }

    fn flush(&mut self, name: &str, start: usize, count: usize) -> StreamResult<()> {
        let cells = self.rows * self.cols;
        let fill = self.config.fill_value;
        let dataset = self.dataset.as_mut().ok_or(StreamError::Finished)?;
        let buffer = self
            .buffers
            .get_mut(name)
            .ok_or_else(|| StreamError::MissingData(format!("buffer for '{}'", name)))?;

        debug!(variable = %name, start = start, count = count, "Writing buffer to file");
        dataset.put_steps(name, start, count, &buffer.ring[..count * cells])?;
        dataset.sync()?;

        // Slots not written in the next block must not repeat this block's data
        buffer.ring.fill(fill);
        buffer.dirty = false;
        self.flushes += 1;
        Ok(())
    }

    /// Sync and release the file.
    ///
    /// Reports variables whose buffers still held data. Calling it again
    /// returns the first report.
    pub fn finish(&mut self) -> StreamResult<FinishReport> {
        if let Some(report) = &self.report {
            return Ok(report.clone());
        }
        let Some(mut dataset) = self.dataset.take() else {
            return Ok(FinishReport::default());
        };

        let mut unflushed: Vec<String> = self
            .buffers
            .iter()
            .filter(|(_, b)| b.dirty)
            .map(|(name, _)| name.clone())
            .collect();
        unflushed.sort();

        if !unflushed.is_empty() {
            let message = match self.mode {
                WriteMode::State => "Finishing with dirty state buffer",
                WriteMode::Output => "Finishing with unflushed timesteps",
            };
            warn!(path = %self.label, variables = ?unflushed, mode = ?self.mode, "{}", message);
        }

        let report = FinishReport {
            unflushed,
            flushes: self.flushes,
        };
        self.report = Some(report.clone());

        let synced = dataset.sync();
        dataset.close()?;
        synced?;
        info!(path = %self.label, flushes = report.flushes, "Closed grid file output");
        Ok(report)
    }

    /// Timesteps buffered per variable before a flush.
    pub fn buffer_depth(&self) -> usize {
        self.depth
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    /// Number of block writes so far.
    pub fn flush_count(&self) -> usize {
        self.flushes
    }

    /// True while `variable` has buffered timesteps not yet in the file.
    pub fn is_dirty(&self, variable: &str) -> bool {
        self.buffers
            .get(base_name(variable))
            .map(|b| b.dirty)
            .unwrap_or(false)
    }
}

impl<D: GridDataset> Drop for TimestepWriter<D> {
    fn drop(&mut self) {
        if self.dataset.is_some() {
            if let Err(e) = self.finish() {
                error!(path = %self.label, error = %e, "Failed to close grid file output");
            }
        }
    }
}

/// Reject invalid configuration and time axes whose step differs from the
/// configured timestep.
fn check_setup(config: &StreamConfig, axis: &TimeAxis) -> StreamResult<()> {
    config.validate().map_err(StreamError::Config)?;
    if axis.step_secs != config.timestep_secs {
        error!(
            axis_step = axis.step_secs,
            timestep_secs = config.timestep_secs,
            "Time axis does not match the configured timestep"
        );
        return Err(StreamError::Config(format!(
            "time axis steps {}s but the stream is configured for {}s",
            axis.step_secs, config.timestep_secs
        )));
    }
    Ok(())
}

/// File-name component of a variable path such as `outmaps/run`.
fn base_name(variable: &str) -> &str {
    Path::new(variable)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(variable)
}

/// Keep `digits` decimal digits of precision by rounding to a power-of-two
/// grid, which compresses well.
fn quantize(value: f64, digits: u32) -> f64 {
    let bits = (10f64.powi(digits as i32)).log2().ceil();
    let scale = 2f64.powf(bits);
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryDataset, PutRecord};
    use test_utils::{
        capture_logs, create_sequence_raster, daily_axis, hourly_axis, tiny_geographic_grid,
        utm_grid,
    };
    use tracing::Level;

    fn writer(
        ds: &MemoryDataset,
        steps: usize,
        max_buffer_steps: usize,
        mode: WriteMode,
    ) -> TimestepWriter<MemoryDataset> {
        let config = StreamConfig {
            max_buffer_steps,
            ..StreamConfig::default()
        };
        TimestepWriter::new(
            ds.clone(),
            "memory",
            &tiny_geographic_grid(),
            daily_axis(steps),
            config,
            &GlobalMetadata::new(),
            mode,
        )
        .unwrap()
    }

    fn put(variable: &str, start: usize, count: usize) -> PutRecord {
        PutRecord {
            variable: variable.to_string(),
            start,
            count,
        }
    }

    #[test]
    fn test_flush_points() {
        let ds = MemoryDataset::new();
        let mut w = writer(&ds, 3, 2, WriteMode::Output);
        assert_eq!(w.buffer_depth(), 2);

        w.write(1, "P", "mm", "Precipitation", &create_sequence_raster(2, 2, 1))
            .unwrap();
        assert!(ds.puts_for("P").is_empty());
        assert!(w.is_dirty("P"));

        w.write(2, "P", "mm", "Precipitation", &create_sequence_raster(2, 2, 2))
            .unwrap();
        assert_eq!(ds.puts_for("P"), vec![put("P", 0, 2)]);
        assert!(!w.is_dirty("P"));

        w.write(3, "P", "mm", "Precipitation", &create_sequence_raster(2, 2, 3))
            .unwrap();
        assert_eq!(ds.puts_for("P"), vec![put("P", 0, 2), put("P", 2, 1)]);

        assert_eq!(ds.get_steps("P", 1, 1).unwrap(), vec![5.0, 6.0, 7.0, 8.0]);
        assert_eq!(ds.dimension_len("time"), Some(3));
        assert!(w.finish().unwrap().is_clean());
    }

    #[test]
    fn test_flushes_only_at_block_ends_and_last_step() {
        let ds = MemoryDataset::new();
        let mut w = writer(&ds, 10, 4, WriteMode::Output);
        for t in 1..=10 {
            w.write(t, "Q", "m3/s", "Discharge", &create_sequence_raster(2, 2, t))
                .unwrap();
        }
        assert_eq!(
            ds.puts_for("Q"),
            vec![put("Q", 0, 4), put("Q", 4, 4), put("Q", 8, 2)]
        );
        assert_eq!(w.flush_count(), 3);

        let all = ds.get_steps("Q", 0, 10).unwrap();
        let expected: Vec<f64> = (1..=40).map(|v| v as f64).collect();
        assert_eq!(all, expected);
    }

    #[test]
    fn test_buffer_never_deeper_than_run() {
        let ds = MemoryDataset::new();
        let w = writer(&ds, 3, 25, WriteMode::Output);
        assert_eq!(w.buffer_depth(), 3);
    }

    #[test]
    fn test_variable_definition() {
        let ds = MemoryDataset::new();
        let mut w = writer(&ds, 2, 25, WriteMode::Output);
        w.write(1, "outmaps/run", "m3/s", "river_discharge", &create_sequence_raster(2, 2, 1))
            .unwrap();

        assert!(ds.has_variable("run"));
        assert!(!ds.has_variable("outmaps/run"));
        assert_eq!(ds.variable_dims("run").unwrap(), vec!["time", "lat", "lon"]);
        assert_eq!(ds.fill_value("run"), Some(-9999.0));
        assert_eq!(
            ds.attribute(Some("run"), "standard_name").unwrap().as_str(),
            Some("river_discharge")
        );
        assert_eq!(ds.attribute(Some("run"), "units").unwrap().as_str(), Some("m3/s"));
        assert!(ds.attribute(Some("run"), "grid_mapping").is_none());
    }

    #[test]
    fn test_projected_variable_references_crs() {
        let ds = MemoryDataset::new();
        let grid = utm_grid(2, 3);
        let config = StreamConfig {
            crs: "EPSG:32631".to_string(),
            ..StreamConfig::default()
        };
        let mut w = TimestepWriter::new(
            ds.clone(),
            "memory",
            &grid,
            daily_axis(2),
            config,
            &GlobalMetadata::new(),
            WriteMode::Output,
        )
        .unwrap();
        w.write(1, "P", "mm", "Precipitation", &create_sequence_raster(2, 3, 1))
            .unwrap();

        assert_eq!(ds.variable_dims("P").unwrap(), vec!["time", "y", "x"]);
        assert_eq!(ds.attribute(Some("P"), "grid_mapping").unwrap().as_str(), Some("crs"));
    }

    #[test]
    fn test_crs_mismatch_rejected() {
        let result = TimestepWriter::new(
            MemoryDataset::new(),
            "memory",
            &utm_grid(2, 2),
            daily_axis(2),
            StreamConfig::default(),
            &GlobalMetadata::new(),
            WriteMode::Output,
        );
        assert!(matches!(result, Err(StreamError::Config(_))));
    }

    #[test]
    fn test_missing_values_written_as_sentinel() {
        let ds = MemoryDataset::new();
        let mut w = writer(&ds, 1, 25, WriteMode::Output);
        let raster = Raster::new(2, 2, vec![1.0, f64::NAN, 3.0, 4.0]).unwrap();
        w.write(1, "P", "mm", "Precipitation", &raster).unwrap();
        assert_eq!(ds.get_steps("P", 0, 1).unwrap(), vec![1.0, -9999.0, 3.0, 4.0]);
    }

    #[test]
    fn test_rejects_bad_timestep_and_shape() {
        let ds = MemoryDataset::new();
        let mut w = writer(&ds, 3, 2, WriteMode::Output);
        let r = create_sequence_raster(2, 2, 1);
        assert!(matches!(
            w.write(0, "P", "mm", "P", &r),
            Err(StreamError::TimestepOutOfRange { timestep: 0, count: 3 })
        ));
        assert!(matches!(
            w.write(4, "P", "mm", "P", &r),
            Err(StreamError::TimestepOutOfRange { timestep: 4, count: 3 })
        ));
        assert!(matches!(
            w.write(1, "P", "mm", "P", &create_sequence_raster(3, 2, 1)),
            Err(StreamError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_rewrite_slot_last_write_wins() {
        let ds = MemoryDataset::new();
        let mut w = writer(&ds, 2, 2, WriteMode::Output);
        w.write(1, "P", "mm", "P", &Raster::filled(2, 2, 1.0)).unwrap();
        w.write(1, "P", "mm", "P", &Raster::filled(2, 2, 9.0)).unwrap();
        w.write(2, "P", "mm", "P", &Raster::filled(2, 2, 2.0)).unwrap();
        assert_eq!(ds.get_steps("P", 0, 1).unwrap(), vec![9.0; 4]);
    }

    #[test]
    fn test_skipped_step_is_missing_not_stale() {
        let ds = MemoryDataset::new();
        let mut w = writer(&ds, 4, 2, WriteMode::Output);
        w.write(1, "P", "mm", "P", &Raster::filled(2, 2, 1.0)).unwrap();
        w.write(2, "P", "mm", "P", &Raster::filled(2, 2, 2.0)).unwrap();
        // Step 3 never arrives
        w.write(4, "P", "mm", "P", &Raster::filled(2, 2, 4.0)).unwrap();
        assert_eq!(ds.get_steps("P", 2, 1).unwrap(), vec![-9999.0; 4]);
        assert_eq!(ds.get_steps("P", 3, 1).unwrap(), vec![4.0; 4]);
    }

    #[test]
    fn test_finish_reports_dirty_state_buffers() {
        let ds = MemoryDataset::new();
        let mut w = writer(&ds, 10, 5, WriteMode::State);
        w.write(1, "SoilMoisture", "mm", "soil", &Raster::zeros(2, 2)).unwrap();
        w.write(1, "Snow", "mm", "snow", &Raster::zeros(2, 2)).unwrap();

        let report = w.finish().unwrap();
        assert_eq!(report.unflushed, vec!["Snow", "SoilMoisture"]);
        assert_eq!(report.flushes, 0);

        // Idempotent
        assert_eq!(w.finish().unwrap(), report);
        assert!(matches!(
            w.write(2, "Snow", "mm", "snow", &Raster::zeros(2, 2)),
            Err(StreamError::Finished)
        ));
    }

    #[test]
    fn test_drop_syncs_and_closes() {
        let ds = MemoryDataset::new();
        {
            let mut w = writer(&ds, 2, 2, WriteMode::Output);
            w.write(1, "P", "mm", "P", &Raster::zeros(2, 2)).unwrap();
        }
        // initializer + variable creation + close
        assert_eq!(ds.sync_count(), 3);
        assert_eq!(ds.close_count(), 1);
    }

    #[test]
    fn test_finish_closes_once() {
        let ds = MemoryDataset::new();
        let mut w = writer(&ds, 2, 2, WriteMode::Output);
        w.finish().unwrap();
        w.finish().unwrap();
        drop(w);
        assert_eq!(ds.close_count(), 1);
    }

    #[test]
    fn test_unflushed_output_warns() {
        let ds = MemoryDataset::new();
        let mut w = writer(&ds, 4, 4, WriteMode::Output);
        w.write(1, "Q", "m3/s", "discharge", &Raster::zeros(2, 2)).unwrap();

        let (report, logs) = capture_logs(Level::WARN, || w.finish().unwrap());
        assert_eq!(report.unflushed, vec!["Q"]);
        assert!(logs.contains("WARN"), "{}", logs);
        assert!(logs.contains("Finishing with unflushed timesteps"), "{}", logs);
    }

    #[test]
    fn test_axis_step_must_match_config() {
        let result = TimestepWriter::new(
            MemoryDataset::new(),
            "memory",
            &tiny_geographic_grid(),
            hourly_axis(3),
            StreamConfig::default(),
            &GlobalMetadata::new(),
            WriteMode::Output,
        );
        assert!(matches!(result, Err(StreamError::Config(_))));

        let ds = MemoryDataset::new();
        let config = StreamConfig {
            timestep_secs: 3600,
            ..StreamConfig::default()
        };
        TimestepWriter::new(
            ds.clone(),
            "memory",
            &tiny_geographic_grid(),
            hourly_axis(3),
            config,
            &GlobalMetadata::new(),
            WriteMode::Output,
        )
        .unwrap();
        assert_eq!(ds.get_values("time").unwrap(), vec![0.0, 3600.0, 7200.0]);
    }

    #[test]
    fn test_least_significant_digit() {
        let ds = MemoryDataset::new();
        let config = StreamConfig {
            least_significant_digit: Some(1),
            ..StreamConfig::default()
        };
        let mut w = TimestepWriter::new(
            ds.clone(),
            "memory",
            &tiny_geographic_grid(),
            daily_axis(1),
            config,
            &GlobalMetadata::new(),
            WriteMode::Output,
        )
        .unwrap();
        let raster = Raster::new(2, 2, vec![0.123, 1.0, f64::NAN, 2.56]).unwrap();
        w.write(1, "P", "mm", "P", &raster).unwrap();

        let stored = ds.get_steps("P", 0, 1).unwrap();
        // 1 digit -> 4 bits -> steps of 1/16
        assert_eq!(stored, vec![0.125, 1.0, -9999.0, 2.5625]);
        assert_eq!(
            ds.attribute(Some("P"), "least_significant_digit").unwrap().as_f64(),
            Some(1.0)
        );
    }

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(3.14159, 2), 3.140625);
        assert_eq!(quantize(-1.0, 3), -1.0);
    }
}
