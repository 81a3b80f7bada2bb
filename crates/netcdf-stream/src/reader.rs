//! Timestep readers for forcing files.
//!
//! [`BlockReader`] serves strictly forward single-step reads out of a window
//! of consecutive timesteps per variable, refilling every window at once when
//! a read moves past its end. [`StaticReader`] reads each request straight
//! from the file.

use std::collections::{HashMap, HashSet};
#[cfg(feature = "netcdf")]
use std::path::Path;

use grid_common::Raster;
use tracing::{debug, info, warn};

use crate::config::ReaderConfig;
use crate::dataset::GridDataset;
use crate::error::{StreamError, StreamResult};

/// One timestep of one variable.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSlice {
    pub raster: Raster,
    /// False when the variable is not in the file; `raster` is then all zeros
    pub found: bool,
}

/// Snapshot of the read window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStats {
    /// Window moves since open
    pub refills: usize,
    /// First timestep held, 1-based
    pub window_start: usize,
    /// Timesteps per window
    pub window_depth: usize,
    /// Variables with a loaded window
    pub tracked: usize,
}

#[derive(Debug)]
struct ReadWindow {
    block: Vec<f64>,
    fill: f64,
}

/// Grid layout of an input file.
#[derive(Debug, Clone, Copy)]
struct FileLayout {
    rows: usize,
    cols: usize,
    time_len: usize,
    spatial: [&'static str; 2],
}

impl FileLayout {
    fn inspect<D: GridDataset>(dataset: &D, label: &str) -> StreamResult<Self> {
        let spatial = if dataset.dimension_len("y").is_some() {
            ["y", "x"]
        } else {
            ["lat", "lon"]
        };
        let dim = |name: &str| {
            dataset.dimension_len(name).ok_or_else(|| {
                StreamError::MissingData(format!("dimension '{}' in {}", name, label))
            })
        };
        Ok(Self {
            rows: dim(spatial[0])?,
            cols: dim(spatial[1])?,
            time_len: dim("time")?,
            spatial,
        })
    }

    fn cells(&self) -> usize {
        self.rows * self.cols
    }

    fn check_timestep(&self, timestep: usize) -> StreamResult<usize> {
        if timestep == 0 || timestep > self.time_len {
            return Err(StreamError::TimestepOutOfRange {
                timestep,
                count: self.time_len,
            });
        }
        Ok(timestep - 1)
    }

    /// Fail unless `variable` is laid out as `(time, row, col)` on this grid.
    fn check_variable<D: GridDataset>(&self, dataset: &D, variable: &str) -> StreamResult<()> {
        let dims = dataset
            .variable_dims(variable)
            .ok_or_else(|| StreamError::MissingData(format!("variable '{}'", variable)))?;
        let expected = ["time", self.spatial[0], self.spatial[1]];
        if dims.len() != 3 || dims.iter().zip(expected).any(|(d, e)| d != e) {
            return Err(StreamError::InvalidFormat(format!(
                "variable '{}' has dimensions {:?}, expected {:?}",
                variable, dims, expected
            )));
        }
        Ok(())
    }

    fn zeros(&self) -> GridSlice {
        GridSlice {
            raster: Raster::zeros(self.rows, self.cols),
            found: false,
        }
    }
}

/// Windowed forward reader.
pub struct BlockReader<D: GridDataset> {
    dataset: D,
    label: String,
    layout: FileLayout,
    depth: usize,
    window_start: usize,
    windows: HashMap<String, ReadWindow>,
    missing: HashSet<String>,
    refills: usize,
}

#[cfg(feature = "netcdf")]
impl BlockReader<crate::native::NetcdfDataset> {
    /// Open the NetCDF file at `path` and load the first window of `variables`.
    pub fn open(
        path: impl AsRef<Path>,
        variables: &[&str],
        config: &ReaderConfig,
    ) -> StreamResult<Self> {
        let path = path.as_ref();
        let dataset = crate::native::NetcdfDataset::open(path)?;
        Self::new(dataset, &path.display().to_string(), variables, config)
    }
}

impl<D: GridDataset> BlockReader<D> {
    pub fn new(
        dataset: D,
        label: &str,
        variables: &[&str],
        config: &ReaderConfig,
    ) -> StreamResult<Self> {
        config.validate().map_err(StreamError::Config)?;
        let layout = FileLayout::inspect(&dataset, label)?;
        let depth = config.window_depth(layout.cells());

        info!(
            path = %label,
            steps = layout.time_len,
            rows = layout.rows,
            cols = layout.cols,
            window_steps = depth,
            "Opened grid file for reading"
        );

        let mut reader = Self {
            dataset,
            label: label.to_string(),
            layout,
            depth,
            window_start: 0,
            windows: HashMap::new(),
            missing: HashSet::new(),
            refills: 0,
        };
        for variable in variables {
            if reader.dataset.has_variable(variable) {
                reader.load(variable)?;
            } else {
                reader.mark_missing(variable);
            }
        }
        Ok(reader)
    }

    /// Raster of `variable` at `timestep` (1-based).
    pub fn read(&mut self, timestep: usize, variable: &str) -> StreamResult<GridSlice> {
        let idx = self.layout.check_timestep(timestep)?;

        if self.missing.contains(variable) {
            return Ok(self.layout.zeros());
        }
        if !self.windows.contains_key(variable) && !self.dataset.has_variable(variable) {
            self.mark_missing(variable);
            return Ok(self.layout.zeros());
        }

        if idx < self.window_start {
            return Err(StreamError::BackwardRead {
                timestep,
                window_start: self.window_start + 1,
            });
        }
        if idx >= self.window_start + self.depth {
            self.refill(idx)?;
        }
        if !self.windows.contains_key(variable) {
            self.load(variable)?;
        }

        let window = self
            .windows
            .get(variable)
            .ok_or_else(|| StreamError::MissingData(format!("window for '{}'", variable)))?;
        let cells = self.layout.cells();
        let offset = (idx - self.window_start) * cells;
        let raster = Raster::from_filled(
            self.layout.rows,
            self.layout.cols,
            &window.block[offset..offset + cells],
            window.fill,
        )?;
        Ok(GridSlice {
            raster,
            found: true,
        })
    }

    pub fn stats(&self) -> WindowStats {
        WindowStats {
            refills: self.refills,
            window_start: self.window_start + 1,
            window_depth: self.depth,
            tracked: self.windows.len(),
        }
    }

    /// Number of timesteps in the file.
    pub fn timesteps(&self) -> usize {
        self.layout.time_len
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.layout.rows, self.layout.cols)
    }

    /// Steps in a window starting at `start`, clamped to the time axis.
    fn window_len(&self, start: usize) -> usize {
        self.depth.min(self.layout.time_len - start)
    }

    fn load(&mut self, variable: &str) -> StreamResult<()> {
        self.layout.check_variable(&self.dataset, variable)?;
        let count = self.window_len(self.window_start);
        debug!(variable = %variable, start = self.window_start, count = count, "Loading read window");
        let block = self.dataset.get_steps(variable, self.window_start, count)?;
        let fill = self.dataset.fill_value(variable).unwrap_or(f64::NAN);
        self.windows
            .insert(variable.to_string(), ReadWindow { block, fill });
        Ok(())
    }

    /// Move every window to `start`. Nothing changes unless all reads succeed.
    fn refill(&mut self, start: usize) -> StreamResult<()> {
        let count = self.window_len(start);
        debug!(
            path = %self.label,
            start = start,
            count = count,
            variables = self.windows.len(),
            "Refilling read windows"
        );
        let mut blocks = Vec::with_capacity(self.windows.len());
        for name in self.windows.keys() {
            blocks.push((name.clone(), self.dataset.get_steps(name, start, count)?));
        }

        for (name, block) in blocks {
            if let Some(window) = self.windows.get_mut(&name) {
                window.block = block;
            }
        }
        self.window_start = start;
        self.refills += 1;
        Ok(())
    }

    fn mark_missing(&mut self, variable: &str) {
        if self.missing.insert(variable.to_string()) {
            warn!(path = %self.label, variable = %variable, "Variable not found in input, returning zeros");
        }
    }
}

/// Unbuffered reader returning `[t-1, :, :]` per request.
pub struct StaticReader<D: GridDataset> {
    dataset: D,
    label: String,
    layout: FileLayout,
    missing: HashSet<String>,
}

#[cfg(feature = "netcdf")]
impl StaticReader<crate::native::NetcdfDataset> {
    pub fn open(path: impl AsRef<Path>) -> StreamResult<Self> {
        let path = path.as_ref();
        let dataset = crate::native::NetcdfDataset::open(path)?;
        Self::new(dataset, &path.display().to_string())
    }
}

impl<D: GridDataset> StaticReader<D> {
    pub fn new(dataset: D, label: &str) -> StreamResult<Self> {
        let layout = FileLayout::inspect(&dataset, label)?;
        info!(path = %label, steps = layout.time_len, "Opened grid file for direct reads");
        Ok(Self {
            dataset,
            label: label.to_string(),
            layout,
            missing: HashSet::new(),
        })
    }

    pub fn read(&mut self, timestep: usize, variable: &str) -> StreamResult<GridSlice> {
        let idx = self.layout.check_timestep(timestep)?;
        if !self.dataset.has_variable(variable) {
            if self.missing.insert(variable.to_string()) {
                warn!(path = %self.label, variable = %variable, "Variable not found in input, returning zeros");
            }
            return Ok(self.layout.zeros());
        }
        self.layout.check_variable(&self.dataset, variable)?;

        let values = self.dataset.get_steps(variable, idx, 1)?;
        let fill = self.dataset.fill_value(variable).unwrap_or(f64::NAN);
        let raster = Raster::from_filled(self.layout.rows, self.layout.cols, &values, fill)?;
        Ok(GridSlice {
            raster,
            found: true,
        })
    }

    pub fn timesteps(&self) -> usize {
        self.layout.time_len
    }
}
