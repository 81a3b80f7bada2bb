//! Native NetCDF backend using the netcdf library.
//!
//! Files are held open for the lifetime of a stream. Writers get a mutable
//! handle and `sync` flushes it to disk; `close` releases it and reports any
//! error raised while closing.
//!
//! Classic-model files do not switch between define and data mode on their
//! own, so the dataset tracks the mode and switches before each call.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Once;

use tracing::{debug, error};

use crate::config::FileFormat;
use crate::dataset::{AttrValue, GridDataset, ValueKind, VariableSpec};
use crate::error::{StreamError, StreamResult};

/// Silence HDF5's automatic error printing to stderr.
///
/// The HDF5 C library prints verbose error messages to stderr even when errors
/// are handled gracefully by the Rust code (e.g., when checking for optional
/// attributes that don't exist). This creates confusing log spam like:
///
/// ```text
/// HDF5-DIAG: Error detected in HDF5 (1.10.8) thread 3:
///   #003: ../../../src/H5Adense.c line 397 in H5A__dense_open(): can't locate attribute in name index
/// ```
///
/// This function disables that output by calling H5Eset_auto2 with null handlers.
/// It only needs to be called once per process, but is safe to call multiple times.
pub fn silence_hdf5_errors() {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        // SAFETY: H5Eset_auto2 is thread-safe and we're passing null pointers
        // to disable error output, which is a documented valid use.
        unsafe {
            hdf5_metno_sys::h5e::H5Eset_auto2(
                hdf5_metno_sys::h5e::H5E_DEFAULT,
                None,
                std::ptr::null_mut(),
            );
        }
    });
}

enum Handle {
    Read(netcdf::File),
    Write(netcdf::FileMut),
}

/// A NetCDF file on disk.
pub struct NetcdfDataset {
    path: PathBuf,
    handle: Option<Handle>,
    /// Element types of variables seen so far
    kinds: HashMap<String, ValueKind>,
    /// Classic-model file needing explicit define/data mode switches
    classic: bool,
    in_define: bool,
}

impl std::fmt::Debug for NetcdfDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetcdfDataset")
            .field("path", &self.path)
            .field("open", &self.handle.is_some())
            .field("classic", &self.classic)
            .finish()
    }
}

impl NetcdfDataset {
    /// Create a new file, replacing any existing one.
    pub fn create(path: impl AsRef<Path>, format: FileFormat) -> StreamResult<Self> {
        silence_hdf5_errors();
        let path = path.as_ref().to_path_buf();
        let options = match format {
            FileFormat::Netcdf4 => netcdf::Options::NETCDF4,
            FileFormat::Netcdf4Classic => netcdf::Options::NETCDF4 | netcdf::Options::CLASSIC,
        };
        let file = netcdf::create_with(&path, options)?;
        debug!(path = %path.display(), format = %format, "Created NetCDF file");
        Ok(Self {
            path,
            handle: Some(Handle::Write(file)),
            kinds: HashMap::new(),
            classic: format == FileFormat::Netcdf4Classic,
            // New files start in define mode
            in_define: true,
        })
    }

    /// Open an existing file read-only.
    pub fn open(path: impl AsRef<Path>) -> StreamResult<Self> {
        silence_hdf5_errors();
        let path = Self::existing(path.as_ref())?;
        let file = netcdf::open(&path)?;
        Ok(Self {
            path,
            handle: Some(Handle::Read(file)),
            kinds: HashMap::new(),
            classic: false,
            in_define: false,
        })
    }

    fn existing(path: &Path) -> StreamResult<PathBuf> {
        if path.exists() {
            Ok(path.to_path_buf())
        } else {
            error!(path = %path.display(), "Input file not found");
            Err(StreamError::MissingInput(path.to_path_buf()))
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Enter define mode before adding dimensions, variables or attributes.
    fn define_mode(&mut self) -> StreamResult<()> {
        if self.classic && !self.in_define {
            self.file_mut()?.redef()?;
            self.in_define = true;
        }
        Ok(())
    }

    /// Leave define mode before writing or syncing data.
    fn data_mode(&mut self) -> StreamResult<()> {
        if self.classic && self.in_define {
            self.file_mut()?.enddef()?;
            self.in_define = false;
        }
        Ok(())
    }

    fn file(&self) -> StreamResult<&netcdf::File> {
        match &self.handle {
            Some(Handle::Read(f)) => Ok(f),
            Some(Handle::Write(f)) => Ok(&**f),
            None => Err(StreamError::Finished),
        }
    }

    fn file_mut(&mut self) -> StreamResult<&mut netcdf::FileMut> {
        match &mut self.handle {
            Some(Handle::Write(f)) => Ok(f),
            Some(Handle::Read(_)) => Err(StreamError::InvalidFormat(format!(
                "{} is opened read-only",
                self.path.display()
            ))),
            None => Err(StreamError::Finished),
        }
    }

    fn variable(&self, name: &str) -> StreamResult<netcdf::Variable<'_>> {
        self.file()?
            .variable(name)
            .ok_or_else(|| StreamError::MissingData(format!("variable '{}'", name)))
    }

    /// Element type of a variable, taken from its fill value when not
    /// created through this handle.
    fn kind_of(&self, name: &str) -> StreamResult<ValueKind> {
        if let Some(kind) = self.kinds.get(name) {
            return Ok(*kind);
        }
        let var = self.variable(name)?;
        let kind = if has_attr(&var, "_FillValue") {
            match var.attribute_value("_FillValue").and_then(|v| v.ok()) {
                Some(netcdf::AttributeValue::Double(_)) => ValueKind::F64,
                Some(netcdf::AttributeValue::Schar(_)) => ValueKind::Byte,
                _ => ValueKind::F32,
            }
        } else {
            ValueKind::F32
        };
        Ok(kind)
    }

    fn first_dim_len(var: &netcdf::Variable, name: &str) -> StreamResult<(usize, usize)> {
        let dims = var.dimensions();
        match dims.len() {
            1 | 3 => Ok((dims.len(), dims[0].len())),
            n => Err(StreamError::InvalidFormat(format!(
                "'{}' has {} dimensions, expected 1 or 3",
                name, n
            ))),
        }
    }
}

impl GridDataset for NetcdfDataset {
    fn add_dimension(&mut self, name: &str, len: Option<usize>) -> StreamResult<()> {
        self.define_mode()?;
        let file = self.file_mut()?;
        match len {
            Some(n) => file.add_dimension(name, n)?,
            None => file.add_unlimited_dimension(name)?,
        };
        Ok(())
    }

    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.file().ok()?.dimension(name).map(|d| d.len())
    }

    fn add_variable(&mut self, spec: &VariableSpec) -> StreamResult<()> {
        self.define_mode()?;
        let dims: Vec<&str> = spec.dims.iter().map(String::as_str).collect();
        let file = self.file_mut()?;
        let mut var = match spec.kind {
            ValueKind::F32 => file.add_variable::<f32>(&spec.name, &dims)?,
            ValueKind::F64 => file.add_variable::<f64>(&spec.name, &dims)?,
            ValueKind::Byte => file.add_variable::<i8>(&spec.name, &dims)?,
        };

        if let Some(level) = spec.compression {
            var.set_compression(level as i32, true)?;
        }
        if let Some(chunks) = &spec.chunking {
            var.set_chunking(chunks)?;
        }
        if let Some(fill) = spec.fill_value {
            match spec.kind {
                ValueKind::F32 => var.set_fill_value(fill as f32)?,
                ValueKind::F64 => var.set_fill_value(fill)?,
                ValueKind::Byte => var.set_fill_value(fill as i8)?,
            }
        }

        self.kinds.insert(spec.name.clone(), spec.kind);
        Ok(())
    }

    fn has_variable(&self, name: &str) -> bool {
        self.file()
            .map(|f| f.variable(name).is_some())
            .unwrap_or(false)
    }

    fn variable_dims(&self, name: &str) -> Option<Vec<String>> {
        let var = self.variable(name).ok()?;
        Some(var.dimensions().iter().map(|d| d.name().to_string()).collect())
    }

    fn put_attribute(
        &mut self,
        variable: Option<&str>,
        name: &str,
        value: AttrValue,
    ) -> StreamResult<()> {
        self.define_mode()?;
        let file = self.file_mut()?;
        match variable {
            Some(var_name) => {
                let mut var = file
                    .variable_mut(var_name)
                    .ok_or_else(|| StreamError::MissingData(format!("variable '{}'", var_name)))?;
                match value {
                    AttrValue::Str(s) => var.put_attribute(name, s.as_str())?,
                    AttrValue::Int(v) => var.put_attribute(name, v)?,
                    AttrValue::Float(v) => var.put_attribute(name, v)?,
                    AttrValue::Double(v) => var.put_attribute(name, v)?,
                };
            }
            None => {
                match value {
                    AttrValue::Str(s) => file.add_attribute(name, s.as_str())?,
                    AttrValue::Int(v) => file.add_attribute(name, v)?,
                    AttrValue::Float(v) => file.add_attribute(name, v)?,
                    AttrValue::Double(v) => file.add_attribute(name, v)?,
                };
            }
        }
        Ok(())
    }

    fn attribute(&self, variable: Option<&str>, name: &str) -> Option<AttrValue> {
        let value = match variable {
            Some(var_name) => {
                let var = self.variable(var_name).ok()?;
                if !has_attr(&var, name) {
                    return None;
                }
                var.attribute_value(name)?.ok()?
            }
            None => {
                let file = self.file().ok()?;
                if !file.attributes().any(|a| a.name() == name) {
                    return None;
                }
                file.attribute(name)?.value().ok()?
            }
        };
        convert_attr(value)
    }

    fn put_values(&mut self, variable: &str, values: &[f64]) -> StreamResult<()> {
        self.data_mode()?;
        let kind = self.kind_of(variable)?;
        let mut var = self
            .file_mut()?
            .variable_mut(variable)
            .ok_or_else(|| StreamError::MissingData(format!("variable '{}'", variable)))?;
        match kind {
            ValueKind::F32 => {
                let data: Vec<f32> = values.iter().map(|&v| v as f32).collect();
                var.put_values(&data, ..)?;
            }
            ValueKind::F64 => var.put_values(values, ..)?,
            ValueKind::Byte => {
                let data: Vec<i8> = values.iter().map(|&v| v as i8).collect();
                var.put_values(&data, ..)?;
            }
        }
        Ok(())
    }

    fn get_values(&self, variable: &str) -> StreamResult<Vec<f64>> {
        let var = self.variable(variable)?;
        match self.kind_of(variable)? {
            ValueKind::F64 => Ok(var.get_values::<f64, _>(..)?),
            ValueKind::F32 => Ok(var
                .get_values::<f32, _>(..)?
                .into_iter()
                .map(f64::from)
                .collect()),
            ValueKind::Byte => Ok(var
                .get_values::<i8, _>(..)?
                .into_iter()
                .map(f64::from)
                .collect()),
        }
    }

    fn put_steps(
        &mut self,
        variable: &str,
        start: usize,
        count: usize,
        values: &[f64],
    ) -> StreamResult<()> {
        self.data_mode()?;
        let kind = self.kind_of(variable)?;
        let ndims = Self::first_dim_len(&self.variable(variable)?, variable)?.0;
        let mut var = self
            .file_mut()?
            .variable_mut(variable)
            .ok_or_else(|| StreamError::MissingData(format!("variable '{}'", variable)))?;
        let range = start..start + count;

        match (kind, ndims) {
            (ValueKind::F64, 1) => var.put_values(values, range)?,
            (ValueKind::F64, _) => var.put_values(values, (range, .., ..))?,
            (_, 1) => {
                let data: Vec<f32> = values.iter().map(|&v| v as f32).collect();
                var.put_values(&data, range)?;
            }
            _ => {
                let data: Vec<f32> = values.iter().map(|&v| v as f32).collect();
                var.put_values(&data, (range, .., ..))?;
            }
        }
        Ok(())
    }

    fn get_steps(&self, variable: &str, start: usize, count: usize) -> StreamResult<Vec<f64>> {
        let var = self.variable(variable)?;
        let (ndims, len) = Self::first_dim_len(&var, variable)?;
        if start + count > len {
            return Err(StreamError::InvalidFormat(format!(
                "steps {}..{} exceed dimension length {} of '{}'",
                start,
                start + count,
                len,
                variable
            )));
        }
        let range = start..start + count;

        let values = match (self.kind_of(variable)?, ndims) {
            (ValueKind::F64, 1) => var.get_values::<f64, _>(range)?,
            (ValueKind::F64, _) => var.get_values::<f64, _>((range, .., ..))?,
            (_, 1) => widen(var.get_values::<f32, _>(range)?),
            _ => widen(var.get_values::<f32, _>((range, .., ..))?),
        };
        Ok(values)
    }

    fn sync(&mut self) -> StreamResult<()> {
        self.data_mode()?;
        match &self.handle {
            Some(Handle::Write(file)) => file.sync()?,
            Some(Handle::Read(_)) => {}
            None => return Err(StreamError::Finished),
        }
        Ok(())
    }

    fn close(&mut self) -> StreamResult<()> {
        match self.handle.take() {
            Some(Handle::Write(file)) => file.close()?,
            Some(Handle::Read(file)) => file.close()?,
            None => return Ok(()),
        }
        debug!(path = %self.path.display(), "Closed NetCDF file");
        Ok(())
    }
}

fn widen(values: Vec<f32>) -> Vec<f64> {
    values.into_iter().map(f64::from).collect()
}

/// Check if a variable has an attribute with the given name.
/// This avoids HDF5 error spam when checking for optional attributes.
fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn convert_attr(value: netcdf::AttributeValue) -> Option<AttrValue> {
    use netcdf::AttributeValue as V;
    match value {
        V::Str(s) => Some(AttrValue::Str(s)),
        V::Schar(v) => Some(AttrValue::Int(v as i32)),
        V::Uchar(v) => Some(AttrValue::Int(v as i32)),
        V::Short(v) => Some(AttrValue::Int(v as i32)),
        V::Int(v) => Some(AttrValue::Int(v)),
        V::Float(v) => Some(AttrValue::Float(v)),
        V::Double(v) => Some(AttrValue::Double(v)),
        _ => None,
    }
}
