//! In-process dataset backend.
//!
//! Holds the whole file in memory. Clones share state, so a test can hand one
//! handle to a writer and inspect the data and write log through another.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::dataset::{AttrValue, GridDataset, ValueKind, VariableSpec};
use crate::error::{StreamError, StreamResult};

/// One `put_steps` call as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRecord {
    pub variable: String,
    pub start: usize,
    pub count: usize,
}

#[derive(Debug)]
struct MemVariable {
    dims: Vec<String>,
    kind: ValueKind,
    data: Vec<f64>,
    attributes: BTreeMap<String, AttrValue>,
}

#[derive(Debug, Default)]
struct MemState {
    /// Dimension name to (length, unlimited)
    dimensions: HashMap<String, (usize, bool)>,
    variables: BTreeMap<String, MemVariable>,
    globals: BTreeMap<String, AttrValue>,
    puts: Vec<PutRecord>,
    syncs: usize,
    closes: usize,
}

impl MemState {
    fn variable(&self, name: &str) -> StreamResult<&MemVariable> {
        self.variables
            .get(name)
            .ok_or_else(|| StreamError::MissingData(format!("variable '{}'", name)))
    }

    fn dim_len(&self, name: &str) -> usize {
        self.dimensions.get(name).map(|d| d.0).unwrap_or(0)
    }

    /// Number of values in one step of a variable.
    fn step_size(&self, var: &MemVariable) -> usize {
        var.dims.iter().skip(1).map(|d| self.dim_len(d)).product()
    }

    fn fill(var: &MemVariable) -> f64 {
        var.attributes
            .get("_FillValue")
            .and_then(AttrValue::as_f64)
            .unwrap_or(f64::NAN)
    }
}

/// Dataset kept entirely in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryDataset {
    state: Arc<Mutex<MemState>>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Every `put_steps` call made so far, in order.
    pub fn put_log(&self) -> Vec<PutRecord> {
        self.lock().puts.clone()
    }

    /// `put_steps` calls made for one variable.
    pub fn puts_for(&self, variable: &str) -> Vec<PutRecord> {
        self.lock()
            .puts
            .iter()
            .filter(|p| p.variable == variable)
            .cloned()
            .collect()
    }

    /// Number of `sync` calls made so far.
    pub fn sync_count(&self) -> usize {
        self.lock().syncs
    }

    /// Number of `close` calls made so far.
    ///
    /// Closing only records the call; other clones can still read the data.
    pub fn close_count(&self) -> usize {
        self.lock().closes
    }

    /// Names of all variables.
    pub fn variable_names(&self) -> Vec<String> {
        self.lock().variables.keys().cloned().collect()
    }

    /// Names of all global attributes.
    pub fn global_attribute_names(&self) -> Vec<String> {
        self.lock().globals.keys().cloned().collect()
    }
}

impl GridDataset for MemoryDataset {
    fn add_dimension(&mut self, name: &str, len: Option<usize>) -> StreamResult<()> {
        let mut state = self.lock();
        if state.dimensions.contains_key(name) {
            return Err(StreamError::InvalidFormat(format!(
                "dimension '{}' already exists",
                name
            )));
        }
        state
            .dimensions
            .insert(name.to_string(), (len.unwrap_or(0), len.is_none()));
        Ok(())
    }

    fn dimension_len(&self, name: &str) -> Option<usize> {
        self.lock().dimensions.get(name).map(|d| d.0)
    }

    fn add_variable(&mut self, spec: &VariableSpec) -> StreamResult<()> {
        let mut state = self.lock();
        if state.variables.contains_key(&spec.name) {
            return Err(StreamError::InvalidFormat(format!(
                "variable '{}' already exists",
                spec.name
            )));
        }
        for dim in &spec.dims {
            if !state.dimensions.contains_key(dim) {
                return Err(StreamError::MissingData(format!("dimension '{}'", dim)));
            }
        }
        if let Some((pos, _)) = spec
            .dims
            .iter()
            .enumerate()
            .find(|(i, d)| *i > 0 && state.dimensions.get(*d).map(|x| x.1).unwrap_or(false))
        {
            return Err(StreamError::InvalidFormat(format!(
                "unlimited dimension '{}' must come first",
                spec.dims[pos]
            )));
        }

        let mut attributes = BTreeMap::new();
        let fill = spec.fill_value.unwrap_or(f64::NAN);
        if let Some(fill) = spec.fill_value {
            let value = match spec.kind {
                ValueKind::F32 => AttrValue::Float(fill as f32),
                ValueKind::F64 => AttrValue::Double(fill),
                ValueKind::Byte => AttrValue::Int(fill as i32),
            };
            attributes.insert("_FillValue".to_string(), value);
        }

        let fixed_len: usize = spec.dims.iter().map(|d| state.dim_len(d)).product();
        let data = vec![fill; if spec.dims.is_empty() { 1 } else { fixed_len }];

        state.variables.insert(
            spec.name.clone(),
            MemVariable {
                dims: spec.dims.clone(),
                kind: spec.kind,
                data,
                attributes,
            },
        );
        Ok(())
    }

    fn has_variable(&self, name: &str) -> bool {
        self.lock().variables.contains_key(name)
    }

    fn variable_dims(&self, name: &str) -> Option<Vec<String>> {
        self.lock().variables.get(name).map(|v| v.dims.clone())
    }

    fn put_attribute(
        &mut self,
        variable: Option<&str>,
        name: &str,
        value: AttrValue,
    ) -> StreamResult<()> {
        let mut state = self.lock();
        match variable {
            Some(var) => {
                let entry = state
                    .variables
                    .get_mut(var)
                    .ok_or_else(|| StreamError::MissingData(format!("variable '{}'", var)))?;
                entry.attributes.insert(name.to_string(), value);
            }
            None => {
                state.globals.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    fn attribute(&self, variable: Option<&str>, name: &str) -> Option<AttrValue> {
        let state = self.lock();
        match variable {
            Some(var) => state.variables.get(var)?.attributes.get(name).cloned(),
            None => state.globals.get(name).cloned(),
        }
    }

    fn put_values(&mut self, variable: &str, values: &[f64]) -> StreamResult<()> {
        let (step, first_dim) = {
            let state = self.lock();
            let var = state.variable(variable)?;
            (state.step_size(var), var.dims.first().cloned())
        };
        match first_dim {
            Some(_) if step > 0 && values.len() % step == 0 => {
                self.put_steps(variable, 0, values.len() / step, values)
            }
            _ => Err(StreamError::InvalidFormat(format!(
                "cannot write {} values to '{}'",
                values.len(),
                variable
            ))),
        }
    }

    fn get_values(&self, variable: &str) -> StreamResult<Vec<f64>> {
        let state = self.lock();
        let var = state.variable(variable)?;
        let total: usize = var.dims.iter().map(|d| state.dim_len(d)).product();
        let fill = MemState::fill(var);
        let mut out: Vec<f64> = var.data.iter().copied().take(total).collect();
        out.resize(total, fill);
        Ok(out)
    }

    fn put_steps(
        &mut self,
        variable: &str,
        start: usize,
        count: usize,
        values: &[f64],
    ) -> StreamResult<()> {
        let mut state = self.lock();
        let (step, first_dim, kind, fill) = {
            let var = state.variable(variable)?;
            let first = var
                .dims
                .first()
                .cloned()
                .ok_or_else(|| StreamError::InvalidFormat(format!("'{}' is a scalar", variable)))?;
            (state.step_size(var), first, var.kind, MemState::fill(var))
        };

        if values.len() != count * step {
            return Err(StreamError::InvalidFormat(format!(
                "expected {} values for {} steps of '{}', got {}",
                count * step,
                count,
                variable,
                values.len()
            )));
        }

        let end = start + count;
        let (len, unlimited) = state.dimensions.get(&first_dim).copied().unwrap_or((0, false));
        if end > len {
            if unlimited {
                state.dimensions.insert(first_dim, (end, true));
            } else {
                return Err(StreamError::InvalidFormat(format!(
                    "steps {}..{} exceed dimension length {} of '{}'",
                    start, end, len, variable
                )));
            }
        }

        if let Some(var) = state.variables.get_mut(variable) {
            if var.data.len() < end * step {
                var.data.resize(end * step, fill);
            }
            for (slot, v) in var.data[start * step..end * step].iter_mut().zip(values) {
                *slot = kind.quantize(*v);
            }
        }

        state.puts.push(PutRecord {
            variable: variable.to_string(),
            start,
            count,
        });
        Ok(())
    }

    fn get_steps(&self, variable: &str, start: usize, count: usize) -> StreamResult<Vec<f64>> {
        let state = self.lock();
        let var = state.variable(variable)?;
        let first = var
            .dims
            .first()
            .ok_or_else(|| StreamError::InvalidFormat(format!("'{}' is a scalar", variable)))?;
        let len = state.dim_len(first);
        if start + count > len {
            return Err(StreamError::InvalidFormat(format!(
                "steps {}..{} exceed dimension length {} of '{}'",
                start,
                start + count,
                len,
                variable
            )));
        }

        let step = state.step_size(var);
        let fill = MemState::fill(var);
        Ok((start * step..(start + count) * step)
            .map(|i| var.data.get(i).copied().unwrap_or(fill))
            .collect())
    }

    fn sync(&mut self) -> StreamResult<()> {
        self.lock().syncs += 1;
        Ok(())
    }

    fn close(&mut self) -> StreamResult<()> {
        self.lock().closes += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset_with_series() -> MemoryDataset {
        let mut ds = MemoryDataset::new();
        ds.add_dimension("time", None).unwrap();
        ds.add_dimension("lat", Some(2)).unwrap();
        ds.add_dimension("lon", Some(2)).unwrap();
        ds.add_variable(
            &VariableSpec::new("P", &["time", "lat", "lon"], ValueKind::F32).fill_value(-9999.0),
        )
        .unwrap();
        ds
    }

    #[test]
    fn test_unlimited_dimension_grows() {
        let mut ds = dataset_with_series();
        assert_eq!(ds.dimension_len("time"), Some(0));
        ds.put_steps("P", 1, 2, &[1.0; 8]).unwrap();
        assert_eq!(ds.dimension_len("time"), Some(3));

        // Unwritten step reads back as fill
        let first = ds.get_steps("P", 0, 1).unwrap();
        assert_eq!(first, vec![-9999.0; 4]);
        assert_eq!(ds.get_steps("P", 2, 1).unwrap(), vec![1.0; 4]);
    }

    #[test]
    fn test_fixed_dimension_bounds() {
        let mut ds = MemoryDataset::new();
        ds.add_dimension("lat", Some(2)).unwrap();
        ds.add_variable(&VariableSpec::new("lat", &["lat"], ValueKind::F32))
            .unwrap();
        ds.put_values("lat", &[52.5, 51.5]).unwrap();
        assert_eq!(ds.get_values("lat").unwrap(), vec![52.5, 51.5]);
        assert!(ds.put_steps("lat", 1, 2, &[0.0, 0.0]).is_err());
    }

    #[test]
    fn test_values_are_stored_at_declared_precision() {
        let mut ds = dataset_with_series();
        ds.put_steps("P", 0, 1, &[0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(ds.get_steps("P", 0, 1).unwrap()[0], 0.1f32 as f64);
    }

    #[test]
    fn test_unlimited_must_be_first() {
        let mut ds = dataset_with_series();
        let spec = VariableSpec::new("bad", &["lat", "time"], ValueKind::F32);
        assert!(ds.add_variable(&spec).is_err());
    }

    #[test]
    fn test_clones_share_state() {
        let ds = dataset_with_series();
        let mut writer = ds.clone();
        writer.put_steps("P", 0, 1, &[1.0; 4]).unwrap();
        writer.sync().unwrap();
        assert_eq!(ds.sync_count(), 1);
        assert_eq!(
            ds.put_log(),
            vec![PutRecord {
                variable: "P".to_string(),
                start: 0,
                count: 1
            }]
        );
    }

    #[test]
    fn test_close_keeps_clones_readable() {
        let ds = dataset_with_series();
        let mut writer = ds.clone();
        writer.put_steps("P", 0, 1, &[2.0; 4]).unwrap();
        writer.close().unwrap();
        writer.close().unwrap();
        assert_eq!(ds.close_count(), 2);
        assert_eq!(ds.get_steps("P", 0, 1).unwrap(), vec![2.0; 4]);
    }

    #[test]
    fn test_attributes_and_fill() {
        let mut ds = dataset_with_series();
        ds.put_attribute(Some("P"), "units", "mm".into()).unwrap();
        ds.put_attribute(None, "title", "run".into()).unwrap();
        assert_eq!(ds.attribute(Some("P"), "units"), Some(AttrValue::from("mm")));
        assert_eq!(ds.attribute(None, "title").unwrap().as_str(), Some("run"));
        assert_eq!(ds.fill_value("P"), Some(-9999.0));
        assert!(ds.put_attribute(Some("Q"), "units", "mm".into()).is_err());
    }

    #[test]
    fn test_read_past_end_fails() {
        let mut ds = dataset_with_series();
        ds.put_steps("P", 0, 2, &[0.0; 8]).unwrap();
        assert!(ds.get_steps("P", 1, 2).is_err());
    }
}
