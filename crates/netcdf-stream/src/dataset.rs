//! Storage seam between the stream logic and the grid-file engine.
//!
//! Streams only ever address a variable by name and slice it along its first
//! (time) dimension, so the trait is deliberately narrow. Values cross the
//! seam as `f64`; backends convert to the on-disk type.

use std::fmt;

use crate::error::StreamResult;

/// On-disk element type of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    F32,
    F64,
    Byte,
}

impl ValueKind {
    /// Round a value to what the backing type can hold.
    pub fn quantize(&self, value: f64) -> f64 {
        match self {
            Self::F32 => value as f32 as f64,
            Self::F64 => value,
            Self::Byte => value as i8 as f64,
        }
    }
}

/// Definition of a new variable.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    pub dims: Vec<String>,
    pub kind: ValueKind,
    pub fill_value: Option<f64>,
    /// Deflate level, `None` for uncompressed
    pub compression: Option<u8>,
    pub chunking: Option<Vec<usize>>,
}

impl VariableSpec {
    pub fn new(name: impl Into<String>, dims: &[&str], kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            dims: dims.iter().map(|d| d.to_string()).collect(),
            kind,
            fill_value: None,
            compression: None,
            chunking: None,
        }
    }

    pub fn fill_value(mut self, fill: f64) -> Self {
        self.fill_value = Some(fill);
        self
    }

    pub fn compression(mut self, level: Option<u8>) -> Self {
        self.compression = level;
        self
    }

    pub fn chunking(mut self, chunks: Vec<usize>) -> Self {
        self.chunking = Some(chunks);
        self
    }
}

/// Attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Str(String),
    Int(i32),
    Float(f32),
    Double(f64),
}

impl AttrValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value, if any.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Str(_) => None,
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v as f64),
            Self::Double(v) => Some(*v),
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<i32> for AttrValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for AttrValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

/// A dimensioned grid file.
///
/// "Steps" are slabs along a variable's first dimension: `put_steps` with
/// `start = 3, count = 2` on a `(time, y, x)` variable covers
/// `[3..5, :, :]`.
pub trait GridDataset {
    /// Create a dimension; `None` makes it unlimited.
    fn add_dimension(&mut self, name: &str, len: Option<usize>) -> StreamResult<()>;

    /// Current length of a dimension.
    fn dimension_len(&self, name: &str) -> Option<usize>;

    fn add_variable(&mut self, spec: &VariableSpec) -> StreamResult<()>;

    fn has_variable(&self, name: &str) -> bool;

    /// Dimension names of a variable, in order.
    fn variable_dims(&self, name: &str) -> Option<Vec<String>>;

    /// Set an attribute on a variable, or a global attribute when `variable`
    /// is `None`.
    fn put_attribute(
        &mut self,
        variable: Option<&str>,
        name: &str,
        value: AttrValue,
    ) -> StreamResult<()>;

    fn attribute(&self, variable: Option<&str>, name: &str) -> Option<AttrValue>;

    /// Write the complete contents of a variable.
    fn put_values(&mut self, variable: &str, values: &[f64]) -> StreamResult<()>;

    /// Read the complete contents of a variable.
    fn get_values(&self, variable: &str) -> StreamResult<Vec<f64>>;

    /// Write `count` consecutive steps starting at `start`.
    fn put_steps(
        &mut self,
        variable: &str,
        start: usize,
        count: usize,
        values: &[f64],
    ) -> StreamResult<()>;

    /// Read `count` consecutive steps starting at `start`.
    fn get_steps(&self, variable: &str, start: usize, count: usize) -> StreamResult<Vec<f64>>;

    /// Make everything written so far durable.
    fn sync(&mut self) -> StreamResult<()>;

    /// Release the underlying file, reporting errors raised while closing.
    /// Closing twice is a no-op.
    fn close(&mut self) -> StreamResult<()>;

    /// Fill value of a variable, if one is set.
    fn fill_value(&self, variable: &str) -> Option<f64> {
        self.attribute(Some(variable), "_FillValue")
            .and_then(|v| v.as_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize() {
        assert_eq!(ValueKind::F64.quantize(0.1), 0.1);
        assert_eq!(ValueKind::F32.quantize(0.1), 0.1f32 as f64);
        assert_eq!(ValueKind::F32.quantize(-9999.0), -9999.0);
    }

    #[test]
    fn test_spec_builder() {
        let spec = VariableSpec::new("P", &["time", "lat", "lon"], ValueKind::F32)
            .fill_value(-9999.0)
            .compression(Some(9))
            .chunking(vec![1, 2, 2]);
        assert_eq!(spec.dims, vec!["time", "lat", "lon"]);
        assert_eq!(spec.fill_value, Some(-9999.0));
        assert_eq!(spec.compression, Some(9));
    }

    #[test]
    fn test_attr_value_conversions() {
        assert_eq!(AttrValue::from("m").as_str(), Some("m"));
        assert_eq!(AttrValue::from(31).as_f64(), Some(31.0));
        assert_eq!(AttrValue::from(-9999.0f32).as_f64(), Some(-9999.0));
        assert_eq!(AttrValue::from("x").as_f64(), None);
        assert_eq!(AttrValue::Double(6378137.0).to_string(), "6378137");
    }
}
