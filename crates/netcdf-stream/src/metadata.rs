//! Global attributes written to every output file.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::StreamResult;

/// Global (file-level) attributes.
///
/// The baseline set is built fresh for every stream and never shared, so
/// metadata supplied for one file cannot leak into the next.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlobalMetadata {
    attributes: BTreeMap<String, String>,
}

impl GlobalMetadata {
    /// An empty attribute set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attributes every output file carries unless overridden.
    pub fn baseline() -> Self {
        Self::new()
            .with("title", "gridstream output mapstack")
            .with("institution", "gridstream")
            .with("source", "gridstream")
            .with("history", Utc::now().format("%a %b %e %H:%M:%S %Y").to_string())
            .with("references", "https://cfconventions.org/")
            .with("Conventions", "CF-1.4")
    }

    /// Parse caller metadata from a JSON object of attribute names to values.
    ///
    /// Non-string values are stored in their JSON text form.
    pub fn from_json(json: &str) -> StreamResult<Self> {
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)?;
        let attributes = raw
            .into_iter()
            .map(|(k, v)| {
                let value = match v {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                (k, value)
            })
            .collect();
        Ok(Self { attributes })
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Combine with caller metadata; the caller's value wins on collision.
    pub fn merged(&self, caller: &GlobalMetadata) -> GlobalMetadata {
        let mut attributes = self.attributes.clone();
        for (k, v) in &caller.attributes {
            attributes.insert(k.clone(), v.clone());
        }
        GlobalMetadata { attributes }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for GlobalMetadata {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            attributes: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}
