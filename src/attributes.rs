//! Session attribute mapping

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::hash_map::{self, HashMap};

use crate::error::Result;

/// Attribute name to JSON value mapping held by a session.
///
/// Serialized as a plain JSON object; that object is the blob written to
/// both the cache and the durable store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes {
    values: HashMap<String, Value>,
}

impl Attributes {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a value, converted to `T`. None if missing or of another shape.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.values
            .get(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get the raw JSON value
    pub fn get_value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Set a value. Fails if `value` has no JSON representation.
    pub fn set<T: Serialize>(&mut self, name: &str, value: T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.values.insert(name.to_string(), value);
        Ok(())
    }

    /// Insert a raw JSON value, returning the previous one
    pub fn insert<S: Into<String>>(&mut self, name: S, value: Value) -> Option<Value> {
        self.values.insert(name.into(), value)
    }

    /// Remove a value
    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.values.remove(name)
    }

    /// Check if an attribute exists
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Remove every attribute
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Number of attributes
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if there are no attributes
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over name/value pairs
    pub fn iter(&self) -> hash_map::Iter<'_, String, Value> {
        self.values.iter()
    }

    /// Copy every entry of `other` in, overwriting on conflict
    pub fn merge(&mut self, other: Attributes) {
        self.values.extend(other.values);
    }

    /// Encode as a JSON object
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.values)?)
    }

    /// Decode from a JSON object
    pub fn from_json(blob: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(blob)?)
    }
}

impl From<HashMap<String, Value>> for Attributes {
    fn from(values: HashMap<String, Value>) -> Self {
        Self { values }
    }
}

impl FromIterator<(String, Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Attributes {
    type Item = (String, Value);
    type IntoIter = hash_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
