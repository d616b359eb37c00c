//! Per-call options passed to backend operations.
//!
//! Most backend operations accept an [`Options`] map of backend-specific query
//! parameters (e.g. `include_docs`, `since`, `descending`). The contract treats
//! the map as opaque; concrete backends are expected to validate recognized keys
//! into typed configuration internally rather than threading the raw map through
//! their own logic.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A free-form, string-keyed map of per-call parameters.
///
/// Values are arbitrary JSON values. Keys this layer does not recognize are
/// passed through to the backend untouched.
///
/// # Example
///
/// ```ignore
/// use davenport_driver::options::Options;
///
/// let options = Options::new()
///     .with("include_docs", true)
///     .with("limit", 25);
///
/// assert_eq!(options.get_bool("include_docs"), Some(true));
/// assert_eq!(options.get_i64("limit"), Some(25));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(BTreeMap<String, Value>);

impl Options {
    /// Creates an empty options map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a key to the given value, replacing any previous value.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns the raw value for a key, if set.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns the value for a key if it is a boolean.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.0.get(key).and_then(Value::as_bool)
    }

    /// Returns the value for a key if it is a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Returns the value for a key if it is an integer.
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.0.get(key).and_then(Value::as_i64)
    }

    /// Returns true if no options are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over all set key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Value)> for Options {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
