//! Event wrapper with dot-notation field access.
//!
//! A thin wrapper around `serde_json::Value` used by host models to pull
//! typed values out of an event. Missing or mistyped fields degrade to the
//! conventional zero values (`""`, `0`, `false`, empty array), keeping
//! evaluator accessors total.

use std::net::IpAddr;

use serde_json::Value;

/// A reference to a JSON event for field access during evaluation.
///
/// Flat keys are checked first: `"process.name"` as a single key takes
/// precedence over `{"process": {"name": ...}}` nested traversal.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    inner: &'a Value,
}

impl<'a> Event<'a> {
    /// Wrap a JSON value as an event.
    pub fn from_value(value: &'a Value) -> Self {
        Event { inner: value }
    }

    /// Get a field value by name, supporting dot-notation for nested access.
    pub fn get(&self, path: &str) -> Option<&'a Value> {
        if let Some(obj) = self.inner.as_object()
            && let Some(v) = obj.get(path)
        {
            return Some(v);
        }

        if path.contains('.') {
            let mut current = self.inner;
            for part in path.split('.') {
                match current {
                    Value::Object(map) => {
                        current = map.get(part)?;
                    }
                    _ => return None,
                }
            }
            return Some(current);
        }

        None
    }

    /// The element at `idx` of an array field, as a sub-event.
    pub fn index(&self, path: &str, idx: usize) -> Option<Event<'a>> {
        self.get(path)?
            .as_array()?
            .get(idx)
            .map(Event::from_value)
    }

    /// The length of an array field, 0 when missing or not an array.
    pub fn array_len(&self, path: &str) -> usize {
        self.get(path)
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
    }

    /// A string field; `""` when missing or not a string.
    pub fn str(&self, path: &str) -> String {
        self.get(path)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    /// An integer field; `0` when missing or not an integer.
    pub fn int(&self, path: &str) -> i64 {
        self.get(path).and_then(Value::as_i64).unwrap_or_default()
    }

    /// A boolean field; `false` when missing or not a boolean.
    pub fn bool(&self, path: &str) -> bool {
        self.get(path).and_then(Value::as_bool).unwrap_or_default()
    }

    /// A string-array field; empty when missing. Non-string elements are
    /// skipped.
    pub fn str_array(&self, path: &str) -> Vec<String> {
        self.get(path)
            .and_then(Value::as_array)
            .map(|arr| {
                arr.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// An integer-array field; empty when missing.
    pub fn int_array(&self, path: &str) -> Vec<i64> {
        self.get(path)
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(Value::as_i64).collect())
            .unwrap_or_default()
    }

    /// An IP address field, parsed from its string form.
    pub fn ip(&self, path: &str) -> Option<IpAddr> {
        self.get(path)?.as_str()?.parse().ok()
    }

    /// Access the underlying JSON value.
    pub fn as_value(&self) -> &'a Value {
        self.inner
    }
}
