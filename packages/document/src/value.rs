//! Field values and time-sample keys.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Value stored in a spec field, dictionary entry or time sample.
///
/// `Null` doubles as the erasure sentinel: setting a field, dictionary key or
/// time sample to `Null` removes the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Dict(BTreeMap<String, Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// String items of a `List`, skipping non-string entries.
    pub fn as_string_list(&self) -> Vec<String> {
        match self {
            Value::List(items) => items
                .iter()
                .filter_map(|v| match v {
                    Value::Str(s) => Some(s.clone()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn string_list(items: impl IntoIterator<Item = String>) -> Self {
        Value::List(items.into_iter().map(Value::Str).collect())
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

/// Time-sample key with a total order over f64.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeCode(pub f64);

impl Eq for TimeCode {}

impl PartialOrd for TimeCode {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeCode {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl From<f64> for TimeCode {
    fn from(v: f64) -> Self {
        TimeCode(v)
    }
}

impl std::fmt::Display for TimeCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_erasure_sentinel() {
        assert!(Value::Null.is_null());
        assert!(!Value::Bool(false).is_null());
    }

    #[test]
    fn test_string_list_round_trip() {
        let v = Value::string_list(["a".to_string(), "b".to_string()]);
        assert_eq!(v.as_string_list(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_timecode_total_order() {
        let mut times = vec![TimeCode(2.0), TimeCode(-1.0), TimeCode(0.5)];
        times.sort();
        assert_eq!(times, vec![TimeCode(-1.0), TimeCode(0.5), TimeCode(2.0)]);
    }

    #[test]
    fn test_value_json_round_trip() {
        let mut dict = BTreeMap::new();
        dict.insert("name".to_string(), Value::from("sphere"));
        dict.insert("radius".to_string(), Value::Float(1.5));
        let value = Value::List(vec![Value::Dict(dict), Value::Bool(true), Value::Null]);

        let json = serde_json::to_string(&value).unwrap();
        let parsed: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, value);
    }
}
