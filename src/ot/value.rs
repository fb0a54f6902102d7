//! # Data Values
//!
//! Payload type carried by operations and held by the real-time model: the
//! tree of objects, arrays, strings, numbers, booleans and dates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A node of the model tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum DataValue {
    /// Absent value
    Null,
    /// String node
    String(String),
    /// Number node
    Number(f64),
    /// Boolean node
    Boolean(bool),
    /// Date node (UTC)
    Date(DateTime<Utc>),
    /// Ordered list of child nodes
    Array(Vec<DataValue>),
    /// Map of property name to child node
    Object(BTreeMap<String, DataValue>),
}

/// Kind of value an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Null,
    String,
    Number,
    Boolean,
    Date,
    Array,
    Object,
}

impl DataValue {
    /// The value kind of this node
    pub fn value_type(&self) -> ValueType {
        match self {
            DataValue::Null => ValueType::Null,
            DataValue::String(_) => ValueType::String,
            DataValue::Number(_) => ValueType::Number,
            DataValue::Boolean(_) => ValueType::Boolean,
            DataValue::Date(_) => ValueType::Date,
            DataValue::Array(_) => ValueType::Array,
            DataValue::Object(_) => ValueType::Object,
        }
    }

    /// Create an empty object node
    pub fn empty_object() -> Self {
        DataValue::Object(BTreeMap::new())
    }

    /// Borrow the string contents, if this is a string node
    pub fn as_str(&self) -> Option<&str> {
        match self {
            DataValue::String(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the elements, if this is an array node
    pub fn as_array(&self) -> Option<&Vec<DataValue>> {
        match self {
            DataValue::Array(values) => Some(values),
            _ => None,
        }
    }

    /// Borrow the properties, if this is an object node
    pub fn as_object(&self) -> Option<&BTreeMap<String, DataValue>> {
        match self {
            DataValue::Object(values) => Some(values),
            _ => None,
        }
    }
}

impl From<&str> for DataValue {
    fn from(value: &str) -> Self {
        DataValue::String(value.to_string())
    }
}

impl From<String> for DataValue {
    fn from(value: String) -> Self {
        DataValue::String(value)
    }
}

impl From<f64> for DataValue {
    fn from(value: f64) -> Self {
        DataValue::Number(value)
    }
}

impl From<bool> for DataValue {
    fn from(value: bool) -> Self {
        DataValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for DataValue {
    fn from(value: DateTime<Utc>) -> Self {
        DataValue::Date(value)
    }
}

impl From<Vec<DataValue>> for DataValue {
    fn from(values: Vec<DataValue>) -> Self {
        DataValue::Array(values)
    }
}

impl From<BTreeMap<String, DataValue>> for DataValue {
    fn from(values: BTreeMap<String, DataValue>) -> Self {
        DataValue::Object(values)
    }
}

/// Convert plain JSON into a data value
///
/// Numbers become `f64`; JSON has no date type so dates never come out of
/// this conversion.
impl From<serde_json::Value> for DataValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => DataValue::Null,
            serde_json::Value::Bool(b) => DataValue::Boolean(b),
            serde_json::Value::Number(n) => DataValue::Number(n.as_f64().unwrap_or_default()),
            serde_json::Value::String(s) => DataValue::String(s),
            serde_json::Value::Array(values) => {
                DataValue::Array(values.into_iter().map(DataValue::from).collect())
            }
            serde_json::Value::Object(map) => DataValue::Object(
                map.into_iter().map(|(k, v)| (k, DataValue::from(v))).collect(),
            ),
        }
    }
}
