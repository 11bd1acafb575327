//! FILENAME: core/values/src/value.rs
//! PURPOSE: Defines the scalar value exchanged between the execution
//! collaborator, the result trees and the matrix view.
//! CONTEXT: A flat rollup row carries one of these per group field and per
//! aggregate. Null is meaningful: in a group column it marks a rollup level.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single value read from (or destined for) a flat result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Integer(i64),
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl ScalarValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScalarValue::Null)
    }

    /// Numeric view of the value.
    /// Text is accepted when it parses as a number, since database drivers
    /// commonly hand aggregates back as strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Integer(i) => Some(*i as f64),
            ScalarValue::Number(n) => Some(*n),
            ScalarValue::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            ScalarValue::Null | ScalarValue::Boolean(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the display form of the value.
    /// This is the string used as a tree caption and as a child key, so it
    /// must keep distinct values distinct: floats use the shortest form that
    /// parses back to the same number.
    pub fn display_value(&self) -> String {
        match self {
            ScalarValue::Null => String::new(),
            ScalarValue::Integer(i) => i.to_string(),
            ScalarValue::Number(n) => n.to_string(),
            ScalarValue::Text(s) => s.clone(),
            ScalarValue::Boolean(b) => {
                if *b { "1" } else { "0" }.to_string()
            }
        }
    }
}

impl Default for ScalarValue {
    fn default() -> Self {
        ScalarValue::Null
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_value())
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Text(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        ScalarValue::Text(value)
    }
}

impl From<f64> for ScalarValue {
    fn from(value: f64) -> Self {
        ScalarValue::Number(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        ScalarValue::Integer(value)
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        ScalarValue::Boolean(value)
    }
}

impl<T: Into<ScalarValue>> From<Option<T>> for ScalarValue {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => v.into(),
            None => ScalarValue::Null,
        }
    }
}
