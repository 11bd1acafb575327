//! FILENAME: core/pivot-engine/src/source.rs
//! Execution collaborator seam.
//!
//! The engine never talks to a database directly. A `QueryExecutor` runs the
//! logical flat requests produced by `shape` and hands back complete rollup
//! row sets. Calls are synchronous and must return every row before tree
//! construction starts.

use pivot_values::ScalarValue;
use serde::{Deserialize, Serialize};

use crate::collection::OrderedMap;
use crate::error::ExecutionError;
use crate::shape::{DistinctRequest, FlatRequest};

/// One row of a flat rollup result.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlatRow {
    /// Group field → value. Null marks a rollup level.
    groups: OrderedMap<ScalarValue>,

    /// Aggregate output key → raw value.
    values: OrderedMap<ScalarValue>,
}

impl FlatRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(mut self, field: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.set_group(field, value);
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<ScalarValue>) -> Self {
        self.set_value(key, value);
        self
    }

    pub fn set_group(&mut self, field: impl Into<String>, value: impl Into<ScalarValue>) {
        self.groups.insert(field, value.into());
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<ScalarValue>) {
        self.values.insert(key, value.into());
    }

    /// Value of a group field. A field missing from the row reads as null.
    pub fn group(&self, field: &str) -> &ScalarValue {
        const NULL: &ScalarValue = &ScalarValue::Null;
        self.groups.get(field).unwrap_or(NULL)
    }

    pub fn value(&self, key: &str) -> Option<&ScalarValue> {
        self.values.get(key)
    }

    pub fn groups(&self) -> &OrderedMap<ScalarValue> {
        &self.groups
    }

    pub fn values(&self) -> &OrderedMap<ScalarValue> {
        &self.values
    }
}

/// Runs flat rollup requests against some data source.
pub trait QueryExecutor {
    /// Executes a flat aggregation request and returns every resulting row,
    /// rollup subtotal rows included.
    fn execute_flat_query(&self, request: &FlatRequest) -> Result<Vec<FlatRow>, ExecutionError>;

    /// Returns the distinct values of a field, in ascending order.
    fn distinct_values(&self, request: &DistinctRequest) -> Result<Vec<ScalarValue>, ExecutionError>;
}

impl<E: QueryExecutor + ?Sized> QueryExecutor for &E {
    fn execute_flat_query(&self, request: &FlatRequest) -> Result<Vec<FlatRow>, ExecutionError> {
        (**self).execute_flat_query(request)
    }

    fn distinct_values(&self, request: &DistinctRequest) -> Result<Vec<ScalarValue>, ExecutionError> {
        (**self).distinct_values(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_group_reads_as_null() {
        let row = FlatRow::new().with_group("zone", "North").with_value("sale", 100.0);

        assert_eq!(row.group("zone"), &ScalarValue::from("North"));
        assert!(row.group("period").is_null());
        assert_eq!(row.value("sale"), Some(&ScalarValue::Number(100.0)));
        assert_eq!(row.value("count"), None);
    }

    #[test]
    fn test_explicit_null_group() {
        let none: Option<&str> = None;
        let row = FlatRow::new().with_group("zone", none);
        assert!(row.group("zone").is_null());
        assert_eq!(row.groups().len(), 1);
    }
}
