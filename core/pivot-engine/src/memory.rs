//! FILENAME: core/pivot-engine/src/memory.rs
//! In-memory execution collaborator.
//!
//! Runs flat rollup requests against named tables held in memory. Groups
//! keep first-seen order; with rollup, each group's subtotal row follows
//! the rows of its members and the grand total comes last, the way a
//! database returns `GROUP BY ... WITH ROLLUP`.
//!
//! Derived-table sources (SELECT statements) cannot be evaluated here and
//! fail with an `ExecutionError`.

use std::cmp::Ordering;

use pivot_values::ScalarValue;
use rustc_hash::FxHashMap;

use crate::definition::{AggregateFunction, FieldType, FilterArgument, FilterOperator};
use crate::error::ExecutionError;
use crate::logging::log_debug;
use crate::shape::{DistinctRequest, FlatRequest, Predicate, SelectItem, SourceRef};
use crate::source::{FlatRow, QueryExecutor};

type Record = Vec<ScalarValue>;

// ============================================================================
// TABLES
// ============================================================================

/// A named-column table of records.
#[derive(Debug, Clone, Default)]
pub struct MemoryTable {
    columns: Vec<String>,
    index: FxHashMap<String, usize>,
    records: Vec<Record>,
}

impl MemoryTable {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        MemoryTable {
            columns,
            index,
            records: Vec::new(),
        }
    }

    /// Appends a record. Its length must match the column count.
    pub fn push_record(&mut self, record: Vec<ScalarValue>) -> Result<(), ExecutionError> {
        if record.len() != self.columns.len() {
            return Err(ExecutionError::new(format!(
                "record has {} values, table has {} columns",
                record.len(),
                self.columns.len()
            )));
        }
        self.records.push(record);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn column(&self, name: &str) -> Result<usize, ExecutionError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| ExecutionError::new(format!("Unknown column '{}'", name)))
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MemoryExecutor {
    tables: FxHashMap<String, MemoryTable>,
}

impl MemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, name: impl Into<String>, table: MemoryTable) {
        self.tables.insert(name.into(), table);
    }

    pub fn with_table(mut self, name: impl Into<String>, table: MemoryTable) -> Self {
        self.add_table(name, table);
        self
    }

    pub fn table(&self, name: &str) -> Option<&MemoryTable> {
        self.tables.get(name)
    }

    fn resolve(&self, source: &SourceRef) -> Result<&MemoryTable, ExecutionError> {
        match source {
            SourceRef::Table(name) => self
                .tables
                .get(name)
                .ok_or_else(|| ExecutionError::new(format!("Unknown table '{}'", name))),
            SourceRef::DerivedTable { alias, .. } => Err(ExecutionError::new(format!(
                "derived table {} is not supported in memory",
                alias
            ))),
        }
    }
}

impl QueryExecutor for MemoryExecutor {
    fn execute_flat_query(&self, request: &FlatRequest) -> Result<Vec<FlatRow>, ExecutionError> {
        let table = self.resolve(&request.source)?;

        let group_columns = request
            .group_by
            .iter()
            .map(|field| table.column(field))
            .collect::<Result<Vec<_>, _>>()?;

        let measures = request
            .select
            .iter()
            .filter_map(|item| match item {
                SelectItem::Aggregate {
                    function,
                    source_field,
                    output_key,
                } => Some(table.column(source_field).map(|column| Measure {
                    output_key,
                    function: *function,
                    column,
                })),
                SelectItem::Group { .. } => None,
            })
            .collect::<Result<Vec<_>, _>>()?;

        let predicates = request
            .predicates
            .iter()
            .map(|p| table.column(&p.field).map(|column| (column, p)))
            .collect::<Result<Vec<_>, _>>()?;

        let members: Vec<&Record> = table
            .records
            .iter()
            .filter(|record| predicates.iter().all(|(column, p)| matches(&record[*column], p)))
            .collect();

        let context = GroupContext {
            group_by: &request.group_by,
            group_columns,
            measures,
            rollup: request.rollup,
        };

        let mut out = Vec::new();
        if context.group_columns.is_empty() {
            out.push(context.row(&[], &members));
        } else if !members.is_empty() {
            let mut prefix = Vec::with_capacity(context.group_columns.len());
            context.emit(0, &members, &mut prefix, &mut out);
        }

        log_debug!(
            "MEMORY",
            "{} of {} records matched, {} flat rows",
            members.len(),
            table.len(),
            out.len()
        );

        Ok(out)
    }

    fn distinct_values(&self, request: &DistinctRequest) -> Result<Vec<ScalarValue>, ExecutionError> {
        let table = self.resolve(&request.source)?;
        let column = table.column(&request.field)?;

        let mut values: Vec<ScalarValue> = table.records.iter().map(|r| r[column].clone()).collect();
        values.sort_by(compare_scalars);
        values.dedup_by(|a, b| compare_scalars(a, b) == Ordering::Equal);
        Ok(values)
    }
}

// ============================================================================
// GROUPING
// ============================================================================

struct Measure<'a> {
    output_key: &'a str,
    function: AggregateFunction,
    column: usize,
}

struct GroupContext<'a> {
    group_by: &'a [String],
    group_columns: Vec<usize>,
    measures: Vec<Measure<'a>>,
    rollup: bool,
}

impl<'a> GroupContext<'a> {
    /// Emits the rows for every group under `prefix`, then the prefix's own
    /// rollup row.
    fn emit(&self, level: usize, members: &[&Record], prefix: &mut Vec<ScalarValue>, out: &mut Vec<FlatRow>) {
        if level == self.group_columns.len() {
            out.push(self.row(prefix, members));
            return;
        }

        for (value, bucket) in partition(members, self.group_columns[level]) {
            prefix.push(value);
            self.emit(level + 1, &bucket, prefix, out);
            prefix.pop();
        }

        if self.rollup {
            out.push(self.row(prefix, members));
        }
    }

    /// One flat row: group fields past the prefix are null.
    fn row(&self, prefix: &[ScalarValue], members: &[&Record]) -> FlatRow {
        let mut row = FlatRow::new();
        for (i, field) in self.group_by.iter().enumerate() {
            row.set_group(field.as_str(), prefix.get(i).cloned().unwrap_or(ScalarValue::Null));
        }
        for measure in &self.measures {
            let mut acc = AggregateAccumulator::new();
            for record in members {
                acc.add(&record[measure.column]);
            }
            row.set_value(measure.output_key, acc.compute(measure.function));
        }
        row
    }
}

/// Splits records by the value of one column, in first-seen order.
fn partition<'r>(members: &[&'r Record], column: usize) -> Vec<(ScalarValue, Vec<&'r Record>)> {
    let mut buckets: Vec<(ScalarValue, Vec<&'r Record>)> = Vec::new();
    let mut seen: FxHashMap<Option<String>, usize> = FxHashMap::default();

    for &record in members {
        let value = &record[column];
        let key = if value.is_null() {
            None
        } else {
            Some(value.display_value())
        };
        match seen.get(&key) {
            Some(&i) => buckets[i].1.push(record),
            None => {
                seen.insert(key, buckets.len());
                buckets.push((value.clone(), vec![record]));
            }
        }
    }
    buckets
}

// ============================================================================
// AGGREGATE ACCUMULATOR
// ============================================================================

/// Running state for one aggregate over one group. Nulls are skipped.
#[derive(Debug, Clone, Default)]
struct AggregateAccumulator {
    count: i64,
    count_numbers: u64,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
    text_min: Option<String>,
    text_max: Option<String>,
}

impl AggregateAccumulator {
    fn new() -> Self {
        Self::default()
    }

    fn add(&mut self, value: &ScalarValue) {
        if value.is_null() {
            return;
        }
        self.count += 1;

        match value.as_f64() {
            Some(n) => {
                self.count_numbers += 1;
                self.sum += n;
                self.min = Some(self.min.map_or(n, |m| m.min(n)));
                self.max = Some(self.max.map_or(n, |m| m.max(n)));
            }
            None => {
                let text = value.display_value();
                if self.text_min.as_ref().map_or(true, |m| text < *m) {
                    self.text_min = Some(text.clone());
                }
                if self.text_max.as_ref().map_or(true, |m| text > *m) {
                    self.text_max = Some(text);
                }
            }
        }
    }

    /// Aggregates over no numbers are null, except COUNT.
    fn compute(&self, function: AggregateFunction) -> ScalarValue {
        let numeric = |n: Option<f64>, text: &Option<String>| match (n, text) {
            (Some(n), _) => ScalarValue::Number(n),
            (None, Some(t)) => ScalarValue::Text(t.clone()),
            (None, None) => ScalarValue::Null,
        };
        match function {
            AggregateFunction::Count => ScalarValue::Integer(self.count),
            AggregateFunction::Sum if self.count_numbers > 0 => ScalarValue::Number(self.sum),
            AggregateFunction::Average if self.count_numbers > 0 => {
                ScalarValue::Number(self.sum / self.count_numbers as f64)
            }
            AggregateFunction::Sum | AggregateFunction::Average => ScalarValue::Null,
            AggregateFunction::Min => numeric(self.min, &self.text_min),
            AggregateFunction::Max => numeric(self.max, &self.text_max),
        }
    }
}

// ============================================================================
// PREDICATES
// ============================================================================

fn matches(value: &ScalarValue, predicate: &Predicate) -> bool {
    if value.is_null() {
        return false;
    }
    match (&predicate.argument, predicate.operator) {
        (FilterArgument::List(items), FilterOperator::In) => items
            .iter()
            .any(|item| compare_typed(value, item, predicate.field_type) == Some(Ordering::Equal)),
        (FilterArgument::Single(argument), FilterOperator::Contains) => value
            .display_value()
            .to_lowercase()
            .contains(&argument.display_value().to_lowercase()),
        (FilterArgument::Single(argument), operator) => {
            let Some(ordering) = compare_typed(value, argument, predicate.field_type) else {
                return false;
            };
            match operator {
                FilterOperator::Equal => ordering == Ordering::Equal,
                FilterOperator::NotEqual => ordering != Ordering::Equal,
                FilterOperator::Greater => ordering == Ordering::Greater,
                FilterOperator::GreaterEqual => ordering != Ordering::Less,
                FilterOperator::Less => ordering == Ordering::Less,
                FilterOperator::LessEqual => ordering != Ordering::Greater,
                FilterOperator::In | FilterOperator::Contains => false,
            }
        }
        // Filter construction rejects the remaining arity combinations.
        (FilterArgument::List(_), _) => false,
    }
}

/// Numeric fields compare as numbers; every other type compares its text
/// form, which orders ISO dates and times correctly.
fn compare_typed(value: &ScalarValue, argument: &ScalarValue, field_type: FieldType) -> Option<Ordering> {
    if argument.is_null() {
        return None;
    }
    match field_type {
        FieldType::Number | FieldType::Int => value.as_f64()?.partial_cmp(&argument.as_f64()?),
        FieldType::Text | FieldType::Date | FieldType::DateTime | FieldType::Time => {
            Some(value.display_value().cmp(&argument.display_value()))
        }
    }
}

/// Null, then numbers, then text, then booleans.
fn compare_scalars(a: &ScalarValue, b: &ScalarValue) -> Ordering {
    use ScalarValue::*;

    match (a, b) {
        (Null, Null) => Ordering::Equal,
        (Null, _) => Ordering::Less,
        (_, Null) => Ordering::Greater,

        (Integer(_) | Number(_), Integer(_) | Number(_)) => {
            let x = a.as_f64().unwrap_or_default();
            let y = b.as_f64().unwrap_or_default();
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Integer(_) | Number(_), _) => Ordering::Less,
        (_, Integer(_) | Number(_)) => Ordering::Greater,

        (Text(x), Text(y)) => x.cmp(y),
        (Text(_), _) => Ordering::Less,
        (_, Text(_)) => Ordering::Greater,

        (Boolean(x), Boolean(y)) => x.cmp(y),
    }
}
