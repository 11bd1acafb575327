//! FILENAME: core/pivot-engine/src/query.rs
//! Pivot Query - The top-level pipeline.
//!
//! shape → execute → build → order (if required) → format
//!
//! With column fields, a second details tree is built from the
//! columns-then-rows request. It is never ordered, since it is only read
//! through path lookups.

use pivot_values::ScalarValue;

use crate::builder::TreeBuilder;
use crate::crosstab::mark_column_levels;
use crate::definition::{Aggregate, PivotDefinition, SelectedField};
use crate::error::PivotError;
use crate::format::ValueFormatter;
use crate::logging::{log_debug, log_info};
use crate::ordering::ResultOrdering;
use crate::shape::{details_request, distinct_request, totals_request, FlatRequest};
use crate::source::QueryExecutor;
use crate::tree::ResultTree;

// ============================================================================
// RESULT
// ============================================================================

/// Output of one pivot query. Read-only once returned.
#[derive(Debug, Clone)]
pub struct QueryResult {
    totals: ResultTree,
    details: Option<ResultTree>,
    rows: Vec<SelectedField>,
    columns: Vec<SelectedField>,
    aggregates: Vec<Aggregate>,
}

impl QueryResult {
    pub fn totals(&self) -> &ResultTree {
        &self.totals
    }

    pub fn details(&self) -> Option<&ResultTree> {
        self.details.as_ref()
    }

    pub fn has_details(&self) -> bool {
        self.details.is_some()
    }

    pub fn rows(&self) -> &[SelectedField] {
        &self.rows
    }

    pub fn columns(&self) -> &[SelectedField] {
        &self.columns
    }

    pub fn aggregates(&self) -> &[Aggregate] {
        &self.aggregates
    }
}

// ============================================================================
// QUERY
// ============================================================================

pub struct PivotQuery<'a, E: QueryExecutor> {
    executor: E,
    definition: &'a PivotDefinition,
}

impl<'a, E: QueryExecutor> PivotQuery<'a, E> {
    pub fn new(executor: E, definition: &'a PivotDefinition) -> Self {
        PivotQuery {
            executor,
            definition,
        }
    }

    /// Runs the totals query, and the details query when columns are set.
    /// Nothing partial is returned on failure.
    pub fn query(&self) -> Result<QueryResult, PivotError> {
        let aggregates = self.definition.current_aggregates();

        log_info!(
            "QUERY",
            "pivot query on '{}': {} rows, {} columns, {} aggregates",
            self.definition.source(),
            self.definition.rows().len(),
            self.definition.columns().len(),
            aggregates.len()
        );

        let totals = self.query_totals(&aggregates)?;
        let details = if self.definition.has_columns() {
            Some(self.query_details(&aggregates)?)
        } else {
            None
        };

        Ok(QueryResult {
            totals,
            details,
            rows: self.definition.current_rows(),
            columns: self.definition.current_columns(),
            aggregates,
        })
    }

    /// Ordered distinct values of a declared field.
    pub fn query_distinct(&self, field: &str) -> Result<Vec<ScalarValue>, PivotError> {
        let request = distinct_request(self.definition, field)?;
        let values = self.executor.distinct_values(&request)?;
        log_debug!("QUERY", "distinct '{}': {} values", field, values.len());
        Ok(values)
    }

    fn query_totals(&self, aggregates: &[Aggregate]) -> Result<ResultTree, PivotError> {
        let request = totals_request(self.definition)?;
        let mut tree = self.execute_and_build(&request, aggregates)?;

        let ordering = ResultOrdering::from_aggregates(aggregates);
        if ordering.is_required() {
            let root = tree.root_id();
            ordering.order_by(&mut tree, root)?;
        }

        ValueFormatter::new(aggregates).format(&mut tree);
        Ok(tree)
    }

    fn query_details(&self, aggregates: &[Aggregate]) -> Result<ResultTree, PivotError> {
        let request = details_request(self.definition)?;
        let mut tree = self.execute_and_build(&request, aggregates)?;

        ValueFormatter::new(aggregates).format(&mut tree);
        mark_column_levels(&mut tree, self.definition.columns().len())?;
        Ok(tree)
    }

    fn execute_and_build(&self, request: &FlatRequest, aggregates: &[Aggregate]) -> Result<ResultTree, PivotError> {
        let rows = self.executor.execute_flat_query(request)?;
        log_debug!("QUERY", "collaborator returned {} flat rows", rows.len());
        Ok(TreeBuilder::new(&request.group_by, aggregates).build(&rows)?)
    }
}
