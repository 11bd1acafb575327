//! FILENAME: core/pivot-engine/src/shape.rs
//! Query Shape - Which flat request produces which tree.
//!
//! A pivot definition is turned into one or two flat rollup requests:
//! - totals: group by the row fields
//! - details: group by the column fields followed by the row fields
//!
//! The requests are logical. Escaping, quoting and literal encoding belong
//! to the execution collaborator.

use serde::{Deserialize, Serialize};

use crate::definition::{
    AggregateFunction, FieldType, FilterArgument, FilterOperator, PivotDefinition,
};
use crate::error::{PivotError, ShapeError};
use crate::logging::log_debug;

/// Alias given to a SELECT statement used as the pivot source.
pub const DERIVED_TABLE_ALIAS: &str = "__pivot__";

/// Where the flat rows come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceRef {
    /// A bare table or view identifier, still to be escaped by the collaborator.
    Table(String),
    /// A full SELECT statement, to be wrapped as `(<query>) AS <alias>`.
    DerivedTable { query: String, alias: String },
}

impl SourceRef {
    /// Decides how the configured source text is used.
    /// Leading whitespace and trailing semicolons/whitespace are trimmed first.
    pub fn from_source_text(text: &str) -> Self {
        let trimmed = text
            .trim_start()
            .trim_end_matches(|c: char| matches!(c, ';' | ' ' | '\t' | '\n' | '\r' | '\x0B' | '\0'));

        // SELECT must be a whole keyword: "selections" is a table name.
        let is_select = trimmed
            .get(..6)
            .map(|head| head.eq_ignore_ascii_case("SELECT"))
            .unwrap_or(false)
            && trimmed[6..]
                .chars()
                .next()
                .map_or(true, |c| c.is_whitespace() || c == '(' || c == '*');

        if is_select {
            SourceRef::DerivedTable {
                query: trimmed.to_string(),
                alias: DERIVED_TABLE_ALIAS.to_string(),
            }
        } else {
            SourceRef::Table(trimmed.to_string())
        }
    }
}

/// One entry of the select list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectItem {
    /// A grouping column, returned under its own name.
    Group { field: String },
    /// `function(source_field) AS output_key`
    Aggregate {
        function: AggregateFunction,
        source_field: String,
        output_key: String,
    },
}

/// A logical predicate with the declared type of its field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    pub field: String,
    pub operator: FilterOperator,
    pub argument: FilterArgument,
    pub field_type: FieldType,
}

/// A flat aggregation request for the execution collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRequest {
    pub select: Vec<SelectItem>,
    pub source: SourceRef,
    /// Joined with AND.
    pub predicates: Vec<Predicate>,
    /// Grouping fields, outer to inner.
    pub group_by: Vec<String>,
    pub rollup: bool,
}

impl FlatRequest {
    pub fn aggregate_keys(&self) -> impl Iterator<Item = &str> + '_ {
        self.select.iter().filter_map(|item| match item {
            SelectItem::Aggregate { output_key, .. } => Some(output_key.as_str()),
            SelectItem::Group { .. } => None,
        })
    }
}

/// Request for the ordered distinct values of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistinctRequest {
    pub field: String,
    pub field_type: FieldType,
    pub source: SourceRef,
}

/// Builds the totals request: rows plus aggregates, grouped by the rows, with rollup.
pub fn totals_request(definition: &PivotDefinition) -> Result<FlatRequest, PivotError> {
    shape_request(definition)
}

/// Builds the details request: grouped by the columns followed by the rows.
pub fn details_request(definition: &PivotDefinition) -> Result<FlatRequest, PivotError> {
    if !definition.has_columns() {
        return Err(ShapeError::NoColumns.into());
    }
    shape_request(&definition.details_definition())
}

pub fn distinct_request(
    definition: &PivotDefinition,
    field: &str,
) -> Result<DistinctRequest, PivotError> {
    let declared = definition.field(field)?;
    Ok(DistinctRequest {
        field: declared.name.clone(),
        field_type: declared.field_type,
        source: SourceRef::from_source_text(definition.source()),
    })
}

fn shape_request(definition: &PivotDefinition) -> Result<FlatRequest, PivotError> {
    let mut select: Vec<SelectItem> = definition
        .rows()
        .iter()
        .map(|field| SelectItem::Group { field: field.clone() })
        .collect();

    select.extend(definition.aggregates().values().map(|aggregate| SelectItem::Aggregate {
        function: aggregate.function(),
        source_field: aggregate.source_field().to_string(),
        output_key: aggregate.output_key().to_string(),
    }));

    if select.is_empty() {
        return Err(ShapeError::NothingToQuery.into());
    }

    let predicates = definition
        .filters()
        .iter()
        .map(|filter| -> Result<Predicate, PivotError> {
            let field = definition.field(filter.field())?;
            Ok(Predicate {
                field: filter.field().to_string(),
                operator: filter.operator(),
                argument: filter.argument().clone(),
                field_type: field.field_type,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let request = FlatRequest {
        select,
        source: SourceRef::from_source_text(definition.source()),
        predicates,
        group_by: definition.rows().to_vec(),
        rollup: true,
    };

    log_debug!(
        "SHAPE",
        "shaped request group_by={:?} aggregates={} predicates={}",
        request.group_by,
        request.aggregate_keys().count(),
        request.predicates.len()
    );

    Ok(request)
}
