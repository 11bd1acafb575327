//! FILENAME: core/pivot-engine/src/definition.rs
//! Pivot Definition - The serializable configuration.
//!
//! This module contains all the types needed to DESCRIBE a pivot query:
//! the source, the field catalogue, filters, row/column selections and
//! aggregates. These structures are designed to be:
//! - Validated eagerly (every mutator returns a DefinitionError on bad input)
//! - Serializable (a persistence collaborator stores and restores them)
//! - Cheap to clone into an independent copy (used to shape the details query)

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use pivot_values::ScalarValue;
use serde::{Deserialize, Serialize};

use crate::collection::OrderedMap;
use crate::error::DefinitionError;

/// Highest number of decimal places an aggregate may be displayed with.
pub const MAX_DECIMALS: u8 = 8;

/// Prefix of generated aggregate output keys.
pub const GENERATED_KEY_PREFIX: &str = "__aggregate_";

// ============================================================================
// FIELD
// ============================================================================

/// Declared type of a source field. The execution collaborator uses it to
/// encode predicate literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    Text,
    Number,
    Int,
    Date,
    DateTime,
    Time,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "TEXT",
            FieldType::Number => "NUMBER",
            FieldType::Int => "INT",
            FieldType::Date => "DATE",
            FieldType::DateTime => "DATETIME",
            FieldType::Time => "TIME",
        }
    }
}

impl FromStr for FieldType {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TEXT" => Ok(FieldType::Text),
            "NUMBER" => Ok(FieldType::Number),
            "INT" => Ok(FieldType::Int),
            "DATE" => Ok(FieldType::Date),
            "DATETIME" => Ok(FieldType::DateTime),
            "TIME" => Ok(FieldType::Time),
            other => Err(DefinitionError::UnknownFieldType(other.to_string())),
        }
    }
}

impl Default for FieldType {
    fn default() -> Self {
        FieldType::Text
    }
}

/// A selectable attribute of the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Column name in the source.
    pub name: String,

    /// Display name.
    pub caption: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl Field {
    pub fn new(name: impl Into<String>, caption: impl Into<String>, field_type: FieldType) -> Self {
        Field {
            name: name.into(),
            caption: caption.into(),
            field_type,
        }
    }
}

// ============================================================================
// FILTER
// ============================================================================

/// Operators a filter predicate can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterOperator {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "<>")]
    NotEqual,
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessEqual,
    #[serde(rename = "IN")]
    In,
    /// Pattern match: the field contains the argument.
    #[serde(rename = "HAVE")]
    Contains,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 8] = [
        FilterOperator::Equal,
        FilterOperator::NotEqual,
        FilterOperator::Greater,
        FilterOperator::GreaterEqual,
        FilterOperator::Less,
        FilterOperator::LessEqual,
        FilterOperator::In,
        FilterOperator::Contains,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equal => "=",
            FilterOperator::NotEqual => "<>",
            FilterOperator::Greater => ">",
            FilterOperator::GreaterEqual => ">=",
            FilterOperator::Less => "<",
            FilterOperator::LessEqual => "<=",
            FilterOperator::In => "IN",
            FilterOperator::Contains => "HAVE",
        }
    }
}

impl FromStr for FilterOperator {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterOperator::ALL
            .iter()
            .find(|op| op.as_str() == s)
            .copied()
            .ok_or_else(|| DefinitionError::UnknownOperator(s.to_string()))
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Argument(s) of a filter predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterArgument {
    List(Vec<ScalarValue>),
    Single(ScalarValue),
}

impl From<ScalarValue> for FilterArgument {
    fn from(value: ScalarValue) -> Self {
        FilterArgument::Single(value)
    }
}

impl From<&str> for FilterArgument {
    fn from(value: &str) -> Self {
        FilterArgument::Single(value.into())
    }
}

impl From<f64> for FilterArgument {
    fn from(value: f64) -> Self {
        FilterArgument::Single(value.into())
    }
}

impl From<i64> for FilterArgument {
    fn from(value: i64) -> Self {
        FilterArgument::Single(value.into())
    }
}

impl<T: Into<ScalarValue>> From<Vec<T>> for FilterArgument {
    fn from(values: Vec<T>) -> Self {
        FilterArgument::List(values.into_iter().map(Into::into).collect())
    }
}

/// A logical predicate on one field.
/// Construction validates operator/argument arity; the filter can never
/// exist in an invalid state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FilterParts")]
pub struct Filter {
    field: String,
    operator: FilterOperator,
    argument: FilterArgument,
}

/// Unvalidated filter shape used when deserializing.
#[derive(Deserialize)]
struct FilterParts {
    field: String,
    operator: FilterOperator,
    argument: FilterArgument,
}

impl TryFrom<FilterParts> for Filter {
    type Error = DefinitionError;

    fn try_from(parts: FilterParts) -> Result<Self, Self::Error> {
        Filter::new(parts.field, parts.operator, parts.argument)
    }
}

impl Filter {
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        argument: impl Into<FilterArgument>,
    ) -> Result<Self, DefinitionError> {
        let field = field.into();
        let argument = argument.into();

        match (&argument, operator) {
            (FilterArgument::Single(ScalarValue::Null), _) => {
                return Err(DefinitionError::NullArgument { field });
            }
            (FilterArgument::Single(_), FilterOperator::In) => {
                return Err(DefinitionError::ArgumentMustBeList {
                    field,
                    operator: operator.to_string(),
                });
            }
            (FilterArgument::List(_), op) if op != FilterOperator::In => {
                return Err(DefinitionError::ArgumentCannotBeList {
                    field,
                    operator: operator.to_string(),
                });
            }
            _ => {}
        }

        Ok(Filter {
            field,
            operator,
            argument,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn argument(&self) -> &FilterArgument {
        &self.argument
    }
}

// ============================================================================
// AGGREGATION
// ============================================================================

/// Supported aggregation functions for value fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AggregateFunction {
    Count,
    Sum,
    #[serde(rename = "AVG")]
    Average,
    Min,
    Max,
}

impl AggregateFunction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregateFunction::Count => "COUNT",
            AggregateFunction::Sum => "SUM",
            AggregateFunction::Average => "AVG",
            AggregateFunction::Min => "MIN",
            AggregateFunction::Max => "MAX",
        }
    }
}

impl FromStr for AggregateFunction {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "COUNT" => Ok(AggregateFunction::Count),
            "SUM" => Ok(AggregateFunction::Sum),
            "AVG" => Ok(AggregateFunction::Average),
            "MIN" => Ok(AggregateFunction::Min),
            "MAX" => Ok(AggregateFunction::Max),
            other => Err(DefinitionError::UnknownAggregateFunction(other.to_string())),
        }
    }
}

/// Ordering requested for the groups, driven by an aggregate's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "")]
    None,
    #[serde(rename = "ASC")]
    Ascending,
    #[serde(rename = "DESC")]
    Descending,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::None => "",
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = DefinitionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Ok(SortDirection::None),
            "ASC" => Ok(SortDirection::Ascending),
            "DESC" => Ok(SortDirection::Descending),
            other => Err(DefinitionError::UnknownSortDirection(other.to_string())),
        }
    }
}

impl Default for SortDirection {
    fn default() -> Self {
        SortDirection::None
    }
}

/// An aggregation directive: which field, how, under which output key,
/// displayed with how many decimals and sorted which way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AggregateParts")]
pub struct Aggregate {
    source_field: String,
    output_key: String,
    caption: String,
    function: AggregateFunction,
    decimals: u8,
    order: SortDirection,
}

#[derive(Deserialize)]
struct AggregateParts {
    source_field: String,
    output_key: String,
    caption: String,
    function: AggregateFunction,
    decimals: u8,
    #[serde(default)]
    order: SortDirection,
}

impl TryFrom<AggregateParts> for Aggregate {
    type Error = DefinitionError;

    fn try_from(p: AggregateParts) -> Result<Self, Self::Error> {
        Aggregate::new(p.source_field, p.output_key, p.caption, p.function, p.decimals, p.order)
    }
}

impl Aggregate {
    pub fn new(
        source_field: impl Into<String>,
        output_key: impl Into<String>,
        caption: impl Into<String>,
        function: AggregateFunction,
        decimals: u8,
        order: SortDirection,
    ) -> Result<Self, DefinitionError> {
        if decimals > MAX_DECIMALS {
            return Err(DefinitionError::DecimalsOutOfRange(decimals));
        }
        Ok(Aggregate {
            source_field: source_field.into(),
            output_key: output_key.into(),
            caption: caption.into(),
            function,
            decimals,
            order,
        })
    }

    pub fn source_field(&self) -> &str {
        &self.source_field
    }

    pub fn output_key(&self) -> &str {
        &self.output_key
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn function(&self) -> AggregateFunction {
        self.function
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn order(&self) -> SortDirection {
        self.order
    }
}

// ============================================================================
// INFO
// ============================================================================

/// Descriptive metadata saved alongside a definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotInfo {
    #[serde(default)]
    pub author: String,

    pub created: DateTime<Utc>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub protected: bool,
}

impl Default for PivotInfo {
    fn default() -> Self {
        PivotInfo {
            author: String::new(),
            created: Utc::now(),
            description: String::new(),
            protected: false,
        }
    }
}

// ============================================================================
// SELECTION SUMMARIES
// ============================================================================

/// A row or column selection, resolved against the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedField {
    pub name: String,
    pub caption: String,
}

/// A filter together with the caption of the field it applies to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSummary {
    pub filter: Filter,
    pub caption: String,
}

// ============================================================================
// MAIN DEFINITION STRUCT
// ============================================================================

/// The complete definition of a pivot query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PivotDefinitionParts")]
pub struct PivotDefinition {
    /// Table name, view name or SELECT statement to extract the values from.
    source: String,

    /// Catalogue of all fields available in the source, keyed by name.
    fields: OrderedMap<Field>,

    /// Predicates, in the order they were added. Duplicates are allowed.
    filters: Vec<Filter>,

    /// Field names placed in the Row area (ordered from outer to inner).
    rows: Vec<String>,

    /// Field names placed in the Column area (ordered from outer to inner).
    columns: Vec<String>,

    /// Aggregates keyed by output key.
    aggregates: OrderedMap<Aggregate>,

    #[serde(default)]
    info: PivotInfo,

    /// Counter backing generated aggregate output keys.
    #[serde(default)]
    generated_keys: u32,
}

/// Unvalidated definition shape used when deserializing. Selections are
/// replayed through the mutators so a loaded definition obeys the same
/// catalogue rules as one built in code.
#[derive(Deserialize)]
struct PivotDefinitionParts {
    source: String,
    fields: Vec<(String, Field)>,
    #[serde(default)]
    filters: Vec<Filter>,
    #[serde(default)]
    rows: Vec<String>,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    aggregates: Vec<(String, Aggregate)>,
    #[serde(default)]
    info: PivotInfo,
    #[serde(default)]
    generated_keys: u32,
}

impl TryFrom<PivotDefinitionParts> for PivotDefinition {
    type Error = DefinitionError;

    fn try_from(parts: PivotDefinitionParts) -> Result<Self, Self::Error> {
        let mut def = PivotDefinition::new(parts.source);
        def.info = parts.info;
        def.generated_keys = parts.generated_keys;
        for (_, field) in parts.fields {
            def.fields.insert(field.name.clone(), field);
        }

        for filter in parts.filters {
            def.field(filter.field())?;
            def.filters.push(filter);
        }
        for row in &parts.rows {
            def.add_row(row)?;
        }
        for column in &parts.columns {
            def.add_column(column)?;
        }
        for (key, aggregate) in parts.aggregates {
            def.field(aggregate.source_field())?;
            if key.is_empty() || key != aggregate.output_key() {
                return Err(DefinitionError::AggregateKeyMismatch {
                    key,
                    output_key: aggregate.output_key().to_string(),
                });
            }
            if def.aggregates.contains_key(&key) {
                return Err(DefinitionError::DuplicateAggregate(key));
            }
            def.aggregates.insert(key, aggregate);
        }
        Ok(def)
    }
}

impl PivotDefinition {
    pub fn new(source: impl Into<String>) -> Self {
        PivotDefinition {
            source: source.into(),
            fields: OrderedMap::new(),
            filters: Vec::new(),
            rows: Vec::new(),
            columns: Vec::new(),
            aggregates: OrderedMap::new(),
            info: PivotInfo::default(),
            generated_keys: 0,
        }
    }

    // ------------------------------------------------------------------------
    // Source and info
    // ------------------------------------------------------------------------

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
    }

    pub fn info(&self) -> &PivotInfo {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut PivotInfo {
        &mut self.info
    }

    pub fn clear_info(&mut self) {
        self.info = PivotInfo::default();
    }

    // ------------------------------------------------------------------------
    // Mutators
    // ------------------------------------------------------------------------

    /// Adds a field to the catalogue. Re-adding a name replaces its
    /// caption and type in place.
    pub fn add_source_field(
        &mut self,
        name: impl Into<String>,
        caption: impl Into<String>,
        field_type: FieldType,
    ) {
        let field = Field::new(name, caption, field_type);
        self.fields.insert(field.name.clone(), field);
    }

    pub fn add_filter(
        &mut self,
        field: &str,
        operator: FilterOperator,
        argument: impl Into<FilterArgument>,
    ) -> Result<(), DefinitionError> {
        self.field(field)?;
        self.filters.push(Filter::new(field, operator, argument)?);
        Ok(())
    }

    /// Adds a field to the Row area. Adding a field twice keeps the first position.
    pub fn add_row(&mut self, field: &str) -> Result<(), DefinitionError> {
        self.field(field)?;
        if !self.rows.iter().any(|r| r == field) {
            self.rows.push(field.to_string());
        }
        Ok(())
    }

    /// Adds a field to the Column area. Adding a field twice keeps the first position.
    pub fn add_column(&mut self, field: &str) -> Result<(), DefinitionError> {
        self.field(field)?;
        if !self.columns.iter().any(|c| c == field) {
            self.columns.push(field.to_string());
        }
        Ok(())
    }

    /// Adds an aggregate and returns its output key.
    /// An empty `output_key` gets a generated one.
    pub fn add_aggregate(
        &mut self,
        source_field: &str,
        output_key: &str,
        caption: &str,
        function: AggregateFunction,
        decimals: u8,
        order: SortDirection,
    ) -> Result<String, DefinitionError> {
        self.field(source_field)?;

        let key = if output_key.is_empty() {
            self.next_generated_key()
        } else if self.aggregates.contains_key(output_key) {
            return Err(DefinitionError::DuplicateAggregate(output_key.to_string()));
        } else {
            output_key.to_string()
        };

        let aggregate = Aggregate::new(source_field, key.clone(), caption, function, decimals, order)?;
        self.aggregates.insert(key.clone(), aggregate);
        Ok(key)
    }

    fn next_generated_key(&mut self) -> String {
        loop {
            self.generated_keys += 1;
            let key = format!("{}{}", GENERATED_KEY_PREFIX, self.generated_keys);
            if !self.aggregates.contains_key(&key) {
                return key;
            }
        }
    }

    pub fn clear_rows(&mut self) {
        self.rows.clear();
    }

    pub fn clear_columns(&mut self) {
        self.columns.clear();
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    pub fn clear_aggregates(&mut self) {
        self.aggregates.clear();
    }

    /// Clears rows, columns, filters and aggregates. The catalogue stays.
    pub fn clear_selectors(&mut self) {
        self.clear_rows();
        self.clear_columns();
        self.clear_filters();
        self.clear_aggregates();
    }

    /// Clears everything except the source.
    pub fn reset(&mut self) {
        self.clear_info();
        self.fields.clear();
        self.clear_selectors();
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    /// Looks up a catalogue field.
    pub fn field(&self, name: &str) -> Result<&Field, DefinitionError> {
        self.fields
            .get(name)
            .ok_or_else(|| DefinitionError::UnknownField(name.to_string()))
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn source_fields(&self) -> impl Iterator<Item = &Field> + '_ {
        self.fields.values()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn aggregates(&self) -> &OrderedMap<Aggregate> {
        &self.aggregates
    }

    pub fn has_rows(&self) -> bool {
        !self.rows.is_empty()
    }

    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    pub fn current_rows(&self) -> Vec<SelectedField> {
        self.resolve_selection(&self.rows)
    }

    pub fn current_columns(&self) -> Vec<SelectedField> {
        self.resolve_selection(&self.columns)
    }

    pub fn current_filters(&self) -> Vec<FilterSummary> {
        self.filters
            .iter()
            .map(|filter| FilterSummary {
                filter: filter.clone(),
                caption: self.caption_of(filter.field()),
            })
            .collect()
    }

    pub fn current_aggregates(&self) -> Vec<Aggregate> {
        self.aggregates.values().cloned().collect()
    }

    /// Output key → sort direction, in aggregate declaration order.
    pub fn order_by(&self) -> Vec<(String, SortDirection)> {
        self.aggregates
            .iter()
            .map(|(key, aggregate)| (key.to_string(), aggregate.order()))
            .collect()
    }

    fn resolve_selection(&self, names: &[String]) -> Vec<SelectedField> {
        names
            .iter()
            .map(|name| SelectedField {
                name: name.clone(),
                caption: self.caption_of(name),
            })
            .collect()
    }

    fn caption_of(&self, name: &str) -> String {
        self.fields
            .get(name)
            .map(|f| f.caption.clone())
            .unwrap_or_else(|| name.to_string())
    }

    /// Builds the definition for the details query: an independent copy
    /// whose Row area is the columns followed by the rows, with no columns.
    pub fn details_definition(&self) -> PivotDefinition {
        let mut details = self.clone();
        details.rows = self
            .columns
            .iter()
            .chain(self.rows.iter())
            .fold(Vec::new(), |mut acc, name| {
                if !acc.contains(name) {
                    acc.push(name.clone());
                }
                acc
            });
        details.columns.clear();
        details
    }
}

impl Default for PivotDefinition {
    fn default() -> Self {
        PivotDefinition::new("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_definition() -> PivotDefinition {
        let mut def = PivotDefinition::new("sales");
        def.add_source_field("zone", "Zone", FieldType::Text);
        def.add_source_field("period", "Period", FieldType::Text);
        def.add_source_field("sale", "Sale", FieldType::Number);
        def
    }

    #[test]
    fn test_parse_value_objects() {
        assert_eq!("AVG".parse::<AggregateFunction>(), Ok(AggregateFunction::Average));
        assert_eq!("DESC".parse::<SortDirection>(), Ok(SortDirection::Descending));
        assert_eq!("HAVE".parse::<FilterOperator>(), Ok(FilterOperator::Contains));
        assert_eq!("DATETIME".parse::<FieldType>(), Ok(FieldType::DateTime));

        assert_eq!(
            "MEDIAN".parse::<AggregateFunction>(),
            Err(DefinitionError::UnknownAggregateFunction("MEDIAN".to_string()))
        );
        assert!(matches!("LIKE".parse::<FilterOperator>(), Err(DefinitionError::UnknownOperator(_))));
        assert!(matches!("up".parse::<SortDirection>(), Err(DefinitionError::UnknownSortDirection(_))));
        assert!(matches!("BLOB".parse::<FieldType>(), Err(DefinitionError::UnknownFieldType(_))));
    }

    #[test]
    fn test_filter_in_requires_list() {
        let err = Filter::new("zone", FilterOperator::In, "North").unwrap_err();
        assert!(matches!(err, DefinitionError::ArgumentMustBeList { .. }));

        let ok = Filter::new("zone", FilterOperator::In, vec!["North", "South"]).unwrap();
        assert_eq!(ok.argument(), &FilterArgument::List(vec!["North".into(), "South".into()]));
    }

    #[test]
    fn test_filter_rejects_list_and_null_for_scalar_operators() {
        let err = Filter::new("zone", FilterOperator::Equal, vec!["North"]).unwrap_err();
        assert!(matches!(err, DefinitionError::ArgumentCannotBeList { .. }));

        let err = Filter::new("zone", FilterOperator::Equal, ScalarValue::Null).unwrap_err();
        assert_eq!(err, DefinitionError::NullArgument { field: "zone".to_string() });
    }

    #[test]
    fn test_aggregate_decimals_range() {
        assert!(Aggregate::new("sale", "s", "Sale", AggregateFunction::Sum, 8, SortDirection::None).is_ok());
        assert_eq!(
            Aggregate::new("sale", "s", "Sale", AggregateFunction::Sum, 9, SortDirection::None),
            Err(DefinitionError::DecimalsOutOfRange(9))
        );
    }

    #[test]
    fn test_rows_and_columns_validate_and_dedupe() {
        let mut def = create_test_definition();
        def.add_row("zone").unwrap();
        def.add_row("zone").unwrap();
        def.add_column("period").unwrap();

        assert_eq!(def.rows(), &["zone".to_string()]);
        assert_eq!(def.add_row("customer"), Err(DefinitionError::UnknownField("customer".to_string())));
        assert_eq!(def.add_column("customer"), Err(DefinitionError::UnknownField("customer".to_string())));
        assert!(matches!(
            def.add_filter("customer", FilterOperator::Equal, "x"),
            Err(DefinitionError::UnknownField(_))
        ));
    }

    #[test]
    fn test_filters_keep_duplicates_in_order() {
        let mut def = create_test_definition();
        def.add_filter("zone", FilterOperator::Equal, "North").unwrap();
        def.add_filter("sale", FilterOperator::Greater, 10.0).unwrap();
        def.add_filter("zone", FilterOperator::Equal, "North").unwrap();

        let summaries = def.current_filters();
        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].caption, "Zone");
        assert_eq!(summaries[1].filter.operator(), FilterOperator::Greater);
        assert_eq!(summaries[0].filter, summaries[2].filter);
    }

    #[test]
    fn test_aggregate_keys_generated_and_unique() {
        let mut def = create_test_definition();
        let first = def
            .add_aggregate("sale", "", "Sum", AggregateFunction::Sum, 2, SortDirection::None)
            .unwrap();
        let second = def
            .add_aggregate("sale", "", "Avg", AggregateFunction::Average, 2, SortDirection::None)
            .unwrap();
        assert_eq!(first, "__aggregate_1");
        assert_eq!(second, "__aggregate_2");

        def.add_aggregate("sale", "total", "Total", AggregateFunction::Sum, 2, SortDirection::Descending)
            .unwrap();
        assert_eq!(
            def.add_aggregate("sale", "total", "Again", AggregateFunction::Max, 2, SortDirection::None),
            Err(DefinitionError::DuplicateAggregate("total".to_string()))
        );

        let order = def.order_by();
        assert_eq!(order.len(), 3);
        assert_eq!(order[2], ("total".to_string(), SortDirection::Descending));
    }

    #[test]
    fn test_current_selections_carry_captions() {
        let mut def = create_test_definition();
        def.add_row("zone").unwrap();
        def.add_column("period").unwrap();

        assert_eq!(
            def.current_rows(),
            vec![SelectedField { name: "zone".to_string(), caption: "Zone".to_string() }]
        );
        assert_eq!(def.current_columns()[0].caption, "Period");
        assert!(def.has_rows() && def.has_columns());
    }

    #[test]
    fn test_details_definition_is_independent() {
        let mut def = create_test_definition();
        def.add_row("zone").unwrap();
        def.add_column("period").unwrap();
        def.add_filter("sale", FilterOperator::Greater, 0.0).unwrap();

        let mut details = def.details_definition();
        assert_eq!(details.rows(), &["period".to_string(), "zone".to_string()]);
        assert!(details.columns().is_empty());

        details.add_source_field("customer", "Customer", FieldType::Text);
        details.add_filter("zone", FilterOperator::Equal, "North").unwrap();
        details.clear_aggregates();

        assert!(!def.has_field("customer"));
        assert_eq!(def.filters().len(), 1);
        assert_eq!(def.columns(), &["period".to_string()]);
    }

    #[test]
    fn test_clear_selectors_and_reset() {
        let mut def = create_test_definition();
        def.add_row("zone").unwrap();
        def.add_aggregate("sale", "s", "Sale", AggregateFunction::Sum, 2, SortDirection::None)
            .unwrap();
        def.info_mut().author = "ops".to_string();

        def.clear_selectors();
        assert!(!def.has_rows());
        assert!(def.aggregates().is_empty());
        assert!(def.has_field("zone"));

        def.reset();
        assert_eq!(def.source_fields().count(), 0);
        assert_eq!(def.info().author, "");
        assert_eq!(def.source(), "sales");
    }

    #[test]
    fn test_definition_json_round_trip_validates() {
        let mut def = create_test_definition();
        def.add_row("zone").unwrap();
        def.add_filter("zone", FilterOperator::In, vec!["North", "South"]).unwrap();
        def.add_aggregate("sale", "s", "Sale", AggregateFunction::Sum, 2, SortDirection::Ascending)
            .unwrap();

        let json = serde_json::to_string(&def).unwrap();
        let back: PivotDefinition = serde_json::from_str(&json).unwrap();
        assert_eq!(back, def);

        let bad = r#"{"field":"zone","operator":"IN","argument":"North"}"#;
        assert!(serde_json::from_str::<Filter>(bad).is_err());
    }

    #[test]
    fn test_loaded_definition_checks_catalogue() {
        let mut def = create_test_definition();
        def.add_row("zone").unwrap();
        def.add_aggregate("sale", "s", "Sale", AggregateFunction::Sum, 2, SortDirection::None)
            .unwrap();
        let json = serde_json::to_value(&def).unwrap();

        let mut ghost_row = json.clone();
        ghost_row["rows"] = serde_json::json!(["ghost"]);
        let err = serde_json::from_value::<PivotDefinition>(ghost_row).unwrap_err();
        assert!(err.to_string().contains("Field ghost does not exist"));

        let mut ghost_column = json.clone();
        ghost_column["columns"] = serde_json::json!(["ghost"]);
        assert!(serde_json::from_value::<PivotDefinition>(ghost_column).is_err());

        let mut ghost_filter = json.clone();
        ghost_filter["filters"] = serde_json::json!([
            {"field": "ghost", "operator": "=", "argument": "x"}
        ]);
        assert!(serde_json::from_value::<PivotDefinition>(ghost_filter).is_err());

        let aggregate = json["aggregates"][0][1].clone();
        let mut duplicated = json.clone();
        duplicated["aggregates"] = serde_json::json!([["s", aggregate.clone()], ["s", aggregate]]);
        let err = serde_json::from_value::<PivotDefinition>(duplicated).unwrap_err();
        assert!(err.to_string().contains("Aggregate s is already defined"));
    }
}
