//! FILENAME: core/pivot-engine/src/error.rs

use thiserror::Error;

/// Invalid construction input for a pivot definition or one of its value objects.
/// Always raised eagerly, before anything is queried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("Invalid aggregate function: {0}")]
    UnknownAggregateFunction(String),

    #[error("Invalid value for decimals: {0} (expected 0 to 8)")]
    DecimalsOutOfRange(u8),

    #[error("Invalid sort direction: {0}")]
    UnknownSortDirection(String),

    #[error("Invalid filter operator: {0}")]
    UnknownOperator(String),

    #[error("Invalid field type: {0}")]
    UnknownFieldType(String),

    #[error("Invalid argument for {field}, is null")]
    NullArgument { field: String },

    #[error("Invalid argument for {field}, operator {operator} requires a list")]
    ArgumentMustBeList { field: String, operator: String },

    #[error("Invalid argument for {field}, operator {operator} cannot take a list")]
    ArgumentCannotBeList { field: String, operator: String },

    #[error("Field {0} does not exist")]
    UnknownField(String),

    #[error("Aggregate {0} is already defined")]
    DuplicateAggregate(String),

    #[error("Aggregate stored under '{key}' has output key '{output_key}'")]
    AggregateKeyMismatch { key: String, output_key: String },
}

/// The definition cannot be turned into the requested flat query.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    #[error("Nothing to query")]
    NothingToQuery,

    #[error("Cannot get details if no columns are defined")]
    NoColumns,
}

/// The execution collaborator failed or returned something that is not a table.
#[derive(Error, Debug)]
#[error("Query error: {message}")]
pub struct ExecutionError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>) -> Self {
        ExecutionError {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps the collaborator's own error as the cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        ExecutionError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Structural violation while filling a result tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntegrityError {
    #[error("Duplicated values when filling the results at [{}]", .path.join(" / "))]
    DuplicateValues { path: Vec<String> },

    #[error("Parent of node {0} has been set already")]
    ParentAlreadySet(usize),

    #[error("Node {0} does not belong to this tree")]
    UnknownNode(usize),
}

/// Umbrella error for the top-level query operation.
#[derive(Error, Debug)]
pub enum PivotError {
    #[error(transparent)]
    Definition(#[from] DefinitionError),

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}
