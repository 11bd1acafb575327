//! FILENAME: core/pivot-engine/src/lib.rs
//! Pivot query engine.
//!
//! Turns flat rollup result sets into grouping trees and assembles two such
//! trees (row groups, and column-then-row groups) into a cross-tab matrix.
//! It depends on `pivot-values` only for shared types (ScalarValue and
//! number display formatting).
//!
//! Layers:
//! - `definition`: Serializable configuration (what the pivot query IS)
//! - `shape`: Logical flat requests derived from a definition
//! - `source` / `memory`: The execution collaborator seam, and an in-memory one
//! - `tree` / `builder`: Result trees and how rollup rows fill them
//! - `ordering` / `format`: In-place passes over a built tree
//! - `crosstab` / `view`: Cross-tab lookups and the renderable matrix
//! - `query`: The pipeline tying it together

pub mod collection;
pub mod error;
pub mod logging;

pub mod definition;
pub mod shape;
pub mod source;
pub mod memory;
pub mod tree;
pub mod builder;
pub mod ordering;
pub mod format;
pub mod crosstab;
pub mod view;
pub mod query;

pub use collection::OrderedMap;
pub use definition::*;
pub use error::{DefinitionError, ExecutionError, IntegrityError, PivotError, ShapeError};
pub use shape::{
    details_request, distinct_request, totals_request, DistinctRequest, FlatRequest, Predicate,
    SelectItem, SourceRef,
};
pub use source::{FlatRow, QueryExecutor};
pub use memory::{MemoryExecutor, MemoryTable};
pub use tree::{CaptionPath, NodeId, NodeRef, NodeValues, ResultNode, ResultTree};
pub use builder::{build_tree, TreeBuilder};
pub use ordering::ResultOrdering;
pub use format::ValueFormatter;
pub use crosstab::{mark_column_levels, CrossTabAssembler};
pub use view::*;
pub use query::{PivotQuery, QueryResult};

pub use pivot_values::ScalarValue;
