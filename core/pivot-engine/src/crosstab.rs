//! FILENAME: core/pivot-engine/src/crosstab.rs
//! Cross-Tab Assembler - Reads matrix cells out of two trees.
//!
//! The details tree groups by the column fields first and the row fields
//! after them. Its top `column_count` levels are the column axis. A cell
//! for (column leaf, row node) is the details node reached by the column
//! leaf's path followed by the row node's path in the totals tree.

use crate::error::IntegrityError;
use crate::query::QueryResult;
use crate::tree::{CaptionPath, NodeRef, NodeValues, ResultTree};

/// Flags the column-axis levels of a details tree as not-row.
pub fn mark_column_levels(details: &mut ResultTree, column_count: usize) -> Result<(), IntegrityError> {
    let root = details.root_id();
    details.set_as_not_row(root, column_count)
}

pub struct CrossTabAssembler<'a> {
    details: Option<&'a ResultTree>,
    column_count: usize,
    /// The column axis alone: the details tree cut after the column levels.
    column_tree: ResultTree,
}

impl<'a> CrossTabAssembler<'a> {
    pub fn new(result: &'a QueryResult) -> Result<Self, IntegrityError> {
        Self::from_details(result.details(), result.columns().len())
    }

    pub fn from_details(details: Option<&'a ResultTree>, column_count: usize) -> Result<Self, IntegrityError> {
        let column_tree = match details {
            Some(tree) if column_count > 0 => tree.copy(tree.root_id(), column_count)?,
            _ => ResultTree::new(),
        };
        Ok(CrossTabAssembler {
            details,
            column_count,
            column_tree,
        })
    }

    pub fn column_count(&self) -> usize {
        self.column_count
    }

    pub fn has_columns(&self) -> bool {
        self.details.is_some() && self.column_count > 0
    }

    /// Root of the column axis, for header geometry.
    pub fn column_root(&self) -> NodeRef<'_> {
        self.column_tree.root()
    }

    /// Column leaves, left to right. Empty without a column axis.
    pub fn column_leaves(&self) -> Vec<CaptionPath> {
        if !self.has_columns() {
            return Vec::new();
        }
        self.column_tree.root().leaves().iter().map(|leaf| leaf.path()).collect()
    }

    /// Values of the details node at `column_path` followed by `row_path`.
    pub fn lookup<S: AsRef<str>>(&self, column_path: &[S], row_path: &[S]) -> Option<&'a NodeValues> {
        let details = self.details?;
        let path: Vec<&str> = column_path
            .iter()
            .chain(row_path.iter())
            .map(|caption| caption.as_ref())
            .collect();
        details.root().search_value(&path)
    }

    /// Cell values for a row node of the totals tree under one column leaf.
    pub fn cell(&self, column_path: &[String], row: NodeRef<'_>) -> Option<&'a NodeValues> {
        self.lookup(column_path, row.path().as_slice())
    }
}
