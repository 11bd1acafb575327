//! FILENAME: core/pivot-engine/src/builder.rs
//! Tree Builder - Folds flat rollup rows into a `ResultTree`.
//!
//! Each row is walked along the group fields from the root. A null group
//! value marks a rollup row for the level reached so far, so the walk stops
//! there. Whatever node the walk ends on receives the row's aggregates.

use pivot_values::ScalarValue;

use crate::definition::Aggregate;
use crate::error::IntegrityError;
use crate::logging::{log_debug, log_warn};
use crate::source::FlatRow;
use crate::tree::{NodeValues, ResultTree};

/// Builds one result tree from one flat row set.
pub struct TreeBuilder<'a> {
    group_fields: &'a [String],
    aggregate_keys: Vec<&'a str>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(group_fields: &'a [String], aggregates: &'a [Aggregate]) -> Self {
        TreeBuilder {
            group_fields,
            aggregate_keys: aggregates.iter().map(|a| a.output_key()).collect(),
        }
    }

    pub fn build(&self, rows: &[FlatRow]) -> Result<ResultTree, IntegrityError> {
        let mut tree = ResultTree::new();

        for row in rows {
            let mut node = tree.root_id();
            for field in self.group_fields {
                let group = row.group(field);
                if group.is_null() {
                    break;
                }
                node = tree.ensure_child(node, field, &group.display_value())?;
            }
            if let Err(err) = tree.set_values(node, self.values_of(row)) {
                log_warn!("BUILDER", "{}", err);
                return Err(err);
            }
        }

        log_debug!(
            "BUILDER",
            "built tree from {} rows: {} nodes over {} levels",
            rows.len(),
            tree.len(),
            self.group_fields.len()
        );

        Ok(tree)
    }

    /// Aggregate values of a row in declaration order. A key the row does
    /// not carry reads as null.
    fn values_of(&self, row: &FlatRow) -> NodeValues {
        self.aggregate_keys
            .iter()
            .map(|&key| (key, row.value(key).cloned().unwrap_or(ScalarValue::Null)))
            .collect()
    }
}

/// Convenience wrapper around `TreeBuilder`.
pub fn build_tree(
    rows: &[FlatRow],
    group_fields: &[String],
    aggregates: &[Aggregate],
) -> Result<ResultTree, IntegrityError> {
    TreeBuilder::new(group_fields, aggregates).build(rows)
}
