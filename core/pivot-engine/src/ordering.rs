//! FILENAME: core/pivot-engine/src/ordering.rs
//! Result Ordering - Recursive re-sort of sibling groups.
//!
//! Siblings are compared by aggregate value, walking the output keys in
//! declaration order and using the first key with a direction. Ties fall
//! through to the next directional key and finally to a case-insensitive
//! caption comparison.
//!
//! Must run after the tree is built and before values are formatted.

use std::cmp::Ordering;

use crate::definition::{Aggregate, SortDirection};
use crate::error::IntegrityError;
use crate::tree::{NodeId, ResultNode, ResultTree};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultOrdering {
    order_by: Vec<(String, SortDirection)>,
}

impl ResultOrdering {
    pub fn new(order_by: Vec<(String, SortDirection)>) -> Self {
        ResultOrdering { order_by }
    }

    pub fn from_aggregates(aggregates: &[Aggregate]) -> Self {
        Self::new(
            aggregates
                .iter()
                .map(|a| (a.output_key().to_string(), a.order()))
                .collect(),
        )
    }

    /// True when any key carries a direction.
    pub fn is_required(&self) -> bool {
        self.order_by
            .iter()
            .any(|(_, direction)| *direction != SortDirection::None)
    }

    pub fn compare(&self, a: &ResultNode, b: &ResultNode) -> Ordering {
        for (key, direction) in &self.order_by {
            let ordering = match direction {
                SortDirection::None => continue,
                SortDirection::Ascending => compare_numeric(a, b, key),
                SortDirection::Descending => compare_numeric(b, a, key),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        compare_captions(a.caption(), b.caption())
    }

    /// Sorts the children of `node`, then recurses into every child.
    pub fn order_by(&self, tree: &mut ResultTree, node: NodeId) -> Result<(), IntegrityError> {
        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            tree.sort_children_by(current, |a, b| self.compare(a, b))?;
            if let Some(view) = tree.node(current) {
                pending.extend(view.children().map(|child| child.id()));
            }
        }
        Ok(())
    }
}

/// Missing or non-numeric values (NaN included) sort before any number.
fn compare_numeric(a: &ResultNode, b: &ResultNode, key: &str) -> Ordering {
    let numeric = |node: &ResultNode| {
        node.value(key)
            .and_then(|v| v.as_f64())
            .filter(|n| !n.is_nan())
    };
    match (numeric(a), numeric(b)) {
        (Some(l), Some(r)) => l.total_cmp(&r),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// ASCII case-insensitive comparison.
fn compare_captions(a: &str, b: &str) -> Ordering {
    a.bytes()
        .map(|c| c.to_ascii_lowercase())
        .cmp(b.bytes().map(|c| c.to_ascii_lowercase()))
}
