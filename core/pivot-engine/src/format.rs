//! FILENAME: core/pivot-engine/src/format.rs
//! Value Formatter - Turns raw aggregate numbers into display strings.
//!
//! Runs once over a finished (and possibly ordered) tree. Every numeric
//! value under a known output key becomes fixed-decimal text. Nulls and
//! non-numeric values are left as they are.

use pivot_values::{format_decimal, ScalarValue};

use crate::definition::Aggregate;
use crate::tree::{NodeId, ResultTree};

pub struct ValueFormatter {
    /// Output key → decimal places, in aggregate declaration order.
    decimals: Vec<(String, u8)>,
}

impl ValueFormatter {
    pub fn new(aggregates: &[Aggregate]) -> Self {
        ValueFormatter {
            decimals: aggregates
                .iter()
                .map(|a| (a.output_key().to_string(), a.decimals()))
                .collect(),
        }
    }

    /// Formats every node of the tree, children before their parent.
    pub fn format(&self, tree: &mut ResultTree) {
        for id in post_order(tree) {
            self.format_node(tree, id);
        }
    }

    fn format_node(&self, tree: &mut ResultTree, id: NodeId) {
        for (key, decimals) in &self.decimals {
            let formatted = tree
                .node(id)
                .and_then(|node| node.value(key))
                .and_then(format_value(*decimals));
            if let Some(text) = formatted {
                tree.set_value(id, key, ScalarValue::Text(text));
            }
        }
    }
}

fn format_value(decimals: u8) -> impl Fn(&ScalarValue) -> Option<String> {
    move |value| match value {
        ScalarValue::Null | ScalarValue::Boolean(_) => None,
        other => other.as_f64().map(|n| format_decimal(n, decimals)),
    }
}

fn post_order(tree: &ResultTree) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(tree.len());
    let mut stack = vec![(tree.root(), false)];
    while let Some((node, expanded)) = stack.pop() {
        if expanded {
            order.push(node.id());
            continue;
        }
        stack.push((node, true));
        let children: Vec<_> = node.children().collect();
        stack.extend(children.into_iter().rev().map(|child| (child, false)));
    }
    order
}
