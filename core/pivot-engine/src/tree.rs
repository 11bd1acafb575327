//! FILENAME: core/pivot-engine/src/tree.rs
//! Result Tree - The grouping hierarchy built from rollup rows.
//!
//! Nodes live in an arena owned by `ResultTree` and refer to each other by
//! `NodeId`. The parent link is a plain id assigned exactly once when a node
//! is attached, so the tree never owns cycles.
//!
//! Read access goes through `NodeRef`, a cheap copyable view that also
//! carries the header geometry used by renderers (depth, horizontal span,
//! current depth, path) and the path search used for cross-tab lookups.

use std::cmp::Ordering;
use std::fmt::Write as _;

use pivot_values::ScalarValue;
use smallvec::SmallVec;

use crate::collection::OrderedMap;
use crate::error::IntegrityError;

/// Aggregate output key → value, in aggregate declaration order.
pub type NodeValues = OrderedMap<ScalarValue>;

/// Captions from the root down to a node. Group hierarchies are shallow.
pub type CaptionPath = SmallVec<[String; 4]>;

/// Identifier of a node inside its `ResultTree`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

// ============================================================================
// NODE
// ============================================================================

/// A group at one level of the hierarchy.
#[derive(Debug, Clone)]
pub struct ResultNode {
    /// Field this node groups by. Empty at the root.
    group_field: String,

    /// Display form of the group value. Empty at the root.
    caption: String,

    /// Aggregates for this group. Assigned at most once.
    values: Option<NodeValues>,

    /// Children keyed by caption, in first-seen order unless re-sorted.
    children: OrderedMap<NodeId>,

    /// Set exactly once, when the node is attached.
    parent: Option<NodeId>,

    /// False for the column-axis levels of a details tree.
    is_row: bool,
}

impl ResultNode {
    fn new(group_field: impl Into<String>, caption: impl Into<String>) -> Self {
        ResultNode {
            group_field: group_field.into(),
            caption: caption.into(),
            values: None,
            children: OrderedMap::new(),
            parent: None,
            is_row: true,
        }
    }

    pub fn group_field(&self) -> &str {
        &self.group_field
    }

    pub fn caption(&self) -> &str {
        &self.caption
    }

    pub fn values(&self) -> Option<&NodeValues> {
        self.values.as_ref()
    }

    pub fn value(&self, key: &str) -> Option<&ScalarValue> {
        self.values.as_ref().and_then(|v| v.get(key))
    }

    pub fn is_row(&self) -> bool {
        self.is_row
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    fn set_parent(&mut self, own: NodeId, parent: NodeId) -> Result<(), IntegrityError> {
        if self.parent.is_some() {
            return Err(IntegrityError::ParentAlreadySet(own.0));
        }
        self.parent = Some(parent);
        Ok(())
    }
}

// ============================================================================
// TREE
// ============================================================================

/// Arena holding a root node and all of its descendants.
#[derive(Debug, Clone)]
pub struct ResultTree {
    nodes: Vec<ResultNode>,
}

impl ResultTree {
    /// Creates a tree with an empty root.
    pub fn new() -> Self {
        Self::with_root("", "")
    }

    fn with_root(group_field: &str, caption: &str) -> Self {
        ResultTree {
            nodes: vec![ResultNode::new(group_field, caption)],
        }
    }

    pub fn root_id(&self) -> NodeId {
        NodeId(0)
    }

    pub fn root(&self) -> NodeRef<'_> {
        NodeRef { tree: self, id: NodeId(0) }
    }

    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_>> {
        if id.0 < self.nodes.len() {
            Some(NodeRef { tree: self, id })
        } else {
            None
        }
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1 && !self.nodes[0].has_children() && self.nodes[0].values.is_none()
    }

    fn check(&self, id: NodeId) -> Result<(), IntegrityError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(IntegrityError::UnknownNode(id.0))
        }
    }

    /// Returns the child of `parent` keyed by `caption`, creating it if needed.
    pub fn ensure_child(
        &mut self,
        parent: NodeId,
        group_field: &str,
        caption: &str,
    ) -> Result<NodeId, IntegrityError> {
        self.check(parent)?;
        if let Some(&existing) = self.nodes[parent.0].children.get(caption) {
            return Ok(existing);
        }

        let id = NodeId(self.nodes.len());
        self.nodes.push(ResultNode::new(group_field, caption));
        self.attach(parent, id, caption)?;
        Ok(id)
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, key: &str) -> Result<(), IntegrityError> {
        self.nodes[child.0].set_parent(child, parent)?;
        self.nodes[parent.0].children.insert(key, child);
        Ok(())
    }

    /// Assigns the aggregates of a node. A node holding values already
    /// means two source rows share the same grouping key.
    pub fn set_values(&mut self, id: NodeId, values: NodeValues) -> Result<(), IntegrityError> {
        self.check(id)?;
        if self.nodes[id.0].values.is_some() {
            let path = self.root_path(id).into_vec();
            return Err(IntegrityError::DuplicateValues { path });
        }
        self.nodes[id.0].values = Some(values);
        Ok(())
    }

    /// Replaces the value under an existing key. Returns false when the node
    /// has no such value.
    pub fn set_value(&mut self, id: NodeId, key: &str, value: ScalarValue) -> bool {
        match self
            .nodes
            .get_mut(id.0)
            .and_then(|node| node.values.as_mut())
            .and_then(|values| values.get_mut(key))
        {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Flags the node and its descendants down to `levels` below it as
    /// column-axis (not row) nodes.
    pub fn set_as_not_row(&mut self, id: NodeId, levels: usize) -> Result<(), IntegrityError> {
        self.check(id)?;
        let mut stack = vec![(id, levels)];
        while let Some((current, remaining)) = stack.pop() {
            let node = &mut self.nodes[current.0];
            node.is_row = false;
            if remaining > 0 {
                stack.extend(node.children.values().map(|&child| (child, remaining - 1)));
            }
        }
        Ok(())
    }

    /// Stable re-sort of the immediate children of a node.
    pub fn sort_children_by<F>(&mut self, id: NodeId, mut compare: F) -> Result<(), IntegrityError>
    where
        F: FnMut(&ResultNode, &ResultNode) -> Ordering,
    {
        self.check(id)?;
        // The node keeps its children if `compare` panics mid-sort.
        let mut children = self.nodes[id.0].children.clone();
        let nodes = &self.nodes;
        children.sort_by(|(_, &a), (_, &b)| compare(&nodes[a.0], &nodes[b.0]));
        self.nodes[id.0].children = children;
        Ok(())
    }

    /// Copies the subtree under `id`, down to `levels` below it, into a new
    /// tree whose root is the copied node.
    pub fn copy(&self, id: NodeId, levels: usize) -> Result<ResultTree, IntegrityError> {
        self.check(id)?;
        let source = &self.nodes[id.0];
        let mut copy = ResultTree {
            nodes: vec![ResultNode {
                group_field: source.group_field.clone(),
                caption: source.caption.clone(),
                values: source.values.clone(),
                children: OrderedMap::new(),
                parent: None,
                is_row: source.is_row,
            }],
        };

        let mut stack = vec![(id, NodeId(0), levels)];
        while let Some((from, to, remaining)) = stack.pop() {
            if remaining == 0 {
                continue;
            }
            for (key, &child) in self.nodes[from.0].children.iter() {
                let original = &self.nodes[child.0];
                let new_id = NodeId(copy.nodes.len());
                copy.nodes.push(ResultNode {
                    group_field: original.group_field.clone(),
                    caption: original.caption.clone(),
                    values: original.values.clone(),
                    children: OrderedMap::new(),
                    parent: None,
                    is_row: original.is_row,
                });
                copy.attach(to, new_id, key)?;
                stack.push((child, new_id, remaining - 1));
            }
        }
        Ok(copy)
    }

    /// Debug dump, one node per line, indented by tabs.
    pub fn to_text_tree(&self, include_values: bool) -> String {
        let mut out = String::new();
        self.write_text(&mut out, self.root_id(), 0, include_values);
        out
    }

    fn write_text(&self, out: &mut String, id: NodeId, level: usize, include_values: bool) {
        let node = &self.nodes[id.0];
        if level > 0 {
            out.push('\n');
        }
        for _ in 0..level {
            out.push('\t');
        }
        let children = if node.has_children() {
            node.children.len().to_string()
        } else {
            "NO".to_string()
        };
        let values = match (&node.values, include_values) {
            (Some(values), true) => values
                .iter()
                .map(|(k, v)| format!("{} => {}", k, v))
                .collect::<Vec<_>>()
                .join(", "),
            _ => String::new(),
        };
        let _ = write!(
            out,
            "{}, {}, children: {}, [{}]",
            node.group_field, node.caption, children, values
        );
        for &child in node.children.values() {
            self.write_text(out, child, level + 1, include_values);
        }
    }

    fn root_path(&self, id: NodeId) -> CaptionPath {
        let mut path = CaptionPath::new();
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            path.push(self.nodes[current.0].caption.clone());
            current = parent;
        }
        path.reverse();
        path
    }
}

impl Default for ResultTree {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// NODE VIEW
// ============================================================================

/// Read-only view of one node of a tree.
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'a> {
    tree: &'a ResultTree,
    id: NodeId,
}

impl<'a> NodeRef<'a> {
    fn data(&self) -> &'a ResultNode {
        &self.tree.nodes[self.id.0]
    }

    fn at(&self, id: NodeId) -> NodeRef<'a> {
        NodeRef { tree: self.tree, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'a ResultTree {
        self.tree
    }

    pub fn group_field(&self) -> &'a str {
        &self.data().group_field
    }

    pub fn caption(&self) -> &'a str {
        &self.data().caption
    }

    pub fn values(&self) -> Option<&'a NodeValues> {
        self.data().values.as_ref()
    }

    pub fn value(&self, key: &str) -> Option<&'a ScalarValue> {
        self.data().value(key)
    }

    pub fn is_row(&self) -> bool {
        self.data().is_row
    }

    pub fn is_root(&self) -> bool {
        self.data().parent.is_none()
    }

    pub fn has_children(&self) -> bool {
        self.data().has_children()
    }

    pub fn parent(&self) -> Option<NodeRef<'a>> {
        self.data().parent.map(|id| self.at(id))
    }

    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        let tree = self.tree;
        self.data()
            .children
            .values()
            .map(move |&id| NodeRef { tree, id })
    }

    pub fn child(&self, caption: &str) -> Option<NodeRef<'a>> {
        self.data().children.get(caption).map(|&id| self.at(id))
    }

    /// Length of the longest chain of descendants below this node.
    /// With `as_rows`, only immediate children whose row flag matches count.
    pub fn depth(&self, as_rows: Option<bool>) -> usize {
        self.children()
            .filter(|child| as_rows.map_or(true, |rows| rows == child.is_row()))
            .map(|child| child.depth(None) + 1)
            .max()
            .unwrap_or(0)
    }

    /// Number of leaf descendants; 1 for a leaf. Drives a header cell's column span.
    /// With `as_rows`, only immediate children whose row flag matches count.
    pub fn horizontal_depth(&self, as_rows: Option<bool>) -> usize {
        if !self.has_children() {
            return 1;
        }
        self.children()
            .filter(|child| as_rows.map_or(true, |rows| rows == child.is_row()))
            .map(|child| child.horizontal_depth(None))
            .sum()
    }

    /// Distance from the root.
    pub fn current_depth(&self) -> usize {
        let mut depth = 0;
        let mut current = *self;
        while let Some(parent) = current.parent() {
            depth += 1;
            current = parent;
        }
        depth
    }

    /// Captions from the root down to this node, root excluded.
    pub fn path(&self) -> CaptionPath {
        self.tree.root_path(self.id)
    }

    /// Captions from the root down to this node, root caption included.
    pub fn full_path(&self) -> CaptionPath {
        let mut path = CaptionPath::new();
        let mut current = Some(*self);
        while let Some(node) = current {
            path.push(node.caption().to_string());
            current = node.parent();
        }
        path.reverse();
        path
    }

    /// Descends through children matching each caption in turn.
    /// Returns None as soon as a step is not found.
    pub fn search<S: AsRef<str>>(&self, path: &[S]) -> Option<NodeRef<'a>> {
        let mut current = *self;
        for caption in path {
            current = current.child(caption.as_ref())?;
        }
        Some(current)
    }

    /// Values of the node at `path` below this one. None when the path does
    /// not exist or the node holds no values.
    pub fn search_value<S: AsRef<str>>(&self, path: &[S]) -> Option<&'a NodeValues> {
        self.search(path).and_then(|node| node.values())
    }

    /// Last-level descendants, left to right. A leaf returns itself.
    pub fn leaves(&self) -> Vec<NodeRef<'a>> {
        if !self.has_children() {
            return vec![*self];
        }
        self.children().flat_map(|child| child.leaves()).collect()
    }
}
