//! Render targets: the mutation surface the reconciler commits into.
//!
//! The engine never touches a concrete backing tree directly. Everything it
//! does to one goes through [`RenderTarget`], so the same reconciler drives
//! the in-memory test tree in [`memory`] or any host-provided backing store.

use std::fmt::Debug;
use std::hash::Hash;

pub mod memory;

pub use memory::{MemoryTree, TargetId};

// ---------------------------------------------------------------------------
// Node operations
// ---------------------------------------------------------------------------

/// Imperative operations a property can request on its node.
///
/// These fire on transitions (a boolean property flipping to `true`, or a
/// predicate property returning `true`), not on every pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeOp {
    Focus,
    Blur,
    Click,
    ScrollIntoView,
}

impl NodeOp {
    /// Map a property name to an operation, if it names one.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "focus" => Some(Self::Focus),
            "blur" => Some(Self::Blur),
            "click" => Some(Self::Click),
            "scroll_into_view" => Some(Self::ScrollIntoView),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::Blur => "blur",
            Self::Click => "click",
            Self::ScrollIntoView => "scroll_into_view",
        }
    }
}

// ---------------------------------------------------------------------------
// RenderTarget
// ---------------------------------------------------------------------------

/// A mutable backing tree the reconciler renders into.
///
/// Handles are plain copyable ids; the target owns all node storage. Create
/// calls produce detached nodes, and [`insert_before`](RenderTarget::insert_before)
/// with `before: None` appends. Operations on handles the target no longer
/// knows are expected to be tolerated silently; the engine logs and moves on.
pub trait RenderTarget {
    /// Handle to one node in the backing tree.
    type Node: Copy + Eq + Hash + Debug;

    /// Create a detached element node.
    fn create_element(&mut self, tag: &str) -> Self::Node;

    /// Create a detached text node.
    fn create_text(&mut self, contents: &str) -> Self::Node;

    /// Replace a text node's contents.
    fn set_text(&mut self, node: Self::Node, contents: &str);

    /// Attach `node` under `parent`, before `before` (append when `None`).
    /// Re-inserting an attached node moves it, subtree intact.
    fn insert_before(&mut self, parent: Self::Node, node: Self::Node, before: Option<Self::Node>);

    /// Remove a node and its subtree.
    fn remove(&mut self, node: Self::Node);

    /// The parent of an attached node; `None` when detached or unknown.
    fn parent_of(&self, node: Self::Node) -> Option<Self::Node>;

    fn set_attribute(&mut self, node: Self::Node, name: &str, value: &str);

    fn remove_attribute(&mut self, node: Self::Node, name: &str);

    fn add_class(&mut self, node: Self::Node, class: &str);

    fn remove_class(&mut self, node: Self::Node, class: &str);

    /// Set one style entry; `None` clears it.
    fn set_style(&mut self, node: Self::Node, name: &str, value: Option<&str>);

    /// Set the control value of an input-like node.
    fn set_value(&mut self, node: Self::Node, value: &str);

    /// The current control value, if the node carries one.
    fn value(&self, node: Self::Node) -> Option<String>;

    /// Perform an imperative node operation.
    fn perform(&mut self, node: Self::Node, op: NodeOp);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_op_names_round_trip() {
        for op in [NodeOp::Focus, NodeOp::Blur, NodeOp::Click, NodeOp::ScrollIntoView] {
            assert_eq!(NodeOp::from_name(op.name()), Some(op));
        }
        assert_eq!(NodeOp::from_name("hover"), None);
    }
}
