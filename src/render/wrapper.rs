//! The wrapper overlay: per-rendered-node bookkeeping the reconciler keeps
//! between passes.
//!
//! Wrappers live in a slotmap arena with parent and next-sibling side tables
//! plus reverse indexes from widget instances and target handles. Nothing in
//! here is garbage collected; the reconciler evicts wrappers explicitly when
//! a node is replaced or removed.

use std::collections::HashMap;
use std::hash::Hash;

use slotmap::{new_key_type, SecondaryMap, SlotMap, SparseSecondaryMap};

use crate::error::RenderError;
use crate::node::Node;
use crate::widget::WidgetId;

new_key_type! {
    /// Handle to one wrapper in the overlay.
    pub struct WrapperKey;
}

/// Reconciler state for one rendered node.
pub(crate) struct Wrapper<N> {
    /// The node description this wrapper was built from.
    pub node: Node,
    /// Distance from the root, used to order invalidation batches.
    pub depth: usize,
    /// The live target handle, for leaves that have been materialized.
    pub target: Option<N>,
    /// The live instance, for widget wrappers.
    pub instance: Option<WidgetId>,
    /// Wrapped children, once the subtree below has been processed.
    pub children: Option<Vec<WrapperKey>>,
}

impl<N> Wrapper<N> {
    pub fn new(node: Node, depth: usize) -> Self {
        Self {
            node,
            depth,
            target: None,
            instance: None,
            children: None,
        }
    }
}

/// The overlay arena plus its side tables.
pub(crate) struct WrapperStore<N: Copy + Eq + Hash> {
    wrappers: SlotMap<WrapperKey, Wrapper<N>>,
    parent: SecondaryMap<WrapperKey, WrapperKey>,
    sibling: SecondaryMap<WrapperKey, WrapperKey>,
    by_instance: SparseSecondaryMap<WidgetId, WrapperKey>,
    by_target: HashMap<N, WrapperKey>,
}

impl<N: Copy + Eq + Hash> Default for WrapperStore<N> {
    fn default() -> Self {
        Self {
            wrappers: SlotMap::with_key(),
            parent: SecondaryMap::new(),
            sibling: SecondaryMap::new(),
            by_instance: SparseSecondaryMap::new(),
            by_target: HashMap::new(),
        }
    }
}

impl<N: Copy + Eq + Hash> WrapperStore<N> {
    pub fn insert(&mut self, wrapper: Wrapper<N>) -> WrapperKey {
        self.wrappers.insert(wrapper)
    }

    pub fn get(&self, key: WrapperKey) -> Option<&Wrapper<N>> {
        self.wrappers.get(key)
    }

    pub fn get_mut(&mut self, key: WrapperKey) -> Option<&mut Wrapper<N>> {
        self.wrappers.get_mut(key)
    }

    pub fn contains(&self, key: WrapperKey) -> bool {
        self.wrappers.contains_key(key)
    }

    // ── side tables ──────────────────────────────────────────────────

    pub fn parent(&self, key: WrapperKey) -> Option<WrapperKey> {
        self.parent.get(key).copied()
    }

    pub fn set_parent(&mut self, key: WrapperKey, parent: WrapperKey) {
        self.parent.insert(key, parent);
    }

    pub fn next_sibling(&self, key: WrapperKey) -> Option<WrapperKey> {
        self.sibling.get(key).copied()
    }

    pub fn set_next_sibling(&mut self, key: WrapperKey, next: WrapperKey) {
        self.sibling.insert(key, next);
    }

    pub fn wrapper_of_instance(&self, id: WidgetId) -> Option<WrapperKey> {
        self.by_instance.get(id).copied()
    }

    pub fn link_instance(&mut self, id: WidgetId, key: WrapperKey) {
        self.by_instance.insert(id, key);
    }

    pub fn wrapper_of_target(&self, target: N) -> Option<WrapperKey> {
        self.by_target.get(&target).copied()
    }

    pub fn link_target(&mut self, target: N, key: WrapperKey) {
        self.by_target.insert(target, key);
    }

    // ── wrapping ─────────────────────────────────────────────────────

    /// Wrap a child list: validate each node, insert wrappers, and link the
    /// parent and next-sibling tables. `parent` is `None` only at the root.
    pub fn wrap_children(
        &mut self,
        parent: Option<WrapperKey>,
        nodes: Vec<Node>,
        depth: usize,
    ) -> Result<Vec<WrapperKey>, RenderError> {
        for node in &nodes {
            validate(node)?;
        }
        let keys: Vec<WrapperKey> = nodes
            .into_iter()
            .map(|node| self.insert(Wrapper::new(node, depth)))
            .collect();
        for (index, &key) in keys.iter().enumerate() {
            if let Some(parent) = parent {
                self.parent.insert(key, parent);
            }
            if let Some(&next) = keys.get(index + 1) {
                self.sibling.insert(key, next);
            }
        }
        Ok(keys)
    }

    /// Re-point the parent entries of `children` at `parent`. Used when a
    /// clean-skipped or re-rendered widget keeps its child wrappers but gets
    /// a fresh wrapper of its own.
    pub fn adopt_children(&mut self, parent: WrapperKey, children: &[WrapperKey]) {
        for &child in children {
            self.parent.insert(child, parent);
        }
    }

    /// Evict a wrapper from the arena and every side table, returning it.
    /// Reverse-index entries are only dropped when they still point at this
    /// key, since replacement re-points them before releasing the old key.
    pub fn release(&mut self, key: WrapperKey) -> Option<Wrapper<N>> {
        let wrapper = self.wrappers.remove(key)?;
        self.parent.remove(key);
        self.sibling.remove(key);
        if let Some(id) = wrapper.instance {
            if self.by_instance.get(id) == Some(&key) {
                self.by_instance.remove(id);
            }
        }
        if let Some(target) = wrapper.target {
            if self.by_target.get(&target) == Some(&key) {
                self.by_target.remove(&target);
            }
        }
        Some(wrapper)
    }
}

fn validate(node: &Node) -> Result<(), RenderError> {
    if let Node::Leaf(leaf) = node {
        if leaf.tag.is_empty() {
            if leaf.text.is_none() {
                return Err(RenderError::MalformedNode);
            }
            if !leaf.children.is_empty() {
                return Err(RenderError::TextWithChildren);
            }
        }
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
