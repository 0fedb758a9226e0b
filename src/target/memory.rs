//! An in-memory render target, backed by a slotmap arena.
//!
//! All nodes live in a single `SlotMap`. Parent/child relationships are
//! stored in secondary maps so removal is O(subtree size) and lookup is O(1).
//! Every mutating call bumps a counter and imperative operations append to a
//! log, which is what the no-op and ordering tests measure.

use std::collections::{BTreeMap, VecDeque};

use slotmap::{new_key_type, SecondaryMap, SlotMap};

use super::{NodeOp, RenderTarget};

new_key_type! {
    /// Handle to one node in a [`MemoryTree`].
    pub struct TargetId;
}

const EMPTY_CHILDREN: &[TargetId] = &[];

/// Stored state of one node: elements carry a tag, text nodes contents.
#[derive(Debug, Default, Clone)]
struct TargetData {
    tag: Option<String>,
    text: Option<String>,
    attributes: BTreeMap<String, String>,
    classes: Vec<String>,
    styles: BTreeMap<String, String>,
    value: Option<String>,
}

/// The in-memory backing tree used by hosts without a native one and by the
/// test suite.
#[derive(Default)]
pub struct MemoryTree {
    nodes: SlotMap<TargetId, TargetData>,
    children: SecondaryMap<TargetId, Vec<TargetId>>,
    parent: SecondaryMap<TargetId, TargetId>,
    mutations: usize,
    ops: Vec<(TargetId, NodeOp)>,
}

impl MemoryTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    // ── inspection ───────────────────────────────────────────────────

    pub fn contains(&self, id: TargetId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn children(&self, id: TargetId) -> &[TargetId] {
        self.children.get(id).map_or(EMPTY_CHILDREN, Vec::as_slice)
    }

    pub fn tag(&self, id: TargetId) -> Option<&str> {
        self.nodes.get(id).and_then(|n| n.tag.as_deref())
    }

    pub fn text(&self, id: TargetId) -> Option<&str> {
        self.nodes.get(id).and_then(|n| n.text.as_deref())
    }

    pub fn attribute(&self, id: TargetId, name: &str) -> Option<&str> {
        self.nodes
            .get(id)
            .and_then(|n| n.attributes.get(name))
            .map(String::as_str)
    }

    pub fn classes(&self, id: TargetId) -> &[String] {
        self.nodes.get(id).map_or(&[], |n| n.classes.as_slice())
    }

    pub fn style(&self, id: TargetId, name: &str) -> Option<&str> {
        self.nodes
            .get(id)
            .and_then(|n| n.styles.get(name))
            .map(String::as_str)
    }

    /// Mutations applied since the last [`reset_mutations`](Self::reset_mutations).
    pub fn mutations(&self) -> usize {
        self.mutations
    }

    pub fn reset_mutations(&mut self) {
        self.mutations = 0;
    }

    /// Imperative operations performed, in order.
    pub fn ops(&self) -> &[(TargetId, NodeOp)] {
        &self.ops
    }

    // ── snapshot printer ─────────────────────────────────────────────

    /// Render the subtree under `root` as an indented listing, elements as
    /// `<tag class=".." style=".." value=".." attr="..">` with attributes
    /// alphabetical, text nodes as quoted contents.
    pub fn render_to_string(&self, root: TargetId) -> String {
        let mut out = String::new();
        self.print(root, 0, &mut out);
        out
    }

    fn print(&self, id: TargetId, depth: usize, out: &mut String) {
        let Some(node) = self.nodes.get(id) else {
            return;
        };
        for _ in 0..depth {
            out.push_str("  ");
        }
        if let Some(text) = &node.text {
            out.push('"');
            out.push_str(text);
            out.push_str("\"\n");
            return;
        }
        out.push('<');
        out.push_str(node.tag.as_deref().unwrap_or(""));
        if !node.classes.is_empty() {
            out.push_str(&format!(" class=\"{}\"", node.classes.join(" ")));
        }
        if !node.styles.is_empty() {
            let styles: Vec<String> = node
                .styles
                .iter()
                .map(|(name, value)| format!("{name}: {value}"))
                .collect();
            out.push_str(&format!(" style=\"{}\"", styles.join("; ")));
        }
        if let Some(value) = &node.value {
            out.push_str(&format!(" value=\"{value}\""));
        }
        for (name, value) in &node.attributes {
            out.push_str(&format!(" {name}=\"{value}\""));
        }
        out.push_str(">\n");
        for &child in self.children(id) {
            self.print(child, depth + 1, out);
        }
    }

    fn with_node(&mut self, id: TargetId, apply: impl FnOnce(&mut TargetData)) {
        match self.nodes.get_mut(id) {
            Some(node) => {
                apply(node);
                self.mutations += 1;
            }
            None => tracing::debug!(?id, "mutation on unknown node ignored"),
        }
    }
}

impl RenderTarget for MemoryTree {
    type Node = TargetId;

    fn create_element(&mut self, tag: &str) -> TargetId {
        let id = self.nodes.insert(TargetData {
            tag: Some(tag.to_owned()),
            ..TargetData::default()
        });
        self.children.insert(id, Vec::new());
        self.mutations += 1;
        id
    }

    fn create_text(&mut self, contents: &str) -> TargetId {
        let id = self.nodes.insert(TargetData {
            text: Some(contents.to_owned()),
            ..TargetData::default()
        });
        self.children.insert(id, Vec::new());
        self.mutations += 1;
        id
    }

    fn set_text(&mut self, node: TargetId, contents: &str) {
        self.with_node(node, |n| n.text = Some(contents.to_owned()));
    }

    fn insert_before(&mut self, parent: TargetId, node: TargetId, before: Option<TargetId>) {
        if !self.nodes.contains_key(parent) || !self.nodes.contains_key(node) {
            tracing::debug!(?parent, ?node, "insert on unknown node ignored");
            return;
        }
        // Re-inserting moves: detach from the current parent first.
        if let Some(old_parent) = self.parent.remove(node) {
            if let Some(siblings) = self.children.get_mut(old_parent) {
                siblings.retain(|&child| child != node);
            }
        }
        self.parent.insert(node, parent);
        let siblings = self
            .children
            .get_mut(parent)
            .expect("live node must have a children vec");
        match before.and_then(|b| siblings.iter().position(|&child| child == b)) {
            Some(index) => siblings.insert(index, node),
            None => siblings.push(node),
        }
        self.mutations += 1;
    }

    fn remove(&mut self, node: TargetId) {
        if !self.nodes.contains_key(node) {
            tracing::debug!(?node, "remove of unknown node ignored");
            return;
        }
        if let Some(parent) = self.parent.remove(node) {
            if let Some(siblings) = self.children.get_mut(parent) {
                siblings.retain(|&child| child != node);
            }
        }
        let mut queue = VecDeque::new();
        queue.push_back(node);
        while let Some(current) = queue.pop_front() {
            if let Some(kids) = self.children.remove(current) {
                queue.extend(kids);
            }
            self.parent.remove(current);
            self.nodes.remove(current);
        }
        self.mutations += 1;
    }

    fn parent_of(&self, node: TargetId) -> Option<TargetId> {
        self.parent.get(node).copied()
    }

    fn set_attribute(&mut self, node: TargetId, name: &str, value: &str) {
        self.with_node(node, |n| {
            n.attributes.insert(name.to_owned(), value.to_owned());
        });
    }

    fn remove_attribute(&mut self, node: TargetId, name: &str) {
        self.with_node(node, |n| {
            n.attributes.remove(name);
        });
    }

    fn add_class(&mut self, node: TargetId, class: &str) {
        self.with_node(node, |n| {
            if !n.classes.iter().any(|c| c == class) {
                n.classes.push(class.to_owned());
            }
        });
    }

    fn remove_class(&mut self, node: TargetId, class: &str) {
        self.with_node(node, |n| n.classes.retain(|c| c != class));
    }

    fn set_style(&mut self, node: TargetId, name: &str, value: Option<&str>) {
        self.with_node(node, |n| {
            match value {
                Some(value) => n.styles.insert(name.to_owned(), value.to_owned()),
                None => n.styles.remove(name),
            };
        });
    }

    fn set_value(&mut self, node: TargetId, value: &str) {
        self.with_node(node, |n| n.value = Some(value.to_owned()));
    }

    fn value(&self, node: TargetId) -> Option<String> {
        self.nodes.get(node).and_then(|n| n.value.clone())
    }

    fn perform(&mut self, node: TargetId, op: NodeOp) {
        if !self.nodes.contains_key(node) {
            tracing::debug!(?node, ?op, "op on unknown node ignored");
            return;
        }
        self.ops.push((node, op));
        self.mutations += 1;
    }
}

// ===========================================================================
// Tests
// ===========================================================================
