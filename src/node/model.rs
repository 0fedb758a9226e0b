//! Node model: the declarative description of a render tree.
//!
//! A [`Node`] is a tagged union of two shapes: a *leaf* describing a concrete
//! target-tree element or text run, and a *widget* describing a component to
//! be instantiated (or continued) by the renderer. Nodes are plain,
//! disposable data. They carry no back-references and no live handles; the
//! wrapper overlay in [`crate::render`] owns all of that bookkeeping.

use std::any::TypeId;

use super::props::{PropValue, Props};
use crate::widget::Widget;

// ---------------------------------------------------------------------------
// WidgetKind
// ---------------------------------------------------------------------------

/// A copyable widget type reference: a display name, the concrete type's
/// identity, and a factory for fresh instances.
///
/// Two kinds compare equal iff they reference the same concrete type, which
/// is the "same widget constructor" signal used by same-node matching.
#[derive(Clone, Copy)]
pub struct WidgetKind {
    name: &'static str,
    type_id: TypeId,
    construct: fn() -> Box<dyn Widget>,
}

impl WidgetKind {
    /// The kind for a concrete widget type constructible via `Default`.
    pub fn of<W: Widget + Default>() -> Self {
        fn construct<W: Widget + Default>() -> Box<dyn Widget> {
            Box::new(W::default())
        }
        Self {
            name: std::any::type_name::<W>(),
            type_id: TypeId::of::<W>(),
            construct: construct::<W>,
        }
    }

    /// The display name (the concrete type's path).
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Build a fresh widget of this kind.
    pub(crate) fn instantiate(&self) -> Box<dyn Widget> {
        (self.construct)()
    }
}

impl PartialEq for WidgetKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for WidgetKind {}

impl std::fmt::Debug for WidgetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "WidgetKind({})", self.name)
    }
}

// ---------------------------------------------------------------------------
// Node shapes
// ---------------------------------------------------------------------------

/// The widget reference carried by a widget node: either a concrete kind or
/// a registry label to be resolved later.
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetSpec {
    /// A concrete widget type.
    Kind(WidgetKind),
    /// A label resolved through the registry. Unresolved labels never match
    /// a previous node, so resolution recreates the subtree.
    Label(String),
}

/// A leaf node: a concrete target element (non-empty tag) or a text run
/// (empty tag, `text` set).
#[derive(Debug, Clone)]
pub struct LeafNode {
    /// Element tag. Empty for pure text.
    pub tag: String,
    /// Property bag applied to the live element.
    pub props: Props,
    /// Ordered child descriptions.
    pub children: Vec<Node>,
    /// Literal text contents, for text leaves.
    pub text: Option<String>,
}

/// A widget node: opaque until the renderer materializes an instance and
/// asks it to render.
#[derive(Debug, Clone)]
pub struct WidgetNode {
    /// The widget type or registry label.
    pub spec: WidgetSpec,
    /// Property bag forwarded into the instance.
    pub props: Props,
    /// Ordered child descriptions, consumed by the widget during render.
    pub children: Vec<Node>,
}

/// One entry in a declarative render tree.
#[derive(Debug, Clone)]
pub enum Node {
    /// A concrete element or text description.
    Leaf(LeafNode),
    /// A widget to instantiate or continue.
    Widget(WidgetNode),
}

impl Node {
    /// The node's property bag.
    pub fn props(&self) -> &Props {
        match self {
            Node::Leaf(leaf) => &leaf.props,
            Node::Widget(widget) => &widget.props,
        }
    }

    /// The reserved `key` property, if present.
    pub fn key(&self) -> Option<&PropValue> {
        self.props().key_value()
    }

    /// Whether this node is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    /// Whether this node is a widget.
    pub fn is_widget(&self) -> bool {
        matches!(self, Node::Widget(_))
    }

    /// Move the structural children out, leaving the node childless.
    pub(crate) fn take_children(&mut self) -> Vec<Node> {
        match self {
            Node::Leaf(leaf) => std::mem::take(&mut leaf.children),
            Node::Widget(widget) => std::mem::take(&mut widget.children),
        }
    }
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

/// Describe a target element.
///
/// Pure data builder: no validation beyond what the type system enforces,
/// and no side effects.
pub fn leaf(tag: impl Into<String>, props: Props, children: Vec<Node>) -> Node {
    Node::Leaf(LeafNode {
        tag: tag.into(),
        props,
        children,
        text: None,
    })
}

/// Describe a text run.
pub fn text(contents: impl Into<String>) -> Node {
    Node::Leaf(LeafNode {
        tag: String::new(),
        props: Props::new(),
        children: Vec::new(),
        text: Some(contents.into()),
    })
}

/// Describe a widget by concrete kind.
pub fn widget(kind: WidgetKind, props: Props, children: Vec<Node>) -> Node {
    Node::Widget(WidgetNode {
        spec: WidgetSpec::Kind(kind),
        props,
        children,
    })
}

/// Describe a widget by registry label, resolved lazily by the renderer.
pub fn labeled(label: impl Into<String>, props: Props, children: Vec<Node>) -> Node {
    Node::Widget(WidgetNode {
        spec: WidgetSpec::Label(label.into()),
        props,
        children,
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Blank;

    impl Widget for Blank {
        fn render(&mut self, _props: &Props, _children: &[Node]) -> Vec<Node> {
            Vec::new()
        }
    }

    #[derive(Default)]
    struct Other;

    impl Widget for Other {
        fn render(&mut self, _props: &Props, _children: &[Node]) -> Vec<Node> {
            Vec::new()
        }
    }

    #[test]
    fn leaf_constructor() {
        let node = leaf("div", Props::new().key("a"), vec![text("hi")]);
        assert!(node.is_leaf());
        assert_eq!(node.key(), Some(&PropValue::Str("a".into())));
        match &node {
            Node::Leaf(l) => {
                assert_eq!(l.tag, "div");
                assert_eq!(l.children.len(), 1);
                assert!(l.text.is_none());
            }
            Node::Widget(_) => panic!("expected leaf"),
        }
    }

    #[test]
    fn text_constructor() {
        let node = text("hello");
        match &node {
            Node::Leaf(l) => {
                assert!(l.tag.is_empty());
                assert_eq!(l.text.as_deref(), Some("hello"));
                assert!(l.children.is_empty());
            }
            Node::Widget(_) => panic!("expected leaf"),
        }
    }

    #[test]
    fn widget_constructor() {
        let node = widget(WidgetKind::of::<Blank>(), Props::new(), Vec::new());
        assert!(node.is_widget());
        match &node {
            Node::Widget(w) => assert_eq!(w.spec, WidgetSpec::Kind(WidgetKind::of::<Blank>())),
            Node::Leaf(_) => panic!("expected widget"),
        }
    }

    #[test]
    fn labeled_constructor() {
        let node = labeled("side-panel", Props::new(), Vec::new());
        match &node {
            Node::Widget(w) => assert_eq!(w.spec, WidgetSpec::Label("side-panel".into())),
            Node::Leaf(_) => panic!("expected widget"),
        }
    }

    #[test]
    fn kind_equality_is_type_identity() {
        assert_eq!(WidgetKind::of::<Blank>(), WidgetKind::of::<Blank>());
        assert_ne!(WidgetKind::of::<Blank>(), WidgetKind::of::<Other>());
    }

    #[test]
    fn label_never_equals_kind() {
        let label = WidgetSpec::Label("x".into());
        let kind = WidgetSpec::Kind(WidgetKind::of::<Blank>());
        assert_ne!(label, kind);
    }

    #[test]
    fn take_children_leaves_node_childless() {
        let mut node = leaf("ul", Props::new(), vec![leaf("li", Props::new(), vec![])]);
        let children = node.take_children();
        assert_eq!(children.len(), 1);
        match &node {
            Node::Leaf(l) => assert!(l.children.is_empty()),
            Node::Widget(_) => unreachable!(),
        }
    }
}
