//! Integration tests for veneer.
//!
//! These tests drive the renderer through its public API against the
//! in-memory target, verifying diffing, widget lifecycles, invalidation,
//! and commit ordering end to end.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use pretty_assertions::assert_eq;

use veneer::node::LeafNode;
use veneer::{
    labeled, leaf, text, widget, Event, Invalidator, MemoryTree, Node, Props, Registry,
    RenderError, RenderTarget, Renderer, TargetId, Widget, WidgetKind,
};

// ---------------------------------------------------------------------------
// Test plumbing
// ---------------------------------------------------------------------------

thread_local! {
    static STATE: RefCell<TestState> = RefCell::new(TestState::default());
}

#[derive(Default)]
struct TestState {
    renders: HashMap<String, usize>,
    detaches: HashMap<String, usize>,
    invalidators: HashMap<String, Invalidator>,
    toggles: HashMap<String, bool>,
}

fn note_render(name: &str) {
    STATE.with(|s| *s.borrow_mut().renders.entry(name.to_owned()).or_default() += 1);
}

fn renders(name: &str) -> usize {
    STATE.with(|s| s.borrow().renders.get(name).copied().unwrap_or(0))
}

fn note_detach(name: &str) {
    STATE.with(|s| *s.borrow_mut().detaches.entry(name.to_owned()).or_default() += 1);
}

fn detaches(name: &str) -> usize {
    STATE.with(|s| s.borrow().detaches.get(name).copied().unwrap_or(0))
}

fn register_invalidator(name: &str, invalidator: &Invalidator) {
    STATE.with(|s| {
        s.borrow_mut()
            .invalidators
            .insert(name.to_owned(), invalidator.clone());
    });
}

fn invalidate(name: &str) {
    STATE.with(|s| {
        if let Some(invalidator) = s.borrow().invalidators.get(name) {
            invalidator.invalidate();
        }
    });
}

fn set_toggle(name: &str, on: bool) {
    STATE.with(|s| {
        s.borrow_mut().toggles.insert(name.to_owned(), on);
    });
}

fn toggle(name: &str) -> bool {
    STATE.with(|s| s.borrow().toggles.get(name).copied().unwrap_or(false))
}

fn name_of(props: &Props) -> String {
    props
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("anonymous")
        .to_owned()
}

/// Renders a `counter` element with a text child taken from the `label`
/// property. Registers its invalidator under the `name` property.
#[derive(Default)]
struct Counter {
    invalidator: Option<Invalidator>,
}

impl Widget for Counter {
    fn render(&mut self, props: &Props, _children: &[Node]) -> Vec<Node> {
        let name = name_of(props);
        note_render(&name);
        if let Some(invalidator) = &self.invalidator {
            register_invalidator(&name, invalidator);
        }
        let label = props.get("label").and_then(|v| v.as_str()).unwrap_or("");
        vec![leaf(
            "counter",
            Props::new().with("name", name.as_str()),
            vec![text(label)],
        )]
    }

    fn on_attach(&mut self, invalidator: &Invalidator) {
        self.invalidator = Some(invalidator.clone());
    }

    fn on_detach(&mut self) {
        note_detach("Counter");
    }
}

/// Passes its declared children straight through.
#[derive(Default)]
struct Wrap {
    invalidator: Option<Invalidator>,
}

impl Widget for Wrap {
    fn render(&mut self, props: &Props, children: &[Node]) -> Vec<Node> {
        let name = name_of(props);
        note_render(&name);
        if let Some(invalidator) = &self.invalidator {
            register_invalidator(&name, invalidator);
        }
        children.to_vec()
    }

    fn on_attach(&mut self, invalidator: &Invalidator) {
        self.invalidator = Some(invalidator.clone());
    }

    fn on_detach(&mut self) {
        note_detach("Wrap");
    }
}

/// Renders one or two `x` elements depending on the toggle named by its
/// `name` property.
#[derive(Default)]
struct Tail {
    invalidator: Option<Invalidator>,
}

impl Widget for Tail {
    fn render(&mut self, props: &Props, _children: &[Node]) -> Vec<Node> {
        let name = name_of(props);
        note_render(&name);
        if let Some(invalidator) = &self.invalidator {
            register_invalidator(&name, invalidator);
        }
        let mut out = vec![leaf("x", Props::new().with("id", "x1"), vec![])];
        if toggle(&name) {
            out.push(leaf("x", Props::new().with("id", "x2"), vec![]));
        }
        out
    }

    fn on_attach(&mut self, invalidator: &Invalidator) {
        self.invalidator = Some(invalidator.clone());
    }
}

fn mounted<F>(produce: F) -> (Renderer<MemoryTree>, TargetId)
where
    F: FnMut() -> Node + 'static,
{
    let mut renderer = Renderer::new(MemoryTree::new(), produce);
    let root = renderer.target_mut().create_element("root");
    renderer.append(root).expect("mount");
    (renderer, root)
}

fn child_ids(renderer: &Renderer<MemoryTree>, node: TargetId) -> Vec<TargetId> {
    renderer.target().children(node).to_vec()
}

// ---------------------------------------------------------------------------
// Mounting and no-op diffs
// ---------------------------------------------------------------------------

#[test]
fn test_mount_builds_the_target_tree() {
    let (renderer, root) = mounted(|| {
        leaf(
            "panel",
            Props::new().classes(["main"]).with("id", "p"),
            vec![leaf("label", Props::new(), vec![text("hello")])],
        )
    });

    insta::assert_snapshot!(renderer.target().render_to_string(root), @r#"
    <root>
      <panel class="main" id="p">
        <label>
          "hello"
    "#);
}

#[test]
fn test_identical_output_causes_zero_mutations() {
    let (mut renderer, root) = mounted(|| {
        leaf(
            "panel",
            Props::new().with("id", "p").classes(["main"]),
            vec![text("hello"), leaf("item", Props::new(), vec![])],
        )
    });

    renderer.target_mut().reset_mutations();
    renderer.append(root).unwrap();
    assert_eq!(renderer.target().mutations(), 0);
}

#[test]
fn test_malformed_root_aborts_before_mutating() {
    let mut renderer = Renderer::new(MemoryTree::new(), || {
        Node::Leaf(LeafNode {
            tag: String::new(),
            props: Props::new(),
            children: vec![],
            text: None,
        })
    });
    let root = renderer.target_mut().create_element("root");
    renderer.target_mut().reset_mutations();

    assert!(matches!(
        renderer.append(root),
        Err(RenderError::MalformedNode)
    ));
    assert_eq!(renderer.target().mutations(), 0);
}

#[test]
fn test_flush_before_append_is_an_error() {
    let mut renderer = Renderer::new(MemoryTree::new(), || text("x"));
    assert!(matches!(renderer.flush(), Err(RenderError::NotAttached)));
}

// ---------------------------------------------------------------------------
// Text and property updates
// ---------------------------------------------------------------------------

#[test]
fn test_text_updates_in_place() {
    let message = Rc::new(RefCell::new("first".to_owned()));
    let source = Rc::clone(&message);
    let (mut renderer, root) = mounted(move || {
        leaf("panel", Props::new(), vec![text(source.borrow().clone())])
    });

    let panel = child_ids(&renderer, root)[0];
    let run = child_ids(&renderer, panel)[0];
    assert_eq!(renderer.target().text(run), Some("first"));

    *message.borrow_mut() = "second".to_owned();
    renderer.append(root).unwrap();
    assert_eq!(child_ids(&renderer, panel), vec![run]);
    assert_eq!(renderer.target().text(run), Some("second"));
}

#[test]
fn test_class_changes_diff_against_the_live_node() {
    let classes = Rc::new(RefCell::new(vec!["a".to_owned(), "b".to_owned()]));
    let source = Rc::clone(&classes);
    let (mut renderer, root) = mounted(move || {
        leaf(
            "panel",
            Props::new().classes(source.borrow().iter().cloned()),
            vec![],
        )
    });

    let panel = child_ids(&renderer, root)[0];
    assert_eq!(renderer.target().classes(panel), ["a", "b"]);

    *classes.borrow_mut() = vec!["b".to_owned(), "c".to_owned()];
    renderer.append(root).unwrap();
    assert_eq!(renderer.target().classes(panel), ["b", "c"]);
}

// ---------------------------------------------------------------------------
// Keyed children
// ---------------------------------------------------------------------------

fn keyed_list(keys: &[&str]) -> Node {
    leaf(
        "list",
        Props::new(),
        keys.iter()
            .map(|k| leaf("item", Props::new().key(*k).with("id", *k), vec![]))
            .collect(),
    )
}

#[test]
fn test_keyed_reorder_moves_live_nodes() {
    let model = Rc::new(RefCell::new(vec!["a", "b", "c"]));
    let source = Rc::clone(&model);
    let (mut renderer, root) = mounted(move || keyed_list(&source.borrow()));

    let list = child_ids(&renderer, root)[0];
    let before = child_ids(&renderer, list);
    let by_key: HashMap<&str, TargetId> = ["a", "b", "c"]
        .iter()
        .zip(before.iter())
        .map(|(k, id)| (*k, *id))
        .collect();

    *model.borrow_mut() = vec!["c", "a", "b"];
    renderer.append(root).unwrap();
    assert_eq!(
        child_ids(&renderer, list),
        vec![by_key["c"], by_key["a"], by_key["b"]]
    );
}

#[test]
fn test_keyed_insert_and_remove_keep_surviving_nodes() {
    let model = Rc::new(RefCell::new(vec!["a", "b", "c"]));
    let source = Rc::clone(&model);
    let (mut renderer, root) = mounted(move || keyed_list(&source.borrow()));

    let list = child_ids(&renderer, root)[0];
    let before = child_ids(&renderer, list);
    let (a, b, c) = (before[0], before[1], before[2]);

    *model.borrow_mut() = vec!["b", "x", "a"];
    renderer.append(root).unwrap();

    let after = child_ids(&renderer, list);
    assert_eq!(after.len(), 3);
    assert_eq!(after[0], b);
    assert_eq!(after[2], a);
    assert_eq!(renderer.target().attribute(after[1], "id"), Some("x"));
    assert!(!renderer.target().contains(c));
}

// ---------------------------------------------------------------------------
// Widget lifecycle
// ---------------------------------------------------------------------------

#[test]
fn test_clean_children_skip_re_rendering() {
    let (mut renderer, _root) = mounted(|| {
        widget(
            WidgetKind::of::<Wrap>(),
            Props::new().with("name", "parent"),
            vec![widget(
                WidgetKind::of::<Counter>(),
                Props::new().with("name", "child").with("label", "hi"),
                vec![],
            )],
        )
    });

    assert_eq!(renders("parent"), 1);
    assert_eq!(renders("child"), 1);

    // The parent re-renders with identical child properties; the child's
    // subtree is reused without calling its render.
    invalidate("parent");
    renderer.flush().unwrap();
    assert_eq!(renders("parent"), 2);
    assert_eq!(renders("child"), 1);
}

#[test]
fn test_selective_invalidation_re_renders_one_widget() {
    let (mut renderer, _root) = mounted(|| {
        leaf(
            "row",
            Props::new(),
            vec![
                widget(
                    WidgetKind::of::<Counter>(),
                    Props::new().key("one").with("name", "one").with("label", "1"),
                    vec![],
                ),
                widget(
                    WidgetKind::of::<Counter>(),
                    Props::new().key("two").with("name", "two").with("label", "2"),
                    vec![],
                ),
            ],
        )
    });
    assert_eq!((renders("one"), renders("two")), (1, 1));

    invalidate("one");
    renderer.flush().unwrap();
    assert_eq!((renders("one"), renders("two")), (2, 1));
}

#[test]
fn test_removal_detaches_each_widget_exactly_once() {
    let present = Rc::new(RefCell::new(true));
    let source = Rc::clone(&present);
    let (mut renderer, root) = mounted(move || {
        let children = if *source.borrow() {
            vec![widget(
                WidgetKind::of::<Wrap>(),
                Props::new(),
                vec![widget(
                    WidgetKind::of::<Counter>(),
                    Props::new().with("name", "inner").with("label", "x"),
                    vec![],
                )],
            )]
        } else {
            Vec::new()
        };
        leaf("shell", Props::new(), children)
    });

    let shell = child_ids(&renderer, root)[0];
    assert_eq!(child_ids(&renderer, shell).len(), 1);

    *present.borrow_mut() = false;
    renderer.append(root).unwrap();
    renderer.append(root).unwrap();

    assert_eq!(child_ids(&renderer, shell).len(), 0);
    assert_eq!(detaches("Wrap"), 1);
    assert_eq!(detaches("Counter"), 1);
}

#[test]
fn test_kind_change_replaces_without_carrying_state() {
    let use_counter = Rc::new(RefCell::new(true));
    let source = Rc::clone(&use_counter);
    let (mut renderer, root) = mounted(move || {
        let child = if *source.borrow() {
            widget(
                WidgetKind::of::<Counter>(),
                Props::new().with("name", "swap").with("label", "old"),
                vec![],
            )
        } else {
            widget(
                WidgetKind::of::<Tail>(),
                Props::new().with("name", "swap"),
                vec![],
            )
        };
        leaf("shell", Props::new(), vec![child])
    });

    let shell = child_ids(&renderer, root)[0];
    let old = child_ids(&renderer, shell)[0];
    assert_eq!(renderer.target().tag(old), Some("counter"));

    *use_counter.borrow_mut() = false;
    renderer.append(root).unwrap();

    let replacement = child_ids(&renderer, shell)[0];
    assert_ne!(replacement, old);
    assert!(!renderer.target().contains(old));
    assert_eq!(renderer.target().tag(replacement), Some("x"));
    assert_eq!(detaches("Counter"), 1);
    // A fresh instance rendered once; nothing continued from the old one.
    assert_eq!(renders("swap"), 2);
}

// ---------------------------------------------------------------------------
// Insertion ordering through widget ancestors
// ---------------------------------------------------------------------------

#[test]
fn test_deep_widget_growth_inserts_before_following_siblings() {
    let (mut renderer, root) = mounted(|| {
        leaf(
            "shell",
            Props::new(),
            vec![
                widget(
                    WidgetKind::of::<Wrap>(),
                    Props::new(),
                    vec![widget(
                        WidgetKind::of::<Wrap>(),
                        Props::new(),
                        vec![widget(
                            WidgetKind::of::<Tail>(),
                            Props::new().with("name", "tail"),
                            vec![],
                        )],
                    )],
                ),
                leaf("after", Props::new().with("id", "after"), vec![]),
            ],
        )
    });

    let shell = child_ids(&renderer, root)[0];
    let initial = child_ids(&renderer, shell);
    assert_eq!(initial.len(), 2);
    let after = initial[1];
    assert_eq!(renderer.target().attribute(after, "id"), Some("after"));

    set_toggle("tail", true);
    invalidate("tail");
    renderer.flush().unwrap();

    let grown = child_ids(&renderer, shell);
    assert_eq!(grown.len(), 3);
    assert_eq!(grown[0], initial[0]);
    assert_eq!(renderer.target().attribute(grown[1], "id"), Some("x2"));
    assert_eq!(grown[2], after);
}

// ---------------------------------------------------------------------------
// Registry resolution
// ---------------------------------------------------------------------------

#[test]
fn test_unresolved_label_renders_empty_until_defined() {
    let (mut renderer, root) = mounted(|| {
        leaf(
            "shell",
            Props::new(),
            vec![labeled(
                "menu",
                Props::new().with("name", "menu").with("label", "pick"),
                vec![],
            )],
        )
    });

    let shell = child_ids(&renderer, root)[0];
    assert_eq!(child_ids(&renderer, shell).len(), 0);

    renderer
        .registry()
        .define("menu", WidgetKind::of::<Counter>())
        .unwrap();
    renderer.flush().unwrap();

    let resolved = child_ids(&renderer, shell);
    assert_eq!(resolved.len(), 1);
    assert_eq!(renderer.target().tag(resolved[0]), Some("counter"));
    assert_eq!(renders("menu"), 1);
}

/// Renders a labeled child; its scoped registry binds `menu` to [`Tail`].
#[derive(Default)]
struct Scoped;

impl Widget for Scoped {
    fn render(&mut self, _props: &Props, _children: &[Node]) -> Vec<Node> {
        vec![labeled(
            "menu",
            Props::new().with("name", "scoped-menu"),
            vec![],
        )]
    }

    fn scoped_registry(&self) -> Option<Registry> {
        let registry = Registry::new();
        registry.define("menu", WidgetKind::of::<Tail>()).ok()?;
        Some(registry)
    }
}

#[test]
fn test_scoped_registries_shadow_the_base_registry() {
    let mut renderer = Renderer::new(MemoryTree::new(), || {
        leaf(
            "shell",
            Props::new(),
            vec![
                widget(WidgetKind::of::<Scoped>(), Props::new(), vec![]),
                labeled("menu", Props::new().with("name", "base-menu"), vec![]),
            ],
        )
    });
    renderer
        .registry()
        .define("menu", WidgetKind::of::<Counter>())
        .unwrap();
    let root = renderer.target_mut().create_element("root");
    renderer.append(root).unwrap();

    let shell = child_ids(&renderer, root)[0];
    let children = child_ids(&renderer, shell);
    assert_eq!(children.len(), 2);
    // Inside Scoped the label resolves to Tail; at the top level to Counter.
    assert_eq!(renderer.target().tag(children[0]), Some("x"));
    assert_eq!(renderer.target().tag(children[1]), Some("counter"));
}

// ---------------------------------------------------------------------------
// Event dispatch
// ---------------------------------------------------------------------------

/// A button whose click handler bumps a toggle-backed count and invalidates.
#[derive(Default)]
struct Clicker {
    invalidator: Option<Invalidator>,
}

impl Widget for Clicker {
    fn render(&mut self, _props: &Props, _children: &[Node]) -> Vec<Node> {
        note_render("Clicker");
        let invalidator = self.invalidator.clone().expect("attached before render");
        let label = if toggle("clicked") { "clicked" } else { "idle" };
        vec![leaf(
            "button",
            Props::new().on("click", move |_: &Event| {
                set_toggle("clicked", true);
                invalidator.invalidate();
            }),
            vec![text(label)],
        )]
    }

    fn on_attach(&mut self, invalidator: &Invalidator) {
        self.invalidator = Some(invalidator.clone());
    }
}

#[test]
fn test_dispatch_runs_handlers_and_sync_mode_re_renders() {
    let mut renderer = Renderer::new(MemoryTree::new(), || {
        widget(WidgetKind::of::<Clicker>(), Props::new(), vec![])
    });
    renderer.set_sync(true);
    let root = renderer.target_mut().create_element("root");
    renderer.append(root).unwrap();

    let button = child_ids(&renderer, root)[0];
    let run = child_ids(&renderer, button)[0];
    assert_eq!(renderer.target().text(run), Some("idle"));

    let handled = renderer.dispatch(button, "click", &Event::new()).unwrap();
    assert!(handled);
    assert_eq!(renders("Clicker"), 2);
    let run = child_ids(&renderer, button)[0];
    assert_eq!(renderer.target().text(run), Some("clicked"));

    let miss = renderer.dispatch(button, "keypress", &Event::new()).unwrap();
    assert!(!miss);
}

#[test]
fn test_handlers_are_dropped_with_their_node() {
    let present = Rc::new(RefCell::new(true));
    let source = Rc::clone(&present);
    let (mut renderer, root) = mounted(move || {
        let children = if *source.borrow() {
            vec![leaf(
                "button",
                Props::new().on("click", |_: &Event| set_toggle("ghost", true)),
                vec![],
            )]
        } else {
            Vec::new()
        };
        leaf("shell", Props::new(), children)
    });

    let shell = child_ids(&renderer, root)[0];
    let button = child_ids(&renderer, shell)[0];

    *present.borrow_mut() = false;
    renderer.append(root).unwrap();

    let handled = renderer.dispatch(button, "click", &Event::new()).unwrap();
    assert!(!handled);
    assert!(!toggle("ghost"));
}
