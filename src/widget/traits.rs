//! The [`Widget`] trait: user-defined composite nodes.

use crate::diff::DiffOverrides;
use crate::node::{Node, Props};
use crate::widget::{Invalidator, Registry};

/// A composite node that renders a subtree from its properties and children.
///
/// Widgets are constructed through [`WidgetKind::of`](crate::node::WidgetKind::of)
/// and therefore must implement [`Default`]. All lifecycle hooks have no-op
/// defaults; only [`render`](Widget::render) is required.
///
/// Rendering must be a pure function of the widget's state, the effective
/// properties, and the declared children. Side effects belong in the
/// lifecycle hooks.
pub trait Widget: 'static {
    /// Produce this widget's subtree.
    fn render(&mut self, props: &Props, children: &[Node]) -> Vec<Node>;

    /// Called once, after the instance is created and before its first
    /// render. The [`Invalidator`] may be stored and used to request a
    /// re-render at any later point.
    fn on_attach(&mut self, _invalidator: &Invalidator) {}

    /// Called when a property diff reports at least one changed key, before
    /// the re-render that the change schedules. `props` is the new effective
    /// value set and `changed` the sorted changed key names.
    fn on_properties_changed(&mut self, _props: &Props, _changed: &[String]) {}

    /// Called exactly once when the instance is removed from the tree.
    fn on_detach(&mut self) {}

    /// Per-name diff policy overrides applied to this widget's properties.
    fn diff_overrides(&self) -> DiffOverrides {
        DiffOverrides::new()
    }

    /// A registry scoped to this widget's subtree. Labels resolve against
    /// the nearest ancestor's scoped registry before falling back to the
    /// renderer's base registry. Consulted once at instantiation.
    fn scoped_registry(&self) -> Option<Registry> {
        None
    }
}
