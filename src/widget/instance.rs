//! Engine-owned widget instances and the invalidation plumbing.
//!
//! Contents:
//! - [`WidgetId`]: slotmap key for live instances.
//! - [`Schedule`]: the coalescing invalidation queue shared with the renderer.
//! - [`InstanceFlags`]: `Cell`-based state shared between an instance and its
//!   [`Invalidator`] so invalidating never re-borrows the instance.
//! - [`Invalidator`]: the handle injected into widgets at attach time.
//! - [`WidgetInstance`]: a widget plus its effective properties and children.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::rc::{Rc, Weak};

use slotmap::new_key_type;

use crate::diff::{diff_properties, DiffOverrides};
use crate::node::{Node, Props};
use crate::widget::{Registry, Widget};

new_key_type! {
    /// Stable identity of a live widget instance.
    pub struct WidgetId;
}

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// Pending invalidations, deduplicated, plus a flag for root-level wakeups
/// (a deferred label resolving at the tree root has no instance to queue).
#[derive(Debug, Default)]
pub(crate) struct Schedule {
    queue: Vec<WidgetId>,
    queued: HashSet<WidgetId>,
    root_pending: bool,
}

impl Schedule {
    pub(crate) fn enqueue(&mut self, id: WidgetId) {
        if self.queued.insert(id) {
            self.queue.push(id);
        }
    }

    pub(crate) fn mark_root_pending(&mut self) {
        self.root_pending = true;
    }

    /// Drain the current batch. Later enqueues start a fresh batch.
    pub(crate) fn take(&mut self) -> (Vec<WidgetId>, bool) {
        self.queued.clear();
        let root = std::mem::take(&mut self.root_pending);
        (std::mem::take(&mut self.queue), root)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty() && !self.root_pending
    }
}

// ---------------------------------------------------------------------------
// InstanceFlags and Invalidator
// ---------------------------------------------------------------------------

/// Per-instance state bits, readable without borrowing the instance.
#[derive(Debug, Default)]
pub struct InstanceFlags {
    /// A re-render has been requested.
    pub(crate) dirty: Cell<bool>,
    /// The widget's `render` is currently on the stack.
    pub(crate) rendering: Cell<bool>,
    /// Destruction has been requested; the instance must not be mutated.
    pub(crate) destroyed: Cell<bool>,
}

/// A handle for requesting a re-render of one widget instance.
///
/// Cheap to clone; widgets typically capture one inside event handlers.
/// Invalidations are coalesced and drained by the renderer, so calling
/// [`invalidate`](Invalidator::invalidate) repeatedly schedules one render.
#[derive(Clone)]
pub struct Invalidator {
    id: WidgetId,
    flags: Rc<InstanceFlags>,
    schedule: Weak<RefCell<Schedule>>,
}

impl Invalidator {
    pub(crate) fn new(
        id: WidgetId,
        flags: Rc<InstanceFlags>,
        schedule: &Rc<RefCell<Schedule>>,
    ) -> Self {
        Self {
            id,
            flags,
            schedule: Rc::downgrade(schedule),
        }
    }

    /// Mark the instance dirty and queue it for re-rendering.
    ///
    /// During an in-flight render only the dirty bit is set; the renderer
    /// re-queues the instance once that render completes, so a widget never
    /// re-enters its own `render`. After destruction this is a no-op.
    pub fn invalidate(&self) {
        if self.flags.destroyed.get() {
            return;
        }
        self.flags.dirty.set(true);
        if self.flags.rendering.get() {
            return;
        }
        if let Some(schedule) = self.schedule.upgrade() {
            schedule.borrow_mut().enqueue(self.id);
        }
    }

    pub(crate) fn id(&self) -> WidgetId {
        self.id
    }
}

impl std::fmt::Debug for Invalidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Invalidator").field("id", &self.id).finish()
    }
}

// ---------------------------------------------------------------------------
// WidgetInstance
// ---------------------------------------------------------------------------

/// A live widget plus the state the renderer tracks for it.
pub(crate) struct WidgetInstance {
    widget: Box<dyn Widget>,
    props: Props,
    children: Vec<Node>,
    overrides: DiffOverrides,
    flags: Rc<InstanceFlags>,
    registry: Option<Registry>,
}

impl WidgetInstance {
    pub(crate) fn new(widget: Box<dyn Widget>) -> Self {
        let overrides = widget.diff_overrides();
        let registry = widget.scoped_registry();
        Self {
            widget,
            props: Props::new(),
            children: Vec::new(),
            overrides,
            flags: Rc::new(InstanceFlags::default()),
            registry,
        }
    }

    pub(crate) fn flags(&self) -> Rc<InstanceFlags> {
        Rc::clone(&self.flags)
    }

    pub(crate) fn scoped_registry(&self) -> Option<&Registry> {
        self.registry.as_ref()
    }

    pub(crate) fn attach(&mut self, invalidator: &Invalidator) {
        self.widget.on_attach(invalidator);
    }

    /// Diff and store the next effective properties. Returns the changed key
    /// names; a non-empty set fires `on_properties_changed` and marks dirty.
    pub(crate) fn set_properties(&mut self, next: &Props) -> Vec<String> {
        assert!(
            !self.flags.destroyed.get(),
            "widget instance mutated after destruction was requested"
        );
        let outcome = diff_properties(&self.props, next, &self.overrides);
        self.props = outcome.props;
        if !outcome.changed.is_empty() {
            self.widget.on_properties_changed(&self.props, &outcome.changed);
            self.flags.dirty.set(true);
        }
        outcome.changed
    }

    /// Replace the declared children. Does not mark dirty on its own; the
    /// caller decides whether the subtree re-renders.
    pub(crate) fn set_children(&mut self, children: Vec<Node>) {
        assert!(
            !self.flags.destroyed.get(),
            "widget instance mutated after destruction was requested"
        );
        self.children = children;
    }

    /// Run the widget's `render` under the rendering guard.
    ///
    /// The dirty bit is cleared before the call so an invalidation raised
    /// mid-render survives and is observed afterwards.
    pub(crate) fn render(&mut self) -> Vec<Node> {
        self.flags.rendering.set(true);
        self.flags.dirty.set(false);
        let output = self.widget.render(&self.props, &self.children);
        self.flags.rendering.set(false);
        output
    }

    /// Request destruction. `on_detach` fires exactly once.
    pub(crate) fn destroy(&mut self) {
        if self.flags.destroyed.replace(true) {
            return;
        }
        self.widget.on_detach();
    }
}

impl std::fmt::Debug for WidgetInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetInstance")
            .field("props", &self.props)
            .field("children", &self.children.len())
            .field("flags", &self.flags)
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================
