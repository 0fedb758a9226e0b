//! Label to widget-kind registry with deferred resolution.
//!
//! A labeled node whose label has no entry yet renders as an empty subtree;
//! the renderer records an awaiter for the label, and a later
//! [`Registry::define`] wakes the awaiting widget (or the renderer root) so
//! the subtree fills in without the caller replaying anything.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::error::RenderError;
use crate::node::WidgetKind;
use crate::widget::instance::Schedule;
use crate::widget::Invalidator;

/// Who to wake when a pending label is defined.
pub(crate) enum Awaiter {
    /// The nearest composite ancestor of the unresolved node.
    Widget(Invalidator),
    /// The unresolved node sat at the tree root.
    Root(Weak<RefCell<Schedule>>),
}

impl Awaiter {
    /// Whether two awaiters would wake the same party.
    fn same_target(&self, other: &Self) -> bool {
        match (self, other) {
            (Awaiter::Widget(a), Awaiter::Widget(b)) => a.id() == b.id(),
            (Awaiter::Root(a), Awaiter::Root(b)) => Weak::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, WidgetKind>,
    awaiters: HashMap<String, Vec<Awaiter>>,
}

/// A cloneable label registry handle.
///
/// Clones share one entry table, so a registry may be defined into after it
/// has been handed to a renderer or a widget subtree.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Rc<RefCell<Inner>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a label to a widget kind and wake any awaiters recorded for it.
    ///
    /// Labels bind once; a second `define` for the same label is
    /// [`RenderError::DuplicateLabel`].
    pub fn define(&self, label: impl Into<String>, kind: WidgetKind) -> Result<(), RenderError> {
        let label = label.into();
        let awaiters = {
            let mut inner = self.inner.borrow_mut();
            if inner.entries.contains_key(&label) {
                return Err(RenderError::DuplicateLabel(label));
            }
            tracing::debug!(label = %label, kind = kind.name(), "label defined");
            inner.entries.insert(label.clone(), kind);
            inner.awaiters.remove(&label).unwrap_or_default()
        };
        for awaiter in awaiters {
            match awaiter {
                Awaiter::Widget(invalidator) => invalidator.invalidate(),
                Awaiter::Root(schedule) => {
                    if let Some(schedule) = schedule.upgrade() {
                        schedule.borrow_mut().mark_root_pending();
                    }
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, label: &str) -> Option<WidgetKind> {
        self.inner.borrow().entries.get(label).copied()
    }

    pub fn has(&self, label: &str) -> bool {
        self.inner.borrow().entries.contains_key(label)
    }

    /// Record an awaiter for a label that failed to resolve. Re-watching
    /// from the same party is a no-op, so repeated diff passes over a still
    /// unresolved label do not accumulate entries.
    pub(crate) fn watch(&self, label: &str, awaiter: Awaiter) {
        let mut inner = self.inner.borrow_mut();
        let awaiters = inner.awaiters.entry(label.to_owned()).or_default();
        if awaiters.iter().any(|known| known.same_target(&awaiter)) {
            return;
        }
        awaiters.push(awaiter);
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Registry")
            .field("entries", &inner.entries.keys().collect::<Vec<_>>())
            .field("pending", &inner.awaiters.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, Props};
    use crate::widget::Widget;

    #[derive(Default)]
    struct Blank;

    impl Widget for Blank {
        fn render(&mut self, _props: &Props, _children: &[Node]) -> Vec<Node> {
            Vec::new()
        }
    }

    #[test]
    fn define_then_get() {
        let registry = Registry::new();
        registry.define("menu", WidgetKind::of::<Blank>()).unwrap();
        assert!(registry.has("menu"));
        assert!(registry.get("menu").unwrap().name().ends_with("Blank"));
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let registry = Registry::new();
        registry.define("menu", WidgetKind::of::<Blank>()).unwrap();
        let err = registry.define("menu", WidgetKind::of::<Blank>());
        assert!(matches!(err, Err(RenderError::DuplicateLabel(l)) if l == "menu"));
    }

    #[test]
    fn clones_share_entries() {
        let registry = Registry::new();
        let handle = registry.clone();
        handle.define("menu", WidgetKind::of::<Blank>()).unwrap();
        assert!(registry.has("menu"));
    }

    #[test]
    fn repeated_watches_record_one_awaiter_per_party() {
        use crate::widget::{InstanceFlags, WidgetId};

        let schedule = Rc::new(RefCell::new(Schedule::default()));
        let registry = Registry::new();
        registry.watch("menu", Awaiter::Root(Rc::downgrade(&schedule)));
        registry.watch("menu", Awaiter::Root(Rc::downgrade(&schedule)));
        assert_eq!(registry.inner.borrow().awaiters["menu"].len(), 1);

        let flags = Rc::new(InstanceFlags::default());
        let invalidator = Invalidator::new(WidgetId::default(), Rc::clone(&flags), &schedule);
        registry.watch("menu", Awaiter::Widget(invalidator.clone()));
        registry.watch("menu", Awaiter::Widget(invalidator));
        assert_eq!(registry.inner.borrow().awaiters["menu"].len(), 2);
    }

    #[test]
    fn define_wakes_root_awaiter() {
        let schedule = Rc::new(RefCell::new(Schedule::default()));
        let registry = Registry::new();
        registry.watch("menu", Awaiter::Root(Rc::downgrade(&schedule)));

        registry.define("menu", WidgetKind::of::<Blank>()).unwrap();
        let (batch, root) = schedule.borrow_mut().take();
        assert!(batch.is_empty());
        assert!(root);
    }
}
