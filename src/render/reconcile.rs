//! The reconciler: diff a declarative tree against the wrapper overlay and
//! commit the difference into a render target.
//!
//! Rendering is two-phase. The structural phase pops child-list items off a
//! LIFO work stack, matches children by identity, runs widget lifecycles,
//! and records mutations; no attached target node is touched. The commit
//! phase then applies the recorded mutations, resolving insertion points
//! against the settled wrapper state. Invalidations requested by widgets go
//! through a shared schedule and are drained parents-first, either inside
//! engine entry points (sync mode) or on an explicit [`Renderer::flush`].

use std::cell::RefCell;
use std::rc::Rc;

use slotmap::SlotMap;

use crate::error::RenderError;
use crate::node::{Node, Props, WidgetKind, WidgetSpec};
use crate::render::apply::{apply_properties, EventMap, InputValues};
use crate::render::wrapper::{Wrapper, WrapperKey, WrapperStore};
use crate::target::RenderTarget;
use crate::widget::{Awaiter, Invalidator, Registry, Schedule, WidgetId, WidgetInstance};

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

/// A recorded target mutation, applied only after the structural phase.
enum Mutation<N> {
    /// Apply a created leaf's properties and insert it at its resolved
    /// position.
    Attach { wrapper: WrapperKey },
    /// Apply the property difference to a live leaf.
    Update {
        target: N,
        previous: Props,
        wrapper: WrapperKey,
    },
    /// Replace a text leaf's contents.
    SetText { target: N, text: String },
    /// Re-insert a matched child's live nodes at their new position.
    Move { wrapper: WrapperKey },
    /// Remove a live node and its subtree.
    Detach { target: N },
}

/// One entry on the structural work stack.
enum StackEntry<N> {
    /// A child-list pair to diff.
    Item {
        current: Vec<WrapperKey>,
        next: Vec<WrapperKey>,
    },
    /// A mutation to forward onto the mutation stack.
    Mutation(Mutation<N>),
}

/// The outcome of matching one next child against the current list.
struct Match {
    current: Option<WrapperKey>,
    next: WrapperKey,
    moved: bool,
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Drives a root-producing function into a [`RenderTarget`].
pub struct Renderer<T: RenderTarget> {
    target: T,
    produce_root: Box<dyn FnMut() -> Node>,
    root: Option<T::Node>,
    sync: bool,
    registry: Registry,
    store: WrapperStore<T::Node>,
    instances: SlotMap<WidgetId, Rc<RefCell<WidgetInstance>>>,
    events: EventMap<T::Node>,
    input_values: InputValues<T::Node>,
    schedule: Rc<RefCell<Schedule>>,
    render_stack: Vec<StackEntry<T::Node>>,
    mutations: Vec<Mutation<T::Node>>,
    root_wrappers: Vec<WrapperKey>,
}

impl<T: RenderTarget> Renderer<T> {
    pub fn new(target: T, produce_root: impl FnMut() -> Node + 'static) -> Self {
        Self {
            target,
            produce_root: Box::new(produce_root),
            root: None,
            sync: false,
            registry: Registry::new(),
            store: WrapperStore::default(),
            instances: SlotMap::with_key(),
            events: EventMap::new(),
            input_values: InputValues::new(),
            schedule: Rc::new(RefCell::new(Schedule::default())),
            render_stack: Vec::new(),
            mutations: Vec::new(),
            root_wrappers: Vec::new(),
        }
    }

    // ── public surface ───────────────────────────────────────────────

    /// Render under `root`. The first call mounts; calling again re-runs
    /// the root producer and diffs, so an unchanged output is a no-op.
    pub fn append(&mut self, root: T::Node) -> Result<(), RenderError> {
        self.root = Some(root);
        tracing::debug!("append");
        self.render_root()?;
        if self.sync {
            self.run_invalidation_queue()?;
        }
        Ok(())
    }

    /// Drain the invalidation queue, re-rendering dirty widgets.
    pub fn flush(&mut self) -> Result<(), RenderError> {
        if self.root.is_none() {
            return Err(RenderError::NotAttached);
        }
        self.run_invalidation_queue()
    }

    /// Run the handler bound for `name` on `node`. Returns whether one was
    /// bound. An `input` dispatch captures the control's value so property
    /// application can tell dispatched edits from outside drift.
    pub fn dispatch(
        &mut self,
        node: T::Node,
        name: &str,
        event: &crate::node::Event,
    ) -> Result<bool, RenderError> {
        if self.root.is_none() {
            return Err(RenderError::NotAttached);
        }
        let Some(handler) = self.events.get(&(node, name.to_owned())).cloned() else {
            return Ok(false);
        };
        handler(event);
        if name == "input" {
            if let Some(value) = self.target.value(node) {
                self.input_values.insert(node, value);
            }
        }
        if self.sync {
            self.run_invalidation_queue()?;
        }
        Ok(true)
    }

    /// In sync mode invalidations drain inside entry points; deferred mode
    /// waits for [`flush`](Renderer::flush).
    pub fn set_sync(&mut self, sync: bool) {
        self.sync = sync;
    }

    pub fn set_registry(&mut self, registry: Registry) {
        self.registry = registry;
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn target(&self) -> &T {
        &self.target
    }

    pub fn target_mut(&mut self) -> &mut T {
        &mut self.target
    }

    // ── root pass ────────────────────────────────────────────────────

    fn render_root(&mut self) -> Result<(), RenderError> {
        let node = (self.produce_root)();
        let next = self.store.wrap_children(None, vec![node], 0)?;
        let current = std::mem::take(&mut self.root_wrappers);
        self.root_wrappers = next.clone();
        self.render_stack.push(StackEntry::Item { current, next });
        self.drain_and_commit()
    }

    fn drain_and_commit(&mut self) -> Result<(), RenderError> {
        if let Err(error) = self.drain() {
            self.render_stack.clear();
            self.mutations.clear();
            return Err(error);
        }
        self.commit();
        Ok(())
    }

    fn drain(&mut self) -> Result<(), RenderError> {
        while let Some(entry) = self.render_stack.pop() {
            match entry {
                StackEntry::Mutation(mutation) => self.mutations.push(mutation),
                StackEntry::Item { current, next } => self.process_item(current, next)?,
            }
        }
        Ok(())
    }

    // ── structural phase ─────────────────────────────────────────────

    /// Diff one child-list pair. The resulting batch goes onto the work
    /// stack in application order: removals, then moves in reverse sibling
    /// order, then creates and updates in sibling order. The double-LIFO of
    /// work stack and mutation stack preserves that order cluster by
    /// cluster at commit time.
    fn process_item(
        &mut self,
        current: Vec<WrapperKey>,
        next: Vec<WrapperKey>,
    ) -> Result<(), RenderError> {
        let matches = self.match_children(&current, &next);

        let mut batch: Vec<StackEntry<T::Node>> = Vec::new();

        let claimed: Vec<WrapperKey> = matches.iter().filter_map(|m| m.current).collect();
        for &cur in &current {
            if !claimed.contains(&cur) {
                let mut detached = Vec::new();
                self.remove_wrapper(cur, true, &mut detached);
                batch.extend(detached.into_iter().map(StackEntry::Mutation));
            }
        }

        for entry in matches.iter().rev() {
            if entry.moved {
                batch.push(StackEntry::Mutation(Mutation::Move {
                    wrapper: entry.next,
                }));
            }
        }

        for entry in &matches {
            match entry.current {
                None => self.create_entry(entry.next, &mut batch)?,
                Some(cur) => self.update_entry(cur, entry.next, &mut batch)?,
            }
        }

        self.render_stack.extend(batch);
        Ok(())
    }

    /// Claim-anywhere matching: each next child takes the first unclaimed
    /// current child with the same identity. A claim left of an earlier
    /// claim marks the child moved.
    fn match_children(&self, current: &[WrapperKey], next: &[WrapperKey]) -> Vec<Match> {
        let mut claimed = vec![false; current.len()];
        let mut matches = Vec::with_capacity(next.len());
        let mut rightmost: Option<usize> = None;

        for &next_key in next {
            let next_node = &self.store.get(next_key).expect("next wrapper is live").node;
            let found = current.iter().enumerate().find(|&(index, &cur_key)| {
                !claimed[index]
                    && self
                        .store
                        .get(cur_key)
                        .is_some_and(|cur| same(&cur.node, next_node))
            });
            match found {
                Some((index, &cur_key)) => {
                    claimed[index] = true;
                    let moved = rightmost.is_some_and(|r| index < r);
                    rightmost = Some(rightmost.map_or(index, |r| r.max(index)));
                    matches.push(Match {
                        current: Some(cur_key),
                        next: next_key,
                        moved,
                    });
                }
                None => matches.push(Match {
                    current: None,
                    next: next_key,
                    moved: false,
                }),
            }
        }

        let list_changed =
            claimed.iter().any(|&c| !c) || matches.iter().any(|m| m.current.is_none());
        if list_changed && self.has_unkeyed_duplicates(next) {
            tracing::warn!(
                "siblings with the same identity and no key reconcile positionally; \
                 give them keys to keep their state stable"
            );
        }

        matches
    }

    fn has_unkeyed_duplicates(&self, keys: &[WrapperKey]) -> bool {
        for (index, &a) in keys.iter().enumerate() {
            let Some(a) = self.store.get(a) else { continue };
            if a.node.key().is_some() {
                continue;
            }
            for &b in &keys[index + 1..] {
                let Some(b) = self.store.get(b) else { continue };
                if b.node.key().is_none() && same(&a.node, &b.node) {
                    return true;
                }
            }
        }
        false
    }

    fn create_entry(
        &mut self,
        key: WrapperKey,
        batch: &mut Vec<StackEntry<T::Node>>,
    ) -> Result<(), RenderError> {
        let is_leaf = self
            .store
            .get(key)
            .map_or(false, |wrapper| wrapper.node.is_leaf());
        if is_leaf {
            self.create_leaf(key, batch)
        } else {
            self.create_widget(key, batch)
        }
    }

    fn update_entry(
        &mut self,
        cur: WrapperKey,
        next: WrapperKey,
        batch: &mut Vec<StackEntry<T::Node>>,
    ) -> Result<(), RenderError> {
        let is_leaf = self
            .store
            .get(next)
            .map_or(false, |wrapper| wrapper.node.is_leaf());
        if is_leaf {
            self.update_leaf(cur, next, batch)
        } else {
            self.update_widget(cur, next, batch)
        }
    }

    // ── leaves ───────────────────────────────────────────────────────

    fn create_leaf(
        &mut self,
        key: WrapperKey,
        batch: &mut Vec<StackEntry<T::Node>>,
    ) -> Result<(), RenderError> {
        let (tag, text, children, depth) = {
            let wrapper = self.store.get_mut(key).expect("create target is live");
            let children = wrapper.node.take_children();
            let (tag, text) = match &wrapper.node {
                Node::Leaf(leaf) => (leaf.tag.clone(), leaf.text.clone()),
                Node::Widget(_) => unreachable!("create_leaf is only called for leaves"),
            };
            (tag, text, children, wrapper.depth)
        };

        let target = if tag.is_empty() {
            self.target.create_text(text.as_deref().unwrap_or(""))
        } else {
            self.target.create_element(&tag)
        };
        let child_keys = self.store.wrap_children(Some(key), children, depth + 1)?;
        {
            let wrapper = self.store.get_mut(key).expect("create target is live");
            wrapper.target = Some(target);
            wrapper.children = Some(child_keys.clone());
        }
        self.store.link_target(target, key);

        batch.push(StackEntry::Item {
            current: Vec::new(),
            next: child_keys,
        });
        batch.push(StackEntry::Mutation(Mutation::Attach { wrapper: key }));
        Ok(())
    }

    fn update_leaf(
        &mut self,
        cur: WrapperKey,
        next: WrapperKey,
        batch: &mut Vec<StackEntry<T::Node>>,
    ) -> Result<(), RenderError> {
        let Some(released) = self.store.release(cur) else {
            return self.create_leaf(next, batch);
        };
        let previous = released.node.props().clone();
        let previous_text = match &released.node {
            Node::Leaf(leaf) => leaf.text.clone(),
            Node::Widget(_) => None,
        };
        let current_children = released.children.unwrap_or_default();

        let (tag, text, children, depth) = {
            let wrapper = self.store.get_mut(next).expect("next wrapper is live");
            let children = wrapper.node.take_children();
            let (tag, text) = match &wrapper.node {
                Node::Leaf(leaf) => (leaf.tag.clone(), leaf.text.clone()),
                Node::Widget(_) => unreachable!("update_leaf is only called for leaves"),
            };
            (tag, text, children, wrapper.depth)
        };

        let target = released.target;
        if let Some(target) = target {
            self.store.link_target(target, next);
        }
        let child_keys = self.store.wrap_children(Some(next), children, depth + 1)?;
        {
            let wrapper = self.store.get_mut(next).expect("next wrapper is live");
            wrapper.target = target;
            wrapper.children = Some(child_keys.clone());
        }

        batch.push(StackEntry::Item {
            current: current_children,
            next: child_keys,
        });
        if let Some(target) = target {
            if tag.is_empty() {
                if text != previous_text {
                    batch.push(StackEntry::Mutation(Mutation::SetText {
                        target,
                        text: text.unwrap_or_default(),
                    }));
                }
            } else {
                batch.push(StackEntry::Mutation(Mutation::Update {
                    target,
                    previous,
                    wrapper: next,
                }));
            }
        }
        Ok(())
    }

    // ── widgets ──────────────────────────────────────────────────────

    fn create_widget(
        &mut self,
        key: WrapperKey,
        batch: &mut Vec<StackEntry<T::Node>>,
    ) -> Result<(), RenderError> {
        let (spec, props, children, depth) = {
            let wrapper = self.store.get_mut(key).expect("create target is live");
            let children = wrapper.node.take_children();
            let spec = match &wrapper.node {
                Node::Widget(widget) => widget.spec.clone(),
                Node::Leaf(_) => unreachable!("create_widget is only called for widgets"),
            };
            (spec, wrapper.node.props().clone(), children, wrapper.depth)
        };

        let kind = match &spec {
            WidgetSpec::Kind(kind) => *kind,
            WidgetSpec::Label(label) => match self.resolve_label(key, label) {
                Some(kind) => kind,
                None => {
                    tracing::debug!(label = %label, "label unresolved, deferring subtree");
                    self.watch_label(key, label);
                    self.store
                        .get_mut(key)
                        .expect("create target is live")
                        .children = Some(Vec::new());
                    return Ok(());
                }
            },
        };

        let instance = WidgetInstance::new(kind.instantiate());
        let flags = instance.flags();
        let id = self.instances.insert(Rc::new(RefCell::new(instance)));
        {
            let wrapper = self.store.get_mut(key).expect("create target is live");
            wrapper.instance = Some(id);
        }
        self.store.link_instance(id, key);

        let cell = Rc::clone(&self.instances[id]);
        let invalidator = Invalidator::new(id, Rc::clone(&flags), &self.schedule);
        let rendered = {
            let mut instance = cell.borrow_mut();
            instance.attach(&invalidator);
            // The initial property set always renders; suppress the queue
            // notification it would otherwise raise.
            flags.rendering.set(true);
            instance.set_properties(&props);
            instance.set_children(children);
            flags.rendering.set(false);
            instance.render()
        };

        let child_keys = self.store.wrap_children(Some(key), rendered, depth + 1)?;
        self.store
            .get_mut(key)
            .expect("create target is live")
            .children = Some(child_keys.clone());
        batch.push(StackEntry::Item {
            current: Vec::new(),
            next: child_keys,
        });
        if flags.dirty.get() {
            self.schedule.borrow_mut().enqueue(id);
        }
        Ok(())
    }

    fn update_widget(
        &mut self,
        cur: WrapperKey,
        next: WrapperKey,
        batch: &mut Vec<StackEntry<T::Node>>,
    ) -> Result<(), RenderError> {
        let Some(released) = self.store.release(cur) else {
            return self.create_widget(next, batch);
        };
        let Some(id) = released.instance else {
            // The matched current widget never resolved; try again.
            return self.create_widget(next, batch);
        };
        let current_children = released.children.unwrap_or_default();

        let (props, children, depth) = {
            let wrapper = self.store.get_mut(next).expect("next wrapper is live");
            let children = wrapper.node.take_children();
            (wrapper.node.props().clone(), children, wrapper.depth)
        };
        {
            let wrapper = self.store.get_mut(next).expect("next wrapper is live");
            wrapper.instance = Some(id);
        }
        self.store.link_instance(id, next);

        let Some(cell) = self.instances.get(id).map(Rc::clone) else {
            return self.create_widget(next, batch);
        };
        let flags = cell.borrow().flags();
        let rendered = {
            let mut instance = cell.borrow_mut();
            flags.rendering.set(true);
            instance.set_properties(&props);
            instance.set_children(children);
            flags.rendering.set(false);
            if flags.dirty.get() {
                Some(instance.render())
            } else {
                None
            }
        };

        match rendered {
            Some(rendered) => {
                let child_keys = self.store.wrap_children(Some(next), rendered, depth + 1)?;
                self.store
                    .get_mut(next)
                    .expect("next wrapper is live")
                    .children = Some(child_keys.clone());
                batch.push(StackEntry::Item {
                    current: current_children,
                    next: child_keys,
                });
                if flags.dirty.get() {
                    self.schedule.borrow_mut().enqueue(id);
                }
            }
            None => {
                // Clean skip: the old subtree survives under the new wrapper.
                self.store.adopt_children(next, &current_children);
                self.store
                    .get_mut(next)
                    .expect("next wrapper is live")
                    .children = Some(current_children);
            }
        }
        Ok(())
    }

    // ── registry resolution ──────────────────────────────────────────

    /// Resolve a label against ancestor scoped registries, nearest first,
    /// then the renderer's base registry.
    fn resolve_label(&self, key: WrapperKey, label: &str) -> Option<WidgetKind> {
        let mut cursor = self.store.parent(key);
        while let Some(ancestor) = cursor {
            if let Some(id) = self.store.get(ancestor).and_then(|w| w.instance) {
                if let Some(cell) = self.instances.get(id) {
                    if let Some(kind) = cell
                        .borrow()
                        .scoped_registry()
                        .and_then(|registry| registry.get(label))
                    {
                        return Some(kind);
                    }
                }
            }
            cursor = self.store.parent(ancestor);
        }
        self.registry.get(label)
    }

    /// Record awaiters for an unresolved label on every registry in scope.
    fn watch_label(&self, key: WrapperKey, label: &str) {
        let awaiter = || match self.nearest_ancestor_instance(key) {
            Some(id) => {
                let flags = self.instances[id].borrow().flags();
                Awaiter::Widget(Invalidator::new(id, flags, &self.schedule))
            }
            None => Awaiter::Root(Rc::downgrade(&self.schedule)),
        };

        let mut cursor = self.store.parent(key);
        while let Some(ancestor) = cursor {
            if let Some(id) = self.store.get(ancestor).and_then(|w| w.instance) {
                if let Some(registry) = self
                    .instances
                    .get(id)
                    .and_then(|cell| cell.borrow().scoped_registry().cloned())
                {
                    registry.watch(label, awaiter());
                }
            }
            cursor = self.store.parent(ancestor);
        }
        self.registry.watch(label, awaiter());
    }

    fn nearest_ancestor_instance(&self, key: WrapperKey) -> Option<WidgetId> {
        let mut cursor = self.store.parent(key);
        while let Some(ancestor) = cursor {
            if let Some(id) = self.store.get(ancestor).and_then(|w| w.instance) {
                return Some(id);
            }
            cursor = self.store.parent(ancestor);
        }
        None
    }

    // ── removal ──────────────────────────────────────────────────────

    /// Evict a wrapper subtree: destroy instances, clear engine maps, and
    /// record detach mutations for top-level live nodes.
    fn remove_wrapper(
        &mut self,
        key: WrapperKey,
        top_level: bool,
        detached: &mut Vec<Mutation<T::Node>>,
    ) {
        let Some(wrapper) = self.store.release(key) else {
            return;
        };
        let children_top_level = match wrapper.node {
            Node::Leaf(_) => {
                if let Some(target) = wrapper.target {
                    self.events.retain(|(node, _), _| *node != target);
                    self.input_values.remove(&target);
                    if top_level {
                        detached.push(Mutation::Detach { target });
                    }
                }
                false
            }
            Node::Widget(_) => {
                if let Some(id) = wrapper.instance {
                    if let Some(cell) = self.instances.remove(id) {
                        cell.borrow_mut().destroy();
                    }
                }
                top_level
            }
        };
        for child in wrapper.children.unwrap_or_default() {
            self.remove_wrapper(child, children_top_level, detached);
        }
    }

    // ── commit phase ─────────────────────────────────────────────────

    fn commit(&mut self) {
        while let Some(mutation) = self.mutations.pop() {
            match mutation {
                Mutation::Attach { wrapper } => self.commit_attach(wrapper),
                Mutation::Update {
                    target,
                    previous,
                    wrapper,
                } => {
                    let next = self
                        .store
                        .get(wrapper)
                        .map(|w| w.node.props().clone())
                        .unwrap_or_default();
                    apply_properties(
                        &mut self.target,
                        &mut self.events,
                        &mut self.input_values,
                        target,
                        &previous,
                        &next,
                    );
                }
                Mutation::SetText { target, text } => self.target.set_text(target, &text),
                Mutation::Move { wrapper } => self.commit_move(wrapper),
                Mutation::Detach { target } => self.target.remove(target),
            }
        }
    }

    fn commit_attach(&mut self, key: WrapperKey) {
        let (target, props) = match self.store.get(key) {
            Some(wrapper) => match wrapper.target {
                Some(target) => (target, wrapper.node.props().clone()),
                None => return,
            },
            None => {
                tracing::debug!("attach target evicted before commit");
                return;
            }
        };
        apply_properties(
            &mut self.target,
            &mut self.events,
            &mut self.input_values,
            target,
            &Props::new(),
            &props,
        );
        let Some(parent) = self.parent_target(key) else {
            tracing::debug!("no live parent to attach under");
            return;
        };
        let before = self.insert_before_target(key);
        self.target.insert_before(parent, target, before);
    }

    fn commit_move(&mut self, key: WrapperKey) {
        let Some(parent) = self.parent_target(key) else {
            return;
        };
        let before = self.insert_before_target(key);
        let mut targets = Vec::new();
        self.collect_targets(key, &mut targets);
        for target in targets {
            self.target.insert_before(parent, target, before);
        }
    }

    /// The nearest ancestor live node, or the attached root.
    fn parent_target(&self, key: WrapperKey) -> Option<T::Node> {
        let mut cursor = self.store.parent(key);
        while let Some(ancestor) = cursor {
            if let Some(target) = self.store.get(ancestor).and_then(|w| w.target) {
                return Some(target);
            }
            cursor = self.store.parent(ancestor);
        }
        self.root
    }

    /// Resolve the live node to insert before: walk the sibling chain for
    /// the first attached target, descending into widget wrappers, and
    /// ascend through widget parents when a chain runs out. `None` appends.
    fn insert_before_target(&self, key: WrapperKey) -> Option<T::Node> {
        let mut cursor = key;
        loop {
            if let Some(sibling) = self.store.next_sibling(cursor) {
                if let Some(target) = self.first_attached_target(sibling) {
                    return Some(target);
                }
                cursor = sibling;
            } else {
                let parent = self.store.parent(cursor)?;
                if !self.store.get(parent)?.node.is_widget() {
                    return None;
                }
                cursor = parent;
            }
        }
    }

    fn first_attached_target(&self, key: WrapperKey) -> Option<T::Node> {
        let wrapper = self.store.get(key)?;
        if let Some(target) = wrapper.target {
            return self.target.parent_of(target).map(|_| target);
        }
        for &child in wrapper.children.as_deref().unwrap_or_default() {
            if let Some(target) = self.first_attached_target(child) {
                return Some(target);
            }
        }
        None
    }

    /// First-level live nodes of a wrapper subtree, in sibling order.
    fn collect_targets(&self, key: WrapperKey, out: &mut Vec<T::Node>) {
        let Some(wrapper) = self.store.get(key) else {
            return;
        };
        if let Some(target) = wrapper.target {
            out.push(target);
            return;
        }
        for &child in wrapper.children.as_deref().unwrap_or_default() {
            self.collect_targets(child, out);
        }
    }

    // ── invalidation queue ───────────────────────────────────────────

    fn run_invalidation_queue(&mut self) -> Result<(), RenderError> {
        loop {
            let (mut batch, root_pending) = self.schedule.borrow_mut().take();
            if batch.is_empty() && !root_pending {
                return Ok(());
            }
            if root_pending {
                self.render_root()?;
            }
            // Parents first, so a child re-rendered by its parent is
            // clean-skipped instead of re-rendered twice.
            batch.sort_by_key(|&id| {
                self.store
                    .wrapper_of_instance(id)
                    .and_then(|key| self.store.get(key))
                    .map_or(usize::MAX, |wrapper| wrapper.depth)
            });
            for id in batch {
                self.rerender_instance(id)?;
            }
        }
    }

    /// Re-render one dirty widget in place: a replacement wrapper takes the
    /// old one's position in its parent's child list and sibling links, the
    /// widget renders, and the subtrees diff as usual.
    fn rerender_instance(&mut self, id: WidgetId) -> Result<(), RenderError> {
        let Some(cell) = self.instances.get(id).map(Rc::clone) else {
            return Ok(());
        };
        let flags = cell.borrow().flags();
        if flags.destroyed.get() || !flags.dirty.get() {
            return Ok(());
        }
        let Some(cur) = self.store.wrapper_of_instance(id) else {
            return Ok(());
        };

        let (node, depth, parent, next_sibling, current_children) = {
            let wrapper = self.store.get(cur).expect("instance wrapper is live");
            (
                wrapper.node.clone(),
                wrapper.depth,
                self.store.parent(cur),
                self.store.next_sibling(cur),
                wrapper.children.clone().unwrap_or_default(),
            )
        };

        let replacement = self.store.insert(Wrapper::new(node, depth));
        self.store
            .get_mut(replacement)
            .expect("just inserted")
            .instance = Some(id);
        self.store.link_instance(id, replacement);
        if let Some(next) = next_sibling {
            self.store.set_next_sibling(replacement, next);
        }
        match parent {
            Some(parent) => {
                self.store.set_parent(replacement, parent);
                self.replace_in_child_list(parent, cur, replacement);
            }
            None => self.relink_sibling_of(None, cur, replacement),
        }

        let rendered = cell.borrow_mut().render();
        let child_keys = self
            .store
            .wrap_children(Some(replacement), rendered, depth + 1)?;
        self.store
            .get_mut(replacement)
            .expect("just inserted")
            .children = Some(child_keys.clone());
        self.store.release(cur);

        self.render_stack.push(StackEntry::Item {
            current: current_children,
            next: child_keys,
        });
        self.drain_and_commit()?;

        if flags.dirty.get() {
            self.schedule.borrow_mut().enqueue(id);
        }
        Ok(())
    }

    /// Swap `old` for `new` in the parent's child list and re-point the
    /// preceding sibling's link at the replacement.
    fn replace_in_child_list(&mut self, parent: WrapperKey, old: WrapperKey, new: WrapperKey) {
        if let Some(children) = self
            .store
            .get_mut(parent)
            .and_then(|wrapper| wrapper.children.as_mut())
        {
            for child in children.iter_mut() {
                if *child == old {
                    *child = new;
                }
            }
        }
        self.relink_sibling_of(Some(parent), old, new);
    }

    fn relink_sibling_of(&mut self, parent: Option<WrapperKey>, old: WrapperKey, new: WrapperKey) {
        let siblings: Vec<WrapperKey> = match parent {
            Some(parent) => self
                .store
                .get(parent)
                .and_then(|wrapper| wrapper.children.clone())
                .unwrap_or_default(),
            None => {
                for key in self.root_wrappers.iter_mut() {
                    if *key == old {
                        *key = new;
                    }
                }
                self.root_wrappers.clone()
            }
        };
        for key in siblings {
            if key != new && self.store.next_sibling(key) == Some(old) {
                self.store.set_next_sibling(key, new);
            }
        }
    }
}

/// Whether two node descriptions continue the same live node.
///
/// Leaves match on tag plus key; widgets on concrete kind plus key. An
/// unresolved label never matches anything, so resolution always restarts
/// the subtree from scratch.
fn same(a: &Node, b: &Node) -> bool {
    match (a, b) {
        (Node::Leaf(x), Node::Leaf(y)) => x.tag == y.tag && a.key() == b.key(),
        (Node::Widget(x), Node::Widget(y)) => match (&x.spec, &y.spec) {
            (WidgetSpec::Kind(x_kind), WidgetSpec::Kind(y_kind)) => {
                x_kind == y_kind && a.key() == b.key()
            }
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{leaf, text, widget};

    #[derive(Default)]
    struct Blank;

    impl crate::widget::Widget for Blank {
        fn render(&mut self, _props: &Props, _children: &[Node]) -> Vec<Node> {
            Vec::new()
        }
    }

    // ── same() ───────────────────────────────────────────────────────

    #[test]
    fn leaves_match_on_tag_and_key() {
        let a = leaf("item", Props::new(), vec![]);
        assert!(same(&a, &leaf("item", Props::new(), vec![])));
        assert!(!same(&a, &leaf("panel", Props::new(), vec![])));
        assert!(!same(&a, &leaf("item", Props::new().key("1"), vec![])));
        assert!(same(
            &leaf("item", Props::new().key("1"), vec![]),
            &leaf("item", Props::new().key("1"), vec![])
        ));
    }

    #[test]
    fn text_runs_match_each_other() {
        assert!(same(&text("a"), &text("b")));
        assert!(!same(&text("a"), &leaf("item", Props::new(), vec![])));
    }

    #[test]
    fn widgets_match_on_kind_and_key() {
        let kind = WidgetKind::of::<Blank>();
        let a = widget(kind, Props::new(), vec![]);
        assert!(same(&a, &widget(kind, Props::new(), vec![])));
        assert!(!same(&a, &widget(kind, Props::new().key("1"), vec![])));
    }

    #[test]
    fn unresolved_labels_never_match() {
        let node = crate::node::labeled("menu", Props::new(), vec![]);
        assert!(!same(&node, &node.clone()));
        assert!(!same(
            &node,
            &widget(WidgetKind::of::<Blank>(), Props::new(), vec![])
        ));
    }
}
