//! # veneer
//!
//! A declarative widget tree with a reconciling renderer for mutable render
//! targets.
//!
//! Applications describe what the UI should look like as a tree of cheap
//! [`Node`] values: leaves name concrete target elements, widgets are
//! user types that render their own subtrees. A [`Renderer`] diffs each
//! description against the previous one and commits only the difference
//! into a [`RenderTarget`], so unchanged output costs no target mutations.
//!
//! ## Core Systems
//!
//! - **[`node`]** — Node descriptions, property bags, and constructors
//! - **[`diff`]** — Pure property diffing with per-name policy overrides
//! - **[`widget`]** — Widget trait, instances, invalidation, label registry
//! - **[`render`]** — Wrapper overlay and the two-phase reconciler
//! - **[`target`]** — The render-target trait and an in-memory tree
//! - **[`error`]** — Error taxonomy
//!
//! ## Example
//!
//! ```
//! use veneer::{leaf, text, MemoryTree, Props, RenderTarget, Renderer};
//!
//! let mut renderer = Renderer::new(MemoryTree::new(), || {
//!     leaf("panel", Props::new().classes(["main"]), vec![text("hello")])
//! });
//! let root = renderer.target_mut().create_element("root");
//! renderer.append(root).unwrap();
//! ```

// Descriptions and diffing
pub mod diff;
pub mod node;

// Widgets
pub mod widget;

// Reconciliation
pub mod render;

// Targets
pub mod target;

pub mod error;

pub use error::RenderError;
pub use node::{labeled, leaf, text, widget, Event, Node, PropValue, Props, WidgetKind};
pub use render::Renderer;
pub use target::{MemoryTree, NodeOp, RenderTarget, TargetId};
pub use widget::{Invalidator, Registry, Widget};
