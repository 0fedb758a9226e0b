//! Declarative node model and property bags.

pub mod model;
pub mod props;

pub use model::{labeled, leaf, text, widget, LeafNode, Node, WidgetKind, WidgetNode, WidgetSpec};
pub use props::{Event, EventHandler, OpPredicate, PropValue, Props, KEY};
