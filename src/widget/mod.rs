//! Composite widgets: the [`Widget`] trait, live instances, invalidation,
//! and the label [`Registry`].

pub mod instance;
pub mod registry;
pub mod traits;

pub(crate) use instance::{Schedule, WidgetInstance};
pub use instance::{InstanceFlags, Invalidator, WidgetId};
pub(crate) use registry::Awaiter;
pub use registry::Registry;
pub use traits::Widget;
