//! Reconciliation: wrapper overlay, property application, and the
//! two-phase [`Renderer`].

pub(crate) mod apply;
pub mod reconcile;
pub(crate) mod wrapper;

pub use reconcile::Renderer;
pub use wrapper::WrapperKey;
