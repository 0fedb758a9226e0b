//! Error taxonomy for the renderer and registry.
//!
//! Configuration errors are fatal for the commit that discovered them: the
//! structural diff aborts before any target mutation is applied. Pending
//! registry resolutions are *not* errors (they yield an empty subtree), and
//! mutation-phase misses against an externally owned target tree are
//! tolerated with a debug log rather than surfaced here.

/// Errors surfaced by [`Renderer`](crate::render::Renderer) and
/// [`Registry`](crate::widget::Registry).
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A leaf node carried neither a tag nor text, so there is nothing to
    /// materialize for it.
    #[error("malformed node: leaf has neither a tag nor text")]
    MalformedNode,
    /// A text leaf carried structural children.
    #[error("malformed node: a text leaf cannot have children")]
    TextWithChildren,
    /// `append` was asked to re-render before any root was attached.
    #[error("renderer has no attached root")]
    NotAttached,
    /// A registry label was defined twice.
    #[error("widget label `{0}` is already defined")]
    DuplicateLabel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            RenderError::MalformedNode.to_string(),
            "malformed node: leaf has neither a tag nor text"
        );
        assert_eq!(
            RenderError::DuplicateLabel("panel".into()).to_string(),
            "widget label `panel` is already defined"
        );
    }
}
