use crate::{Context, Result};

/// A trait for types that can be expanded into output text
pub trait Expand {
    /// Expands `self` against the given evaluation context, performing any
    /// random draws and scope changes its directives call for
    fn expand(&self, context: &mut Context<'_>) -> Result<String>;
}
