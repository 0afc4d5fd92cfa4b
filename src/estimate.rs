use crate::Estimation;

/// A trait for types that can produce an upper-bound stand-in for their output
pub trait Estimate {
    /// Produces text at least as long as any expansion of `self` would be,
    /// without drawing or changing any scope
    fn estimate(&self, estimation: &mut Estimation<'_>) -> String;
}
