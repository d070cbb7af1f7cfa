use serde::{Deserialize, Serialize};

/// Default maximum number of nested Python frames.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 200;

/// Limits applied to a single VM run.
///
/// Built with chained setters:
///
/// ```
/// use pyframe::ResourceLimits;
///
/// let limits = ResourceLimits::new().max_recursion_depth(50);
/// assert_eq!(limits.recursion_depth(), 50);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    max_recursion_depth: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_recursion_depth: DEFAULT_MAX_RECURSION_DEPTH,
        }
    }
}

impl ResourceLimits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum frame depth, counting the module frame.
    #[must_use]
    pub fn max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    #[must_use]
    pub fn recursion_depth(&self) -> usize {
        self.max_recursion_depth
    }
}
