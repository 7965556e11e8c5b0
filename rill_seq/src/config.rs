//! Per-chain configuration.

// =============================================================================
// Configuration
// =============================================================================

/// Default delegation depth limit.
pub const DEFAULT_MAX_DEPTH: usize = 64 * 1024;

/// Smallest accepted depth limit: one level of delegation.
pub const MIN_MAX_DEPTH: usize = 1;

/// Limits applied to a delegation chain.
///
/// Only the configuration of the handle that is begun matters; handles that
/// are delegated into an existing chain inherit the chain's configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainConfig {
    /// Maximum nesting depth below the bottom frame.
    pub max_depth: usize,
}

impl ChainConfig {
    /// Configuration with a custom depth limit, clamped to at least
    /// [`MIN_MAX_DEPTH`].
    #[inline]
    pub fn with_max_depth(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(MIN_MAX_DEPTH),
        }
    }

    /// Returns true if a frame may be pushed at `depth`.
    #[inline]
    pub const fn allows_depth(&self, depth: usize) -> bool {
        depth <= self.max_depth
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}
