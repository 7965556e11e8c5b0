//! Resume-cost instrumentation for a delegation chain.

/// Counters kept per chain by the sequence that owns its bottom frame.
///
/// These make the resume-cost guarantee observable: an advance that yields
/// from a frame nested `N` levels deep performs one resume and at most a
/// constant number of link hops, independent of `N`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainStats {
    /// External `advance` calls.
    pub advances: u64,
    /// Frame bodies resumed, across all frames of the chain.
    pub resumes: u64,
    /// Frames attached by delegation.
    pub pushes: u64,
    /// Frames detached after completing.
    pub pops: u64,
    /// Descriptor links followed (`bottom` or `parent`).
    pub link_hops: u64,
    /// Current nesting depth of the active frame.
    pub depth: usize,
    /// Deepest nesting reached.
    pub max_depth: usize,
}

impl ChainStats {
    /// Counter differences between `self` and an earlier snapshot.
    ///
    /// Counters that went backwards (snapshots passed in the wrong order)
    /// read as zero.
    #[must_use]
    pub fn since(&self, earlier: &Self) -> Self {
        Self {
            advances: self.advances.saturating_sub(earlier.advances),
            resumes: self.resumes.saturating_sub(earlier.resumes),
            pushes: self.pushes.saturating_sub(earlier.pushes),
            pops: self.pops.saturating_sub(earlier.pops),
            link_hops: self.link_hops.saturating_sub(earlier.link_hops),
            depth: self.depth,
            max_depth: self.max_depth,
        }
    }

    pub(crate) fn record_push(&mut self, depth: usize) {
        self.pushes += 1;
        self.depth = depth;
        self.max_depth = self.max_depth.max(depth);
    }

    pub(crate) fn record_pop(&mut self, depth: usize) {
        self.pops += 1;
        self.depth = depth;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_tracks_depth() {
        let mut stats = ChainStats::default();
        stats.record_push(1);
        stats.record_push(2);
        stats.record_pop(1);
        assert_eq!(stats.depth, 1);
        assert_eq!(stats.max_depth, 2);
        assert_eq!(stats.pushes, 2);
        assert_eq!(stats.pops, 1);
    }

    #[test]
    fn test_since() {
        let earlier = ChainStats {
            advances: 3,
            resumes: 5,
            ..ChainStats::default()
        };
        let later = ChainStats {
            advances: 4,
            resumes: 6,
            link_hops: 1,
            ..ChainStats::default()
        };
        let delta = later.since(&earlier);
        assert_eq!(delta.advances, 1);
        assert_eq!(delta.resumes, 1);
        assert_eq!(delta.link_hops, 1);
    }

    #[test]
    fn test_since_with_swapped_snapshots_is_zero() {
        let before = ChainStats::default();
        let after = ChainStats {
            advances: 2,
            resumes: 9,
            pops: 1,
            ..ChainStats::default()
        };
        let delta = before.since(&after);
        assert_eq!(delta.advances, 0);
        assert_eq!(delta.resumes, 0);
        assert_eq!(delta.pops, 0);
    }
}
