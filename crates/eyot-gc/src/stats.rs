//! Snapshot of a region's allocation state.

/// Point-in-time statistics for a [`crate::GcRegion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GcStats {
    /// Number of live pages in the region's list.
    pub pages_allocated: usize,
    /// Sum of every live page's payload size, in bytes.
    pub bytes_allocated: usize,
}
