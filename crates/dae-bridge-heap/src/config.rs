//! Heap collection settings.

/// When the heap collects on its own.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HeapConfig {
    /// Collect before every `collect_every`-th allocation. 0 disables
    /// automatic collection; [`ManagedHeap::collect`](crate::ManagedHeap::collect)
    /// still works.
    pub collect_every: usize,
}

impl HeapConfig {
    /// Automatic collection interval used by [`Default`].
    pub const DEFAULT_COLLECT_EVERY: usize = 1024;

    /// Collect before every allocation.
    ///
    /// Any reference the bridge fails to root is reclaimed at the next
    /// allocation, which makes rooting bugs show up as stale references.
    pub fn stress() -> Self {
        Self { collect_every: 1 }
    }

    /// Never collect automatically.
    pub fn manual() -> Self {
        Self { collect_every: 0 }
    }
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            collect_every: Self::DEFAULT_COLLECT_EVERY,
        }
    }
}
