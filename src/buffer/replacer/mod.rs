//! Eviction policy implementations (replacers).
//!
//! - [`FifoReplacer`] - insertion order, re-access does not reorder
//! - [`LruReplacer`] - least recently used
//!
//! Replacers only track page ids. Whether a victim is actually safe to
//! drop (clean, unpinned) is decided by the buffer pool.

mod fifo;
mod lru;

pub use fifo::FifoReplacer;
pub use lru::LruReplacer;

use crate::common::config::EvictionPolicyKind;
use crate::common::PageId;

/// Chooses which resident page to reclaim when the pool is full.
pub trait EvictionPolicy: Send {
    /// Record that a page is resident and was just touched.
    fn record_access(&mut self, page_id: PageId);

    /// Remove and return the next victim, or `None` if nothing is tracked.
    fn evict(&mut self) -> Option<PageId>;

    /// Stop tracking a page (it left the pool without being evicted).
    fn remove(&mut self, page_id: PageId);

    /// Number of tracked pages.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the policy selected by `kind`, sized for `capacity` pages.
pub fn build(kind: EvictionPolicyKind, capacity: usize) -> Box<dyn EvictionPolicy> {
    match kind {
        EvictionPolicyKind::Fifo => Box::new(FifoReplacer::with_capacity(capacity)),
        EvictionPolicyKind::Lru => Box::new(LruReplacer::with_capacity(capacity)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::TableId;

    fn pid(n: u32) -> PageId {
        PageId::new(TableId::new(0), n)
    }

    #[test]
    fn test_build_selects_policy() {
        // A, B, A: FIFO still evicts A first, LRU evicts B first.
        for (kind, expected) in [
            (EvictionPolicyKind::Fifo, pid(0)),
            (EvictionPolicyKind::Lru, pid(1)),
        ] {
            let mut policy = build(kind, 2);
            policy.record_access(pid(0));
            policy.record_access(pid(1));
            policy.record_access(pid(0));
            assert_eq!(policy.len(), 2);
            assert_eq!(policy.evict(), Some(expected), "{:?}", kind);
        }
    }
}
