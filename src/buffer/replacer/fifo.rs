//! FIFO (First-In-First-Out) replacement policy.

use std::collections::{HashSet, VecDeque};

use crate::common::PageId;

use super::EvictionPolicy;

/// A simple FIFO eviction policy.
///
/// Evicts pages in the order they were first recorded. Recording a page
/// that is already tracked does not move it.
pub struct FifoReplacer {
    /// Queue of page IDs in insertion order (front = oldest).
    queue: VecDeque<PageId>,

    /// Set for O(1) membership check.
    in_queue: HashSet<PageId>,
}

impl FifoReplacer {
    /// Create a new FIFO replacer.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create a FIFO replacer with room for `capacity` pages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(capacity),
            in_queue: HashSet::with_capacity(capacity),
        }
    }
}

impl EvictionPolicy for FifoReplacer {
    fn record_access(&mut self, page_id: PageId) {
        if self.in_queue.insert(page_id) {
            self.queue.push_back(page_id);
        }
    }

    fn evict(&mut self) -> Option<PageId> {
        let page_id = self.queue.pop_front()?;
        self.in_queue.remove(&page_id);
        Some(page_id)
    }

    fn remove(&mut self, page_id: PageId) {
        // O(n), but only discards take this path.
        if self.in_queue.remove(&page_id) {
            self.queue.retain(|&p| p != page_id);
        }
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

impl Default for FifoReplacer {
    fn default() -> Self {
        Self::new()
    }
}
