//! LRU (Least Recently Used) replacement policy.

use std::collections::HashMap;

use crate::common::PageId;

use super::EvictionPolicy;

/// Index of a node in the arena.
type NodeIndex = usize;

struct Node {
    page_id: PageId,
    /// Towards the most recently used end.
    prev: Option<NodeIndex>,
    /// Towards the least recently used end.
    next: Option<NodeIndex>,
}

/// LRU eviction policy with O(1) touch, evict and remove.
///
/// A doubly linked recency list lives in a `Vec` arena (links are indices,
/// freed slots are reused), with a `PageId → NodeIndex` map for lookup.
///
/// ```text
///  head (MRU)                              tail (LRU)
///   [P7] <-> [P2] <-> [P9] <-> ... <-> [P4]   -> evict() returns P4
/// ```
pub struct LruReplacer {
    nodes: Vec<Node>,
    free: Vec<NodeIndex>,
    index: HashMap<PageId, NodeIndex>,
    head: Option<NodeIndex>,
    tail: Option<NodeIndex>,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an LRU replacer with room for `capacity` pages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            index: HashMap::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    fn unlink(&mut self, idx: NodeIndex) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn push_front(&mut self, idx: NodeIndex) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        if let Some(h) = self.head {
            self.nodes[h].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn alloc(&mut self, page_id: PageId) -> NodeIndex {
        let node = Node {
            page_id,
            prev: None,
            next: None,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    /// Page ids from most to least recently used.
    pub fn recency_order(&self) -> Vec<PageId> {
        let mut out = Vec::with_capacity(self.index.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            out.push(self.nodes[idx].page_id);
            cursor = self.nodes[idx].next;
        }
        out
    }
}

impl EvictionPolicy for LruReplacer {
    fn record_access(&mut self, page_id: PageId) {
        match self.index.get(&page_id) {
            Some(&idx) => {
                if self.head != Some(idx) {
                    self.unlink(idx);
                    self.push_front(idx);
                }
            }
            None => {
                let idx = self.alloc(page_id);
                self.index.insert(page_id, idx);
                self.push_front(idx);
            }
        }
    }

    fn evict(&mut self) -> Option<PageId> {
        let idx = self.tail?;
        self.unlink(idx);
        self.free.push(idx);
        let page_id = self.nodes[idx].page_id;
        self.index.remove(&page_id);
        Some(page_id)
    }

    fn remove(&mut self, page_id: PageId) {
        if let Some(idx) = self.index.remove(&page_id) {
            self.unlink(idx);
            self.free.push(idx);
        }
    }

    fn len(&self) -> usize {
        self.index.len()
    }
}

impl Default for LruReplacer {
    fn default() -> Self {
        Self::new()
    }
}
