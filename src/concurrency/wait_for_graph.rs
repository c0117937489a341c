//! Wait-for graph over transactions.

use std::collections::{HashMap, HashSet};

use crate::common::TransactionId;

/// Directed graph where an edge `T1 → T2` means T1 is blocked on a lock
/// held by T2.
///
/// Only vertices with outgoing edges are stored. The graph has no locking
/// of its own; the lock manager mutates it inside the same critical
/// section as the lock table.
#[derive(Debug, Default)]
pub struct WaitForGraph {
    edges: HashMap<TransactionId, HashSet<TransactionId>>,
}

impl WaitForGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `from` waits for `to`. Self-edges are ignored.
    pub fn add_edge(&mut self, from: TransactionId, to: TransactionId) {
        if from != to {
            self.edges.entry(from).or_default().insert(to);
        }
    }

    /// Drop every edge leaving `from`.
    pub fn remove_outgoing_edges(&mut self, from: TransactionId) {
        self.edges.remove(&from);
    }

    /// Drop `vertex` entirely, including edges pointing at it.
    pub fn remove_vertex(&mut self, vertex: TransactionId) {
        self.edges.remove(&vertex);
        self.edges.retain(|_, targets| {
            targets.remove(&vertex);
            !targets.is_empty()
        });
    }

    pub fn contains_edge(&self, from: TransactionId, to: TransactionId) -> bool {
        self.edges.get(&from).is_some_and(|t| t.contains(&to))
    }

    /// Transactions `vertex` currently waits for, in id order.
    pub fn successors(&self, vertex: TransactionId) -> Vec<TransactionId> {
        let mut out: Vec<_> = self
            .edges
            .get(&vertex)
            .map(|t| t.iter().copied().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// Number of vertices with at least one outgoing edge.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// True if a cycle is reachable from `start`.
    ///
    /// Iterative depth-first walk: a cycle exists when an edge leads back
    /// to a vertex still on the current path. Vertices whose subtrees are
    /// fully explored are not walked twice.
    pub fn has_cycle_from(&self, start: TransactionId) -> bool {
        if !self.edges.contains_key(&start) {
            return false;
        }

        let mut on_path = HashSet::new();
        let mut finished = HashSet::new();
        let mut stack = vec![(start, self.successors(start))];
        on_path.insert(start);

        loop {
            let next = match stack.last_mut() {
                Some((_, pending)) => pending.pop(),
                None => return false,
            };

            match next {
                Some(next) if on_path.contains(&next) => return true,
                Some(next) if finished.contains(&next) => {}
                Some(next) => {
                    on_path.insert(next);
                    stack.push((next, self.successors(next)));
                }
                None => {
                    if let Some((done, _)) = stack.pop() {
                        on_path.remove(&done);
                        finished.insert(done);
                    }
                }
            }
        }
    }
}
