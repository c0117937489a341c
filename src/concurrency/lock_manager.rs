//! Lock Manager - page-level shared/exclusive locks for two-phase locking.
//!
//! The [`LockManager`] provides:
//! - Shared (read) and exclusive (write) page locks
//! - Upgrade-in-place for a sole reader
//! - Deadlock detection through a [`WaitForGraph`]
//! - Bulk release at transaction end

use std::collections::{HashMap, HashSet};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::common::config::{DeadlockPolicy, LockManagerConfig};
use crate::common::{Error, PageId, Permissions, Result, TransactionId};
use crate::concurrency::WaitForGraph;

/// Lock strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    Shared,
    Exclusive,
}

impl From<Permissions> for LockMode {
    fn from(perm: Permissions) -> Self {
        match perm {
            Permissions::ReadOnly => LockMode::Shared,
            Permissions::ReadWrite => LockMode::Exclusive,
        }
    }
}

/// Holders of one page's lock.
///
/// Invariant: `exclusive == Some(t)` implies `shared == {t}`.
#[derive(Debug, Default)]
struct LockEntry {
    shared: HashSet<TransactionId>,
    exclusive: Option<TransactionId>,
}

impl LockEntry {
    fn is_empty(&self) -> bool {
        self.shared.is_empty() && self.exclusive.is_none()
    }
}

/// Everything guarded by the lock manager's mutex.
#[derive(Debug, Default)]
struct LockTable {
    entries: HashMap<PageId, LockEntry>,
    /// Pages each transaction holds any lock on, for `release_all`.
    held: HashMap<TransactionId, HashSet<PageId>>,
    graph: WaitForGraph,
    /// Transactions currently parked in `acquire`, with what they asked for.
    waiting: HashMap<TransactionId, (PageId, LockMode)>,
}

impl LockTable {
    fn is_granted(&self, txn: TransactionId, page: PageId, mode: LockMode) -> bool {
        match self.entries.get(&page) {
            Some(entry) => match mode {
                LockMode::Shared => entry.shared.contains(&txn) || entry.exclusive == Some(txn),
                LockMode::Exclusive => entry.exclusive == Some(txn),
            },
            None => false,
        }
    }

    /// Other transactions whose locks are incompatible with the request.
    fn blockers(&self, txn: TransactionId, page: PageId, mode: LockMode) -> Vec<TransactionId> {
        let Some(entry) = self.entries.get(&page) else {
            return Vec::new();
        };
        let mut out: Vec<TransactionId> = match mode {
            LockMode::Shared => entry.exclusive.into_iter().filter(|&t| t != txn).collect(),
            LockMode::Exclusive => entry
                .shared
                .iter()
                .copied()
                .chain(entry.exclusive)
                .filter(|&t| t != txn)
                .collect(),
        };
        out.sort();
        out.dedup();
        out
    }

    fn grant(&mut self, txn: TransactionId, page: PageId, mode: LockMode) {
        let entry = self.entries.entry(page).or_default();
        entry.shared.insert(txn);
        if mode == LockMode::Exclusive {
            debug_assert_eq!(entry.shared.len(), 1, "exclusive lock with other readers");
            entry.exclusive = Some(txn);
        }
        self.held.entry(txn).or_default().insert(page);
    }

    /// Drop `txn` from both slots of `page`. Returns false if it held nothing.
    fn release(&mut self, txn: TransactionId, page: PageId) -> bool {
        let Some(entry) = self.entries.get_mut(&page) else {
            return false;
        };
        let mut released = entry.shared.remove(&txn);
        if entry.exclusive == Some(txn) {
            entry.exclusive = None;
            released = true;
        }
        if entry.is_empty() {
            self.entries.remove(&page);
        }
        released
    }

    /// Re-derive every waiter's outgoing edges from the current holders.
    ///
    /// Keeps the graph free of edges to transactions that no longer block
    /// anyone, so a cycle check never trips over a finished wait.
    fn refresh_wait_edges(&mut self) {
        let requests: Vec<_> = self
            .waiting
            .iter()
            .map(|(&waiter, &(page, mode))| (waiter, page, mode))
            .collect();
        for (waiter, page, mode) in requests {
            let blockers = self.blockers(waiter, page, mode);
            self.graph.remove_outgoing_edges(waiter);
            for holder in blockers {
                self.graph.add_edge(waiter, holder);
            }
        }
    }

    fn forget_held(&mut self, txn: TransactionId, page: PageId) {
        if let Some(pages) = self.held.get_mut(&txn) {
            pages.remove(&page);
            if pages.is_empty() {
                self.held.remove(&txn);
            }
        }
    }
}

/// Per-page lock table shared by every transaction in the process.
///
/// # Thread Safety
/// The lock table and the wait-for graph sit behind one `Mutex` because
/// their invariants span both. Blocked requests park on a `Condvar` that
/// every release notifies, and re-check after at most
/// [`LockManagerConfig::wait_slice`].
///
/// # Usage
/// ```
/// use pagevault::concurrency::{LockManager, LockMode};
/// use pagevault::{PageId, TableId, TransactionId};
///
/// let lm = LockManager::default();
/// let (t1, t2) = (TransactionId::next(), TransactionId::next());
/// let page = PageId::new(TableId::new(1), 0);
///
/// lm.acquire(t1, page, LockMode::Shared).unwrap();
/// lm.acquire(t2, page, LockMode::Shared).unwrap();
/// assert!(lm.holds_lock(t1, page) && lm.holds_lock(t2, page));
///
/// lm.release_all(t1);
/// lm.acquire(t2, page, LockMode::Exclusive).unwrap(); // sole reader upgrades
/// ```
pub struct LockManager {
    table: Mutex<LockTable>,
    released: Condvar,
    config: LockManagerConfig,
}

impl LockManager {
    pub fn new(config: LockManagerConfig) -> Self {
        Self {
            table: Mutex::new(LockTable::default()),
            released: Condvar::new(),
            config,
        }
    }

    /// Acquire a lock on `page` for `txn`, blocking until it is granted.
    ///
    /// Re-acquiring a lock already held (or a shared lock while holding
    /// exclusive) returns immediately.
    ///
    /// # Errors
    /// - `Error::DeadlockDetected` if waiting would close a cycle (or, under
    ///   [`DeadlockPolicy::Conservative`], could lead to one). The caller
    ///   must abort `txn`.
    pub fn acquire(&self, txn: TransactionId, page: PageId, mode: LockMode) -> Result<()> {
        let mut table = self.table.lock();
        if table.is_granted(txn, page, mode) {
            return Ok(());
        }

        loop {
            let blockers = table.blockers(txn, page, mode);
            if blockers.is_empty() {
                table.graph.remove_outgoing_edges(txn);
                table.waiting.remove(&txn);
                table.grant(txn, page, mode);
                debug!(txn = %txn, page = %page, ?mode, "lock granted");
                return Ok(());
            }

            let deadlock = match self.config.deadlock_policy {
                DeadlockPolicy::WaitForGraph => {
                    table.refresh_wait_edges();
                    table.graph.remove_outgoing_edges(txn);
                    for &holder in &blockers {
                        table.graph.add_edge(txn, holder);
                    }
                    table.graph.has_cycle_from(txn)
                }
                DeadlockPolicy::Conservative => {
                    blockers.len() > 1 || blockers.iter().any(|t| table.waiting.contains_key(t))
                }
            };

            if deadlock {
                table.graph.remove_outgoing_edges(txn);
                table.waiting.remove(&txn);
                warn!(txn = %txn, page = %page, ?mode, ?blockers, "deadlock detected");
                return Err(Error::DeadlockDetected { txn, page });
            }

            if table.waiting.insert(txn, (page, mode)).is_none() {
                debug!(txn = %txn, page = %page, ?mode, ?blockers, "waiting for lock");
            }
            self.released.wait_for(&mut table, self.config.wait_slice);
        }
    }

    /// Grant the lock if that is possible without waiting.
    ///
    /// Returns `false` (recording nothing) when the request conflicts.
    pub fn try_acquire(&self, txn: TransactionId, page: PageId, mode: LockMode) -> bool {
        let mut table = self.table.lock();
        if table.is_granted(txn, page, mode) {
            return true;
        }
        if !table.blockers(txn, page, mode).is_empty() {
            return false;
        }
        table.grant(txn, page, mode);
        true
    }

    /// Release whatever lock `txn` holds on `page` and wake waiters.
    ///
    /// Releasing a lock that is not held is a no-op.
    pub fn release(&self, txn: TransactionId, page: PageId) {
        let mut table = self.table.lock();
        if table.release(txn, page) {
            table.forget_held(txn, page);
            debug!(txn = %txn, page = %page, "lock released");
        }
        table.graph.remove_outgoing_edges(txn);
        self.refresh_edges(&mut table);
        drop(table);
        self.released.notify_all();
    }

    /// Release every lock `txn` holds. Idempotent.
    ///
    /// Returns the number of pages released.
    pub fn release_all(&self, txn: TransactionId) -> usize {
        let mut table = self.table.lock();
        let pages = table.held.remove(&txn).unwrap_or_default();
        for &page in &pages {
            table.release(txn, page);
        }
        table.graph.remove_vertex(txn);
        table.waiting.remove(&txn);
        self.refresh_edges(&mut table);
        drop(table);

        self.released.notify_all();
        if !pages.is_empty() {
            debug!(txn = %txn, count = pages.len(), "released all locks");
        }
        pages.len()
    }

    /// Waiters' edges to a releaser disappear with the release, not when
    /// the waiter next wakes.
    fn refresh_edges(&self, table: &mut LockTable) {
        if self.config.deadlock_policy == DeadlockPolicy::WaitForGraph {
            table.refresh_wait_edges();
        }
    }

    /// True if `txn` holds any lock on `page`.
    pub fn holds_lock(&self, txn: TransactionId, page: PageId) -> bool {
        self.lock_mode(txn, page).is_some()
    }

    /// The strongest lock `txn` holds on `page`.
    pub fn lock_mode(&self, txn: TransactionId, page: PageId) -> Option<LockMode> {
        let table = self.table.lock();
        let entry = table.entries.get(&page)?;
        if entry.exclusive == Some(txn) {
            Some(LockMode::Exclusive)
        } else if entry.shared.contains(&txn) {
            Some(LockMode::Shared)
        } else {
            None
        }
    }

    /// Pages `txn` holds locks on, in id order.
    pub fn pages_locked_by(&self, txn: TransactionId) -> Vec<PageId> {
        let table = self.table.lock();
        let mut pages: Vec<_> = table
            .held
            .get(&txn)
            .map(|p| p.iter().copied().collect())
            .unwrap_or_default();
        pages.sort();
        pages
    }

    /// Shared holders (sorted) and exclusive holder of `page`.
    pub fn holders(&self, page: PageId) -> (Vec<TransactionId>, Option<TransactionId>) {
        let table = self.table.lock();
        match table.entries.get(&page) {
            Some(entry) => {
                let mut shared: Vec<_> = entry.shared.iter().copied().collect();
                shared.sort();
                (shared, entry.exclusive)
            }
            None => (Vec::new(), None),
        }
    }

    /// Transactions `txn` is currently waiting for.
    pub fn waits_for(&self, txn: TransactionId) -> Vec<TransactionId> {
        self.table.lock().graph.successors(txn)
    }

    /// True if `txn` is parked inside `acquire`.
    pub fn is_waiting(&self, txn: TransactionId) -> bool {
        self.table.lock().waiting.contains_key(&txn)
    }

    /// Number of pages with at least one lock holder.
    pub fn locked_page_count(&self) -> usize {
        self.table.lock().entries.len()
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(LockManagerConfig::default())
    }
}
