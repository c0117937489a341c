//! Buffer Pool - the transactional page cache.
//!
//! The [`BufferPool`] provides:
//! - Page caching between backing stores and memory
//! - Page-level two-phase locking on every fetch
//! - No-steal eviction through a pluggable policy
//! - Commit with write-ahead logging, abort with before-image undo

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::buffer::replacer::{self, EvictionPolicy};
use crate::buffer::{BufferPoolStats, Frame, PageHandle};
use crate::common::config::BufferPoolConfig;
use crate::common::{Error, PageId, Permissions, RecordId, Result, TableId, TransactionId};
use crate::concurrency::LockManager;
use crate::recovery::LogSink;
use crate::storage::{BackingStore, TouchedPages};

/// A fixed-capacity cache of pages shared by concurrent transactions.
///
/// # Architecture
/// ```text
/// ┌──────────────────────────────────────────────────────────────┐
/// │                          BufferPool                          │
/// │  ┌──────────────────────┐   ┌─────────────────────────────┐  │
/// │  │ page_table           │   │ lock_manager                │  │
/// │  │ PageId → Arc<Frame>  │   │ S/X locks + wait-for graph  │  │
/// │  └──────────────────────┘   └─────────────────────────────┘  │
/// │  ┌──────────────┐  ┌──────────────┐  ┌─────────────────────┐ │
/// │  │   policy     │  │   tables     │  │ log                 │ │
/// │  │ FIFO | LRU   │  │ BackingStore │  │ LogSink             │ │
/// │  └──────────────┘  └──────────────┘  └─────────────────────┘ │
/// └──────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - `page_table`: `RwLock`, many readers, few writers
/// - `policy`: `Mutex`, internal state changes on access
/// - `latch`: `Mutex`, serializes admission, eviction, flush, commit and abort
/// - `tables`: `RwLock`, written only by `register_table`
/// - `stats`: No lock, all atomic counters
///
/// Frames are pinned while the page table is read-locked and checked for
/// pins while it is write-locked, so a page is never evicted out from under
/// a live [`PageHandle`].
///
/// # Usage
/// ```ignore
/// let pool = BufferPool::new(BufferPoolConfig::default(), Arc::new(NoopLog));
/// pool.register_table(Arc::new(TableFile::create("t.tbl", table_id)?));
///
/// let txn = TransactionId::next();
/// pool.apply_insert(txn, table_id, b"hello")?;
/// pool.commit(txn)?;
/// ```
pub struct BufferPool {
    page_table: RwLock<HashMap<PageId, Arc<Frame>>>,
    policy: Mutex<Box<dyn EvictionPolicy>>,
    latch: Mutex<()>,
    tables: RwLock<HashMap<TableId, Arc<dyn BackingStore>>>,
    lock_manager: Arc<LockManager>,
    log: Arc<dyn LogSink>,
    stats: BufferPoolStats,
    capacity: usize,
}

impl BufferPool {
    /// Create an empty buffer pool.
    ///
    /// # Panics
    /// Panics if `config.pool_size` is 0.
    pub fn new(config: BufferPoolConfig, log: Arc<dyn LogSink>) -> Self {
        assert!(config.pool_size > 0, "pool_size must be > 0");

        Self {
            page_table: RwLock::new(HashMap::with_capacity(config.pool_size)),
            policy: Mutex::new(replacer::build(config.policy, config.pool_size)),
            latch: Mutex::new(()),
            tables: RwLock::new(HashMap::new()),
            lock_manager: Arc::new(LockManager::new(config.lock)),
            log,
            stats: BufferPoolStats::new(),
            capacity: config.pool_size,
        }
    }

    // ========================================================================
    // Public API: Tables
    // ========================================================================

    /// Make a table's backing store reachable through this pool.
    ///
    /// Registering a second store for the same table replaces the first.
    pub fn register_table(&self, store: Arc<dyn BackingStore>) {
        let table_id = store.table_id();
        self.tables.write().insert(table_id, store);
        debug!(table = %table_id, "table registered");
    }

    fn table(&self, table_id: TableId) -> Result<Arc<dyn BackingStore>> {
        self.tables
            .read()
            .get(&table_id)
            .cloned()
            .ok_or(Error::UnknownTable(table_id))
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Lock a page for `txn` and check it out of the cache.
    ///
    /// Blocks until the lock is granted. If the page is not resident it is
    /// read from its table's backing store, evicting a clean unpinned page
    /// first if the pool is full.
    ///
    /// # Errors
    /// - `Error::DeadlockDetected` if waiting for the lock would deadlock;
    ///   the caller must abort `txn`
    /// - `Error::CapacityExhausted` if every resident page is dirty or pinned
    /// - `Error::UnknownTable` if no store is registered for the page's table
    /// - Backing store errors, unchanged
    pub fn fetch(
        &self,
        txn: TransactionId,
        page_id: PageId,
        permissions: Permissions,
    ) -> Result<PageHandle> {
        self.table(page_id.table_id())?;
        self.lock_manager.acquire(txn, page_id, permissions.into())?;
        let frame = self.pin_frame(page_id)?;
        Ok(PageHandle::new(
            frame,
            Arc::clone(&self.lock_manager),
            txn,
            permissions,
        ))
    }

    // ========================================================================
    // Public API: Tuple mutations
    // ========================================================================

    /// Insert a record into `table_id` on behalf of `txn`.
    ///
    /// Returns the pages that changed; each is now dirty by `txn`.
    pub fn apply_insert(
        &self,
        txn: TransactionId,
        table_id: TableId,
        tuple: &[u8],
    ) -> Result<Vec<PageId>> {
        let store = self.table(table_id)?;
        let touched = store.insert_tuple(self, txn, tuple)?;
        self.install(txn, touched)
    }

    /// Delete a record on behalf of `txn`.
    ///
    /// Returns the pages that changed; each is now dirty by `txn`.
    pub fn apply_delete(&self, txn: TransactionId, record: RecordId) -> Result<Vec<PageId>> {
        let store = self.table(record.page_id.table_id())?;
        let touched = store.delete_tuple(self, txn, record)?;
        self.install(txn, touched)
    }

    /// Write after-images returned by a backing store into the cache.
    fn install(&self, txn: TransactionId, touched: TouchedPages) -> Result<Vec<PageId>> {
        let mut installed = Vec::with_capacity(touched.len());
        for (page_id, after) in touched {
            let handle = self.fetch(txn, page_id, Permissions::ReadWrite)?;
            handle.write()?.copy_from(&after);
            installed.push(page_id);
        }
        Ok(installed)
    }

    // ========================================================================
    // Public API: Transaction end
    // ========================================================================

    /// Make every change of `txn` durable, then release its locks.
    ///
    /// Each dirty page is logged (before- and after-image), the log is
    /// forced, and only then is the page written to its backing store.
    ///
    /// # Errors
    /// Log or backing store errors stop the commit with the transaction's
    /// locks still held; pages already written stay clean, the rest stay
    /// dirty and can be rolled back with [`BufferPool::abort`].
    pub fn commit(&self, txn: TransactionId) -> Result<()> {
        let flushed = {
            let _latch = self.latch.lock();
            let frames = self.frames_dirtied_by(txn);
            for frame in &frames {
                self.write_back(frame)?;
            }
            frames.len()
        };

        let released = self.lock_manager.release_all(txn);
        info!(txn = %txn, pages = flushed, locks = released, "transaction committed");
        Ok(())
    }

    /// Undo every change of `txn` in memory, then release its locks.
    ///
    /// Never touches a backing store.
    pub fn abort(&self, txn: TransactionId) {
        let restored = {
            let _latch = self.latch.lock();
            let frames = self.frames_dirtied_by(txn);
            for frame in &frames {
                if frame.roll_back() {
                    BufferPoolStats::bump(&self.stats.rollbacks);
                }
            }
            frames.len()
        };

        let released = self.lock_manager.release_all(txn);
        info!(txn = %txn, pages = restored, locks = released, "transaction aborted");
    }

    /// Commit or abort `txn`.
    pub fn transaction_complete(&self, txn: TransactionId, commit: bool) -> Result<()> {
        if commit {
            self.commit(txn)
        } else {
            self.abort(txn);
            Ok(())
        }
    }

    // ========================================================================
    // Public API: Locks
    // ========================================================================

    /// Release `txn`'s lock on a single page before the transaction ends.
    ///
    /// This breaks two-phase locking. Only safe for pages the transaction
    /// looked at but did not change (for example a full page examined while
    /// searching for free space).
    pub fn release_page(&self, txn: TransactionId, page_id: PageId) {
        self.lock_manager.release(txn, page_id);
    }

    pub fn holds_lock(&self, txn: TransactionId, page_id: PageId) -> bool {
        self.lock_manager.holds_lock(txn, page_id)
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.lock_manager
    }

    // ========================================================================
    // Public API: Cache maintenance
    // ========================================================================

    /// Drop a page from the cache without writing it back.
    ///
    /// Any uncommitted changes to the page are lost. Returns `false` if the
    /// page was not resident.
    pub fn discard(&self, page_id: PageId) -> bool {
        let _latch = self.latch.lock();
        let removed = self.page_table.write().remove(&page_id).is_some();
        if removed {
            self.policy.lock().remove(page_id);
            debug!(page = %page_id, "page discarded");
        }
        removed
    }

    /// Log and write a single dirty page, leaving it resident and clean.
    ///
    /// Writing uncommitted changes gives up no-steal for that page: after a
    /// crash the store holds data of a transaction that may never commit.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let _latch = self.latch.lock();
        let frame = self.page_table.read().get(&page_id).cloned();
        match frame {
            Some(frame) if frame.is_dirty() => self.write_back(&frame),
            _ => Ok(()),
        }
    }

    /// Write back every page dirtied by `txn` without releasing its locks.
    ///
    /// The pages stay resident and become clean, so they can be evicted
    /// before the transaction ends. Same steal caveat as
    /// [`BufferPool::flush_page`].
    pub fn flush_pages(&self, txn: TransactionId) -> Result<()> {
        let _latch = self.latch.lock();
        let frames = self.frames_dirtied_by(txn);
        for frame in &frames {
            self.write_back(frame)?;
        }
        debug!(txn = %txn, pages = frames.len(), "transaction pages flushed");
        Ok(())
    }

    /// Flush every dirty page. See [`BufferPool::flush_page`].
    pub fn flush_all_pages(&self) -> Result<()> {
        let _latch = self.latch.lock();
        let mut frames: Vec<Arc<Frame>> = self.page_table.read().values().cloned().collect();
        frames.sort_by_key(|f| f.page_id());
        for frame in frames.iter().filter(|f| f.is_dirty()) {
            self.write_back(frame)?;
        }
        Ok(())
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    /// Maximum number of resident pages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of pages currently cached.
    pub fn resident_count(&self) -> usize {
        self.page_table.read().len()
    }

    pub fn is_resident(&self, page_id: PageId) -> bool {
        self.page_table.read().contains_key(&page_id)
    }

    /// The transaction whose uncommitted changes a resident page holds.
    pub fn dirtied_by(&self, page_id: PageId) -> Option<TransactionId> {
        self.page_table.read().get(&page_id)?.dirtied_by()
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    /// Return the page's frame with one extra pin, loading it if needed.
    fn pin_frame(&self, page_id: PageId) -> Result<Arc<Frame>> {
        // Fast path: resident page, read lock only
        if let Some(frame) = self.pin_resident(page_id) {
            self.handle_cache_hit(page_id);
            return Ok(frame);
        }

        let _latch = self.latch.lock();
        // Another thread may have loaded it while we waited for the latch
        if let Some(frame) = self.pin_resident(page_id) {
            self.handle_cache_hit(page_id);
            return Ok(frame);
        }
        self.handle_cache_miss(page_id)
    }

    fn pin_resident(&self, page_id: PageId) -> Option<Arc<Frame>> {
        let table = self.page_table.read();
        let frame = table.get(&page_id)?;
        frame.pin();
        Some(Arc::clone(frame))
    }

    fn handle_cache_hit(&self, page_id: PageId) {
        self.policy.lock().record_access(page_id);
        BufferPoolStats::bump(&self.stats.cache_hits);
    }

    /// Load a page from its store and admit it. Caller holds the latch.
    fn handle_cache_miss(&self, page_id: PageId) -> Result<Arc<Frame>> {
        BufferPoolStats::bump(&self.stats.cache_misses);

        let store = self.table(page_id.table_id())?;
        while self.resident_count() >= self.capacity {
            self.evict_page()?;
        }

        let page = store.read_page(page_id)?;
        BufferPoolStats::bump(&self.stats.pages_read);

        let frame = Arc::new(Frame::new(page_id, page));
        frame.pin();
        self.page_table.write().insert(page_id, Arc::clone(&frame));
        self.policy.lock().record_access(page_id);

        debug!(page = %page_id, "page admitted");
        Ok(frame)
    }

    // ========================================================================
    // Internal: Eviction
    // ========================================================================

    /// Drop one clean, unpinned page. Caller holds the latch.
    ///
    /// Every tracked page is offered at most once. Dirty or pinned
    /// candidates are handed back to the policy.
    fn evict_page(&self) -> Result<()> {
        let mut policy = self.policy.lock();
        let mut skipped = Vec::new();
        let mut victim = None;

        for _ in 0..policy.len() {
            let Some(candidate) = policy.evict() else {
                break;
            };
            let mut table = self.page_table.write();
            let in_use = table
                .get(&candidate)
                .map(|frame| frame.is_dirty() || frame.is_pinned());
            match in_use {
                None => continue,
                Some(true) => {
                    BufferPoolStats::bump(&self.stats.dirty_skips);
                    skipped.push(candidate);
                }
                Some(false) => {
                    table.remove(&candidate);
                    victim = Some(candidate);
                    break;
                }
            }
        }

        for page_id in skipped {
            policy.record_access(page_id);
        }

        match victim {
            Some(page_id) => {
                BufferPoolStats::bump(&self.stats.evictions);
                debug!(page = %page_id, "page evicted");
                Ok(())
            }
            None => {
                warn!(capacity = self.capacity, "no clean page to evict");
                Err(Error::CapacityExhausted {
                    capacity: self.capacity,
                })
            }
        }
    }

    // ========================================================================
    // Internal: Write-back
    // ========================================================================

    fn frames_dirtied_by(&self, txn: TransactionId) -> Vec<Arc<Frame>> {
        let mut frames: Vec<Arc<Frame>> = self
            .page_table
            .read()
            .values()
            .filter(|f| f.dirtied_by() == Some(txn))
            .cloned()
            .collect();
        frames.sort_by_key(|f| f.page_id());
        frames
    }

    /// Log, force, write and mark clean. Caller holds the latch.
    fn write_back(&self, frame: &Frame) -> Result<()> {
        let page_id = frame.page_id();
        let Some(txn) = frame.dirtied_by() else {
            return Ok(());
        };
        let store = self.table(page_id.table_id())?;

        let after = frame.page().snapshot();
        let before = frame.before_image().unwrap_or_else(|| after.snapshot());
        self.log.log_write(txn, page_id, &before, &after)?;
        self.log.force()?;

        store.write_page(page_id, &after)?;
        frame.mark_clean();
        BufferPoolStats::bump(&self.stats.pages_written);

        debug!(txn = %txn, page = %page_id, "page written back");
        Ok(())
    }
}

impl std::fmt::Debug for BufferPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("capacity", &self.capacity)
            .field("resident", &self.resident_count())
            .field("stats", &self.stats.snapshot())
            .finish()
    }
}
