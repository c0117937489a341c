//! Frame - one cached page in the buffer pool.
//!
//! A [`Frame`] holds a [`Page`] plus metadata needed for buffer management:
//! - Which page is loaded
//! - Pin count for reference counting
//! - Which transaction dirtied it, and the page as it was before that

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, TransactionId};
use crate::storage::page::Page;

#[derive(Default)]
struct DirtyState {
    dirtied_by: Option<TransactionId>,
    before_image: Option<Box<Page>>,
}

/// A cached page.
///
/// Frames are created when a page is admitted and dropped on eviction or
/// discard. The pool and every live [`PageHandle`](super::PageHandle) share
/// a frame through an `Arc`, so a change made through a handle is the
/// change the pool later commits or rolls back.
///
/// # Thread Safety
/// - `page`: `RwLock` for read/write synchronization
/// - `dirty`: `Mutex`, so the dirtier and the before-image change together
/// - `pin_count`: `AtomicU32` for lock-free reference counting
///
/// Lock order is `dirty` then `page`.
pub struct Frame {
    page_id: PageId,
    page: RwLock<Page>,
    dirty: Mutex<DirtyState>,
    pin_count: AtomicU32,
}

impl Frame {
    /// Create a clean, unpinned frame holding `page`.
    pub fn new(page_id: PageId, page: Page) -> Self {
        Self {
            page_id,
            page: RwLock::new(page),
            dirty: Mutex::new(DirtyState::default()),
            pin_count: AtomicU32::new(0),
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    // ========================================================================
    // Page access (RwLock)
    // ========================================================================

    /// Acquire read lock on the page.
    #[inline]
    pub fn page(&self) -> RwLockReadGuard<'_, Page> {
        self.page.read()
    }

    /// Acquire write lock on the page.
    ///
    /// Does not touch the dirty state; callers go through [`Frame::mark_dirty`]
    /// first.
    #[inline]
    pub fn page_mut(&self) -> RwLockWriteGuard<'_, Page> {
        self.page.write()
    }

    // ========================================================================
    // Pin count operations (Atomic)
    // ========================================================================

    /// Increment the pin count. Returns the new pin count.
    #[inline]
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Decrement the pin count. Returns the new pin count.
    ///
    /// # Panics
    /// Panics if pin count is already 0.
    #[inline]
    pub fn unpin(&self) -> u32 {
        let old = self.pin_count.fetch_sub(1, Ordering::AcqRel);
        assert!(old > 0, "pin count underflow");
        old - 1
    }

    #[inline]
    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_pinned(&self) -> bool {
        self.pin_count() > 0
    }

    // ========================================================================
    // Dirty tracking and before-images
    // ========================================================================

    /// The transaction whose uncommitted changes the page holds.
    pub fn dirtied_by(&self) -> Option<TransactionId> {
        self.dirty.lock().dirtied_by
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirtied_by().is_some()
    }

    /// Record that `txn` is about to change the page.
    ///
    /// A clean page first has its current contents saved as the
    /// before-image. A page that is already dirty keeps its existing
    /// before-image. Must not be called while holding the page lock.
    pub fn mark_dirty(&self, txn: TransactionId) {
        let mut dirty = self.dirty.lock();
        if dirty.dirtied_by.is_none() {
            dirty.before_image = Some(self.page.read().snapshot());
        }
        dirty.dirtied_by = Some(txn);
    }

    /// Copy of the page as it was before the current dirtier touched it.
    pub fn before_image(&self) -> Option<Box<Page>> {
        self.dirty.lock().before_image.as_ref().map(|p| p.snapshot())
    }

    /// Clear the dirty marker and adopt the current contents as the new
    /// before-image. Used once the contents are durable.
    pub fn mark_clean(&self) {
        let mut dirty = self.dirty.lock();
        dirty.before_image = Some(self.page.read().snapshot());
        dirty.dirtied_by = None;
    }

    /// Put the before-image back and clear the dirty marker.
    ///
    /// Returns `false` if the page was clean.
    pub fn roll_back(&self) -> bool {
        let mut dirty = self.dirty.lock();
        if dirty.dirtied_by.take().is_none() {
            return false;
        }
        if let Some(before) = &dirty.before_image {
            self.page.write().copy_from(before);
        }
        true
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("page_id", &self.page_id)
            .field("pin_count", &self.pin_count())
            .field("dirtied_by", &self.dirtied_by())
            .finish()
    }
}
