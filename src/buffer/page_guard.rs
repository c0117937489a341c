//! Page handles and RAII guards for page access.
//!
//! - [`PageHandle`] - A pinned, locked page checked out by one transaction
//! - [`PageReadGuard`] - Shared read access (multiple allowed)
//! - [`PageWriteGuard`] - Exclusive write access (dirties the page)
//!
//! The handle unpins the page when dropped. Page locks are not released
//! with the handle; they belong to the transaction until it ends, and a
//! handle outliving its transaction can no longer write.

use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{Error, PageId, Permissions, Result, TransactionId};
use crate::concurrency::{LockManager, LockMode};
use crate::storage::page::Page;

use super::frame::Frame;

/// A page checked out of the buffer pool by [`BufferPool::fetch`].
///
/// The handle keeps the frame pinned, so the pool will not evict it while
/// the handle is alive.
///
/// # Example
/// ```ignore
/// let handle = pool.fetch(txn, page_id, Permissions::ReadWrite)?;
/// handle.write()?.as_mut_slice()[0] = 0xFF; // page now dirty by txn
/// let first = handle.read().as_slice()[0];
/// // handle drops here, page unpinned
/// ```
///
/// [`BufferPool::fetch`]: super::BufferPool::fetch
pub struct PageHandle {
    frame: Arc<Frame>,
    locks: Arc<LockManager>,
    txn: TransactionId,
    permissions: Permissions,
}

impl PageHandle {
    /// Wrap a frame the pool has already pinned.
    pub(crate) fn new(
        frame: Arc<Frame>,
        locks: Arc<LockManager>,
        txn: TransactionId,
        permissions: Permissions,
    ) -> Self {
        Self {
            frame,
            locks,
            txn,
            permissions,
        }
    }

    #[inline]
    pub fn page_id(&self) -> PageId {
        self.frame.page_id()
    }

    #[inline]
    pub fn transaction(&self) -> TransactionId {
        self.txn
    }

    #[inline]
    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    /// Shared access to the page contents.
    pub fn read(&self) -> PageReadGuard<'_> {
        PageReadGuard {
            page_id: self.page_id(),
            lock: self.frame.page(),
        }
    }

    /// Exclusive access to the page contents.
    ///
    /// Marks the page dirty by this handle's transaction, saving its
    /// before-image first if it was clean.
    ///
    /// # Errors
    /// - `Error::ReadOnlyAccess` if the handle was fetched read-only
    /// - `Error::LockNotHeld` if the transaction no longer holds the page's
    ///   exclusive lock (it committed or aborted)
    pub fn write(&self) -> Result<PageWriteGuard<'_>> {
        let page_id = self.page_id();
        if self.permissions != Permissions::ReadWrite {
            return Err(Error::ReadOnlyAccess(page_id));
        }
        if self.locks.lock_mode(self.txn, page_id) != Some(LockMode::Exclusive) {
            return Err(Error::LockNotHeld {
                txn: self.txn,
                page: page_id,
            });
        }
        self.frame.mark_dirty(self.txn);
        Ok(PageWriteGuard {
            page_id: self.page_id(),
            lock: self.frame.page_mut(),
        })
    }
}

impl Drop for PageHandle {
    fn drop(&mut self) {
        self.frame.unpin();
    }
}

impl std::fmt::Debug for PageHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageHandle")
            .field("page_id", &self.page_id())
            .field("txn", &self.txn)
            .field("permissions", &self.permissions)
            .finish()
    }
}

/// Guard for read-only page access.
///
/// Multiple `PageReadGuard`s can exist for the same page simultaneously.
#[derive(Debug)]
pub struct PageReadGuard<'a> {
    page_id: PageId,
    lock: RwLockReadGuard<'a, Page>,
}

impl PageReadGuard<'_> {
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageReadGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

/// Guard for exclusive write access to a page.
///
/// Only one `PageWriteGuard` can exist for a page at a time. The page was
/// marked dirty when the guard was taken.
#[derive(Debug)]
pub struct PageWriteGuard<'a> {
    page_id: PageId,
    lock: RwLockWriteGuard<'a, Page>,
}

impl PageWriteGuard<'_> {
    #[inline]
    pub fn page_id(&self) -> PageId {
        self.page_id
    }
}

impl Deref for PageWriteGuard<'_> {
    type Target = Page;

    #[inline]
    fn deref(&self) -> &Page {
        &self.lock
    }
}

impl DerefMut for PageWriteGuard<'_> {
    #[inline]
    fn deref_mut(&mut self) -> &mut Page {
        &mut self.lock
    }
}
