//! Error types for PageVault.

use thiserror::Error;

use super::{PageId, RecordId, TableId, TransactionId};

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, Error>;

/// All possible errors in PageVault.
///
/// Locking, capacity and backing-store failures share one enum so callers
/// can propagate any of them with `?` and still tell them apart.
#[derive(Debug, Error)]
pub enum Error {
    /// The lock request closed a cycle in the wait-for graph.
    ///
    /// The requesting transaction must stop and abort.
    #[error("{txn} aborted: deadlock detected while locking {page}")]
    DeadlockDetected { txn: TransactionId, page: PageId },

    /// Every resident page is dirty or pinned, so nothing can be evicted.
    #[error("buffer pool exhausted: all {capacity} resident pages are dirty or pinned")]
    CapacityExhausted { capacity: usize },

    /// I/O error from a table file or the log.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested page does not exist in its table.
    #[error("{0} not found")]
    PageNotFound(PageId),

    /// No record lives at the given slot.
    #[error("record {0} not found")]
    TupleNotFound(RecordId),

    /// The page has no room for the record.
    #[error("{0} has no room for the record")]
    PageFull(PageId),

    /// A record too large to fit on any page.
    #[error("record of {0} bytes does not fit on a page")]
    TupleTooLarge(usize),

    /// No backing store is registered for the table.
    #[error("no backing store registered for {0}")]
    UnknownTable(TableId),

    /// A write guard was requested through a read-only page handle.
    #[error("{0} was fetched read-only")]
    ReadOnlyAccess(PageId),

    /// A page write was attempted without an exclusive lock, typically
    /// through a handle kept past the end of its transaction.
    #[error("{txn} holds no exclusive lock on {page}")]
    LockNotHeld { txn: TransactionId, page: PageId },

    /// A log record failed its checksum or was truncated.
    #[error("corrupt log record at offset {offset}")]
    CorruptLogRecord { offset: u64 },
}

impl Error {
    /// True if the caller should abort its transaction and may retry later.
    pub fn is_deadlock(&self) -> bool {
        matches!(self, Error::DeadlockDetected { .. })
    }

    /// True if the failure is structural and retrying cannot help.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::CapacityExhausted { .. })
    }
}
