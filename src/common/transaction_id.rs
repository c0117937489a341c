//! Transaction identifier and access permission types.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of fresh transaction ids for the whole process.
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies a transaction.
///
/// Ids minted with [`TransactionId::next`] are unique for the lifetime of
/// the process, so they are safe to use as lock owners and as the
/// dirtying-transaction marker on cached pages.
///
/// # Example
/// ```
/// use pagevault::TransactionId;
///
/// let t1 = TransactionId::next();
/// let t2 = TransactionId::next();
/// assert_ne!(t1, t2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Mint a new, globally unique transaction id.
    pub fn next() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txn({})", self.0)
    }
}

/// Access level requested when fetching a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Permissions {
    ReadOnly,
    ReadWrite,
}
