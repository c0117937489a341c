//! The collaborator interface the buffer pool consumes for each table.

use crate::buffer::BufferPool;
use crate::common::{PageId, RecordId, Result, TableId, TransactionId};
use crate::storage::page::Page;

/// Pages a tuple mutation touched, paired with their new contents.
pub type TouchedPages = Vec<(PageId, Box<Page>)>;

/// Per-table page storage.
///
/// The buffer pool is the only caller. Page reads and writes go straight to
/// durable storage; tuple mutations read current page contents through the
/// pool (so they see the transaction's own uncommitted changes and take the
/// right locks) and return after-images instead of writing anything. The
/// pool installs those after-images, marks them dirty and makes them
/// durable at commit.
pub trait BackingStore: Send + Sync {
    /// Table served by this store.
    fn table_id(&self) -> TableId;

    /// Read a page from durable storage.
    fn read_page(&self, page_id: PageId) -> Result<Page>;

    /// Write a page to durable storage.
    fn write_page(&self, page_id: PageId, page: &Page) -> Result<()>;

    /// Add a record on behalf of `txn`, returning every page it changed.
    fn insert_tuple(&self, pool: &BufferPool, txn: TransactionId, tuple: &[u8])
        -> Result<TouchedPages>;

    /// Remove a record on behalf of `txn`, returning every page it changed.
    fn delete_tuple(&self, pool: &BufferPool, txn: TransactionId, record: RecordId)
        -> Result<TouchedPages>;

    /// Number of pages currently in the table.
    fn page_count(&self) -> u32;
}
