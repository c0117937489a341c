//! Table File - a single-file backing store for one table.
//!
//! The [`TableFile`] handles all direct file operations for a table:
//! - Reading and writing pages
//! - Allocating new pages
//! - Inserting and deleting records through the buffer pool

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;
use tracing::debug;

use crate::buffer::BufferPool;
use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Permissions, RecordId, Result, TableId, TransactionId};
use crate::storage::backing_store::{BackingStore, TouchedPages};
use crate::storage::page::Page;

/// Stores one table as a sequence of pages in a single file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┘
/// ```
/// Page N is located at file offset `N × PAGE_SIZE`.
///
/// # Record Layout
/// Each page starts with a `u16` holding the end of its used region,
/// followed by records packed back to back as `[u16 len][bytes]`. A
/// deleted record keeps its space and has the top bit of `len` set, so
/// slot numbers stay stable.
///
/// # Durability
/// Page writes and allocations are followed by `fsync()`.
pub struct TableFile {
    table_id: TableId,
    inner: Mutex<FileState>,
}

struct FileState {
    file: File,
    page_count: u32,
}

impl TableFile {
    /// Create a new table file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P, table_id: TableId) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            table_id,
            inner: Mutex::new(FileState {
                file,
                page_count: 0,
            }),
        })
    }

    /// Open an existing table file.
    pub fn open<P: AsRef<Path>>(path: P, table_id: TableId) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let page_count = (file.metadata()?.len() / PAGE_SIZE as u64) as u32;

        Ok(Self {
            table_id,
            inner: Mutex::new(FileState { file, page_count }),
        })
    }

    /// Open an existing table file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P, table_id: TableId) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path, table_id)
        } else {
            Self::create(path, table_id)
        }
    }

    /// Append a zeroed page to the file and return its id.
    pub fn allocate_page(&self) -> Result<PageId> {
        let mut state = self.inner.lock();
        let page_id = PageId::new(self.table_id, state.page_count);

        let offset = (page_id.page_no() as u64) * (PAGE_SIZE as u64);
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(Page::new().as_slice())?;
        state.file.sync_all()?;

        state.page_count += 1;
        debug!(page = %page_id, "allocated table page");
        Ok(page_id)
    }

    /// Total size of the table file in bytes.
    pub fn file_size(&self) -> u64 {
        (self.inner.lock().page_count as u64) * (PAGE_SIZE as u64)
    }

    /// Read every live record, locking each page shared for `txn`.
    pub fn scan(&self, pool: &BufferPool, txn: TransactionId) -> Result<Vec<(RecordId, Vec<u8>)>> {
        let mut out = Vec::new();
        for page_no in 0..self.page_count() {
            let page_id = PageId::new(self.table_id, page_no);
            let handle = pool.fetch(txn, page_id, Permissions::ReadOnly)?;
            let page = handle.read();
            for (slot, bytes) in layout::records(&page) {
                out.push((RecordId::new(page_id, slot), bytes.to_vec()));
            }
        }
        Ok(out)
    }

    fn check_bounds(&self, page_id: PageId, page_count: u32) -> Result<u64> {
        if page_id.table_id() != self.table_id || page_id.page_no() >= page_count {
            return Err(Error::PageNotFound(page_id));
        }
        Ok((page_id.page_no() as u64) * (PAGE_SIZE as u64))
    }
}

impl BackingStore for TableFile {
    fn table_id(&self) -> TableId {
        self.table_id
    }

    fn read_page(&self, page_id: PageId) -> Result<Page> {
        let mut state = self.inner.lock();
        let offset = self.check_bounds(page_id, state.page_count)?;
        state.file.seek(SeekFrom::Start(offset))?;

        let mut page = Page::new();
        state.file.read_exact(page.as_mut_slice())?;
        Ok(page)
    }

    fn write_page(&self, page_id: PageId, page: &Page) -> Result<()> {
        let mut state = self.inner.lock();
        let offset = self.check_bounds(page_id, state.page_count)?;
        state.file.seek(SeekFrom::Start(offset))?;
        state.file.write_all(page.as_slice())?;
        state.file.sync_all()?;
        Ok(())
    }

    fn insert_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        tuple: &[u8],
    ) -> Result<TouchedPages> {
        if tuple.len() > layout::MAX_RECORD {
            return Err(Error::TupleTooLarge(tuple.len()));
        }

        // Check existing pages shared; only the chosen page is locked exclusive.
        for page_no in 0..self.page_count() {
            let page_id = PageId::new(self.table_id, page_no);
            let already_locked = pool.holds_lock(txn, page_id);
            let has_room = {
                let handle = pool.fetch(txn, page_id, Permissions::ReadOnly)?;
                let page = handle.read();
                layout::has_room(&page, tuple.len())
            };

            if has_room {
                let handle = pool.fetch(txn, page_id, Permissions::ReadWrite)?;
                let mut after = handle.read().snapshot();
                layout::append(&mut after, tuple).ok_or(Error::PageFull(page_id))?;
                return Ok(vec![(page_id, after)]);
            }
            if !already_locked {
                pool.release_page(txn, page_id);
            }
        }

        let page_id = self.allocate_page()?;
        let handle = pool.fetch(txn, page_id, Permissions::ReadWrite)?;
        let mut after = handle.read().snapshot();
        layout::append(&mut after, tuple).ok_or(Error::PageFull(page_id))?;
        Ok(vec![(page_id, after)])
    }

    fn delete_tuple(
        &self,
        pool: &BufferPool,
        txn: TransactionId,
        record: RecordId,
    ) -> Result<TouchedPages> {
        let page_id = record.page_id;
        let handle = pool.fetch(txn, page_id, Permissions::ReadWrite)?;
        let mut after = handle.read().snapshot();
        if !layout::tombstone(&mut after, record.slot) {
            return Err(Error::TupleNotFound(record));
        }
        Ok(vec![(page_id, after)])
    }

    fn page_count(&self) -> u32 {
        self.inner.lock().page_count
    }
}

/// Minimal slotted record format used by [`TableFile`].
pub(crate) mod layout {
    use crate::common::config::PAGE_SIZE;
    use crate::storage::page::Page;

    const HEADER: usize = 2;
    const LEN_PREFIX: usize = 2;
    const DELETED: u16 = 0x8000;

    /// Largest record that fits on an empty page.
    pub const MAX_RECORD: usize = PAGE_SIZE - HEADER - LEN_PREFIX;

    fn read_u16(page: &Page, at: usize) -> u16 {
        let data = page.as_slice();
        u16::from_le_bytes([data[at], data[at + 1]])
    }

    fn write_u16(page: &mut Page, at: usize, value: u16) {
        page.as_mut_slice()[at..at + 2].copy_from_slice(&value.to_le_bytes());
    }

    /// End of the used region; a zeroed page reads as empty and a corrupt
    /// header never points past the page.
    fn used(page: &Page) -> usize {
        (read_u16(page, 0) as usize).clamp(HEADER, PAGE_SIZE)
    }

    /// `(offset, slot)` of every record header, live or deleted.
    ///
    /// Stops at the first record that would run past the used region.
    fn slots(page: &Page) -> Vec<(usize, u16)> {
        let end = used(page);
        let mut at = HEADER;
        let mut out = Vec::new();
        let mut slot = 0u16;
        while at + LEN_PREFIX <= end {
            let len = (read_u16(page, at) & !DELETED) as usize;
            if at + LEN_PREFIX + len > end {
                break;
            }
            out.push((at, slot));
            at += LEN_PREFIX + len;
            slot += 1;
        }
        out
    }

    pub fn has_room(page: &Page, len: usize) -> bool {
        used(page) + LEN_PREFIX + len <= PAGE_SIZE
    }

    /// Append a record, returning its slot.
    pub fn append(page: &mut Page, record: &[u8]) -> Option<u16> {
        if !has_room(page, record.len()) {
            return None;
        }
        let slot = slots(page).len() as u16;
        let at = used(page);
        write_u16(page, at, record.len() as u16);
        page.as_mut_slice()[at + LEN_PREFIX..at + LEN_PREFIX + record.len()]
            .copy_from_slice(record);
        write_u16(page, 0, (at + LEN_PREFIX + record.len()) as u16);
        Some(slot)
    }

    /// Mark a live record deleted. Returns false if there is none.
    pub fn tombstone(page: &mut Page, slot: u16) -> bool {
        match slots(page).into_iter().find(|&(_, s)| s == slot) {
            Some((at, _)) => {
                let len = read_u16(page, at);
                if len & DELETED != 0 {
                    return false;
                }
                write_u16(page, at, len | DELETED);
                true
            }
            None => false,
        }
    }

    /// Live records on the page.
    pub fn records(page: &Page) -> Vec<(u16, &[u8])> {
        slots(page)
            .into_iter()
            .filter_map(|(at, slot)| {
                let len = read_u16(page, at);
                if len & DELETED != 0 {
                    return None;
                }
                let start = at + LEN_PREFIX;
                Some((slot, &page.as_slice()[start..start + len as usize]))
            })
            .collect()
    }
}
