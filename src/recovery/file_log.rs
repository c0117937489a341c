//! Append-only log file of page update records.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result, TableId, TransactionId};
use crate::recovery::LogSink;
use crate::storage::page::Page;

/// txn (8) + table id (4) + page number (4).
const HEADER_SIZE: usize = 16;
const CHECKSUM_SIZE: usize = 4;
const RECORD_SIZE: usize = HEADER_SIZE + 2 * PAGE_SIZE + CHECKSUM_SIZE;

/// One update record read back from a [`FileLog`].
#[derive(Debug, PartialEq, Eq)]
pub struct LogRecord {
    pub txn: TransactionId,
    pub page_id: PageId,
    pub before: Box<Page>,
    pub after: Box<Page>,
}

/// Log file of fixed-size update records.
///
/// # Record Layout
/// ```text
/// ┌──────────┬──────────┬─────────┬──────────────┬──────────────┬────────┐
/// │ txn u64  │ table u32│ page u32│ before (4KB) │ after (4KB)  │ crc32  │
/// └──────────┴──────────┴─────────┴──────────────┴──────────────┴────────┘
/// ```
/// Integers are little-endian. The CRC32 covers every preceding byte of
/// the record.
///
/// Appends go through a `BufWriter`; [`LogSink::force`] flushes it and
/// calls `fsync()`.
pub struct FileLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileLog {
    /// Open a log file for appending, creating it if missing.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every durable record back, verifying checksums.
    ///
    /// Records still sitting in the write buffer are not visible until
    /// the next [`LogSink::force`].
    ///
    /// # Errors
    /// - `Error::CorruptLogRecord` on a checksum mismatch or a torn record
    pub fn records(&self) -> Result<Vec<LogRecord>> {
        let mut buf = Vec::new();
        File::open(&self.path)?.read_to_end(&mut buf)?;

        let mut records = Vec::with_capacity(buf.len() / RECORD_SIZE);
        for (index, chunk) in buf.chunks(RECORD_SIZE).enumerate() {
            let offset = (index * RECORD_SIZE) as u64;
            if chunk.len() != RECORD_SIZE {
                return Err(Error::CorruptLogRecord { offset });
            }
            records.push(decode(chunk).ok_or(Error::CorruptLogRecord { offset })?);
        }
        Ok(records)
    }
}

impl LogSink for FileLog {
    fn log_write(
        &self,
        txn: TransactionId,
        page_id: PageId,
        before: &Page,
        after: &Page,
    ) -> Result<()> {
        let record = encode(txn, page_id, before, after);
        self.writer.lock().write_all(&record)?;
        debug!(txn = %txn, page = %page_id, "log record appended");
        Ok(())
    }

    fn force(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }
}

fn encode(txn: TransactionId, page_id: PageId, before: &Page, after: &Page) -> Vec<u8> {
    let mut buf = Vec::with_capacity(RECORD_SIZE);
    buf.extend_from_slice(&txn.0.to_le_bytes());
    buf.extend_from_slice(&page_id.table_id().0.to_le_bytes());
    buf.extend_from_slice(&page_id.page_no().to_le_bytes());
    buf.extend_from_slice(before.as_slice());
    buf.extend_from_slice(after.as_slice());
    let checksum = crc32fast::hash(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    buf
}

fn decode(chunk: &[u8]) -> Option<LogRecord> {
    let (body, tail) = chunk.split_at(RECORD_SIZE - CHECKSUM_SIZE);
    let stored = u32::from_le_bytes(tail.try_into().ok()?);
    if crc32fast::hash(body) != stored {
        return None;
    }

    let txn = u64::from_le_bytes(body[0..8].try_into().ok()?);
    let table = u32::from_le_bytes(body[8..12].try_into().ok()?);
    let page_no = u32::from_le_bytes(body[12..16].try_into().ok()?);
    let before_end = HEADER_SIZE + PAGE_SIZE;

    Some(LogRecord {
        txn: TransactionId(txn),
        page_id: PageId::new(TableId::new(table), page_no),
        before: Box::new(Page::from_bytes(&body[HEADER_SIZE..before_end])),
        after: Box::new(Page::from_bytes(&body[before_end..])),
    })
}
