//! Write-ahead logging for committed page changes.
//!
//! The buffer pool writes one update record per dirty page and forces the
//! log before the page itself reaches its backing store.
//!
//! - [`LogSink`] - What the pool needs from a log
//! - [`FileLog`] - Append-only, checksummed log file
//! - [`NoopLog`] - Discards everything

mod file_log;

pub use file_log::{FileLog, LogRecord};

use crate::common::{PageId, Result, TransactionId};
use crate::storage::page::Page;

/// Destination for update records.
pub trait LogSink: Send + Sync {
    /// Append an update record for one page.
    fn log_write(
        &self,
        txn: TransactionId,
        page_id: PageId,
        before: &Page,
        after: &Page,
    ) -> Result<()>;

    /// Make every record appended so far durable.
    fn force(&self) -> Result<()>;
}

/// A log that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLog;

impl LogSink for NoopLog {
    fn log_write(&self, _: TransactionId, _: PageId, _: &Page, _: &Page) -> Result<()> {
        Ok(())
    }

    fn force(&self) -> Result<()> {
        Ok(())
    }
}
