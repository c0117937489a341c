//! PageVault - the transactional storage core of a relational database.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            PageVault                            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │           Buffer Pool (buffer/)                          │   │
//! │  │   fetch → lock → cache hit | load + evict                │   │
//! │  │   commit (WAL, write back) | abort (before-images)       │   │
//! │  │   ┌─────────────────────────────────────────────────┐   │   │
//! │  │   │        Eviction Policies: FIFO | LRU            │   │   │
//! │  │   └─────────────────────────────────────────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │            ↓                    ↓                    ↓          │
//! │  ┌──────────────────┐  ┌─────────────────┐  ┌───────────────┐  │
//! │  │ concurrency/     │  │ storage/        │  │ recovery/     │  │
//! │  │ LockManager      │  │ BackingStore    │  │ LogSink       │  │
//! │  │ WaitForGraph     │  │ TableFile, Page │  │ FileLog       │  │
//! │  └──────────────────┘  └─────────────────┘  └───────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, TransactionId, Error, config)
//! - [`buffer`] - Buffer pool and eviction policies
//! - [`concurrency`] - Page locks and deadlock detection
//! - [`storage`] - Backing store interface, table files and pages
//! - [`recovery`] - Write-ahead log
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use pagevault::common::config::BufferPoolConfig;
//! use pagevault::recovery::FileLog;
//! use pagevault::storage::TableFile;
//! use pagevault::{BufferPool, TableId, TransactionId};
//!
//! let log = Arc::new(FileLog::open("pool.log").unwrap());
//! let pool = BufferPool::new(BufferPoolConfig::default(), log);
//!
//! let table_id = TableId::new(1);
//! pool.register_table(Arc::new(TableFile::open_or_create("users.tbl", table_id).unwrap()));
//!
//! let txn = TransactionId::next();
//! pool.apply_insert(txn, table_id, b"alice").unwrap();
//! pool.commit(txn).unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod concurrency;
pub mod recovery;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, PageId, Permissions, RecordId, Result, TableId, TransactionId};

pub use buffer::{BufferPool, BufferPoolStats, PageHandle, StatsSnapshot};
pub use concurrency::{LockManager, LockMode};
pub use storage::page::Page;
pub use storage::{BackingStore, TableFile};
