//! Buffer pool management.
//!
//! The buffer pool is the in-memory cache layer between transactions and
//! the tables' backing stores. It holds a bounded number of pages and
//! locks every page it hands out.
//!
//! # Components
//! - [`BufferPool`] - The transactional page cache
//! - [`Frame`] - A cached page plus pin count and dirty state
//! - [`PageHandle`] - A pinned page checked out by one transaction
//! - [`PageReadGuard`] / [`PageWriteGuard`] - RAII guards for page access
//! - [`BufferPoolStats`] - Performance statistics
//! - [`replacer`] - Eviction policy implementations

mod buffer_pool;
mod frame;
mod page_guard;
pub mod replacer;
mod stats;

pub use buffer_pool::BufferPool;
pub use frame::Frame;
pub use page_guard::{PageHandle, PageReadGuard, PageWriteGuard};
pub use stats::{BufferPoolStats, StatsSnapshot};
