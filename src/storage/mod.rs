//! Storage layer - the per-table page stores the buffer pool reads from
//! and writes back to.
//!
//! - [`BackingStore`] - The collaborator interface
//! - [`TableFile`] - Single-file implementation
//! - [`page`] - The page container

mod backing_store;
pub mod page;
mod table_file;

pub use backing_store::{BackingStore, TouchedPages};
pub use table_file::TableFile;
