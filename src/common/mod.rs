//! Common types and utilities shared across PageVault.
//!
//! This module contains fundamental primitives used throughout the codebase:
//! - Configuration constants and settings
//! - Error types
//! - Identifiers (PageId, TableId, RecordId, TransactionId)

pub mod config;
pub mod error;
mod page_id;
mod transaction_id;

pub use error::{Error, Result};
pub use page_id::{PageId, RecordId, TableId};
pub use transaction_id::{Permissions, TransactionId};
