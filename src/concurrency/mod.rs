//! Concurrency control: page-level two-phase locking.
//!
//! - [`LockManager`] - Shared/exclusive lock table with deadlock detection
//! - [`WaitForGraph`] - Who-waits-for-whom graph used for cycle detection

mod lock_manager;
mod wait_for_graph;

pub use lock_manager::{LockManager, LockMode};
pub use wait_for_graph::WaitForGraph;
