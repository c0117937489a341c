//! Configuration constants and construction-time settings.

use std::time::Duration;

/// Size of a page in bytes (4KB).
///
/// Matches the OS page size on most systems, so page I/O stays aligned.
pub const PAGE_SIZE: usize = 4096;

/// Default number of pages cached by a buffer pool.
pub const DEFAULT_POOL_PAGES: usize = 50;

/// Default upper bound on a single lock wait before the waiter re-checks
/// the lock table.
pub const DEFAULT_LOCK_WAIT_SLICE: Duration = Duration::from_millis(10);

/// Which eviction policy a buffer pool uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvictionPolicyKind {
    Fifo,
    #[default]
    Lru,
}

/// How the lock manager reacts to a request it cannot grant right away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeadlockPolicy {
    /// Record wait-for edges and abort only the request that closes a cycle.
    #[default]
    WaitForGraph,
    /// No graph: fail as soon as the request conflicts with more than one
    /// holder, or with a holder that is itself waiting. Waits only behind
    /// a single running holder, so no wait cycle can ever form.
    Conservative,
}

/// Lock manager settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockManagerConfig {
    /// Longest a blocked request sleeps before re-evaluating.
    pub wait_slice: Duration,
    pub deadlock_policy: DeadlockPolicy,
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            wait_slice: DEFAULT_LOCK_WAIT_SLICE,
            deadlock_policy: DeadlockPolicy::default(),
        }
    }
}

/// Buffer pool settings.
///
/// # Example
/// ```
/// use pagevault::common::config::{BufferPoolConfig, EvictionPolicyKind};
///
/// let config = BufferPoolConfig::default()
///     .with_pool_size(8)
///     .with_policy(EvictionPolicyKind::Fifo);
/// assert_eq!(config.pool_size, 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferPoolConfig {
    /// Maximum number of resident pages.
    pub pool_size: usize,
    pub policy: EvictionPolicyKind,
    pub lock: LockManagerConfig,
}

impl BufferPoolConfig {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_policy(mut self, policy: EvictionPolicyKind) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_lock_config(mut self, lock: LockManagerConfig) -> Self {
        self.lock = lock;
        self
    }
}

impl Default for BufferPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_PAGES,
            policy: EvictionPolicyKind::default(),
            lock: LockManagerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_size_is_power_of_two() {
        assert!(PAGE_SIZE.is_power_of_two());
        assert_eq!(PAGE_SIZE, 4096);
    }

    #[test]
    fn test_defaults() {
        let config = BufferPoolConfig::default();
        assert_eq!(config.pool_size, DEFAULT_POOL_PAGES);
        assert_eq!(config.policy, EvictionPolicyKind::Lru);
        assert_eq!(config.lock.deadlock_policy, DeadlockPolicy::WaitForGraph);
        assert_eq!(config.lock.wait_slice, DEFAULT_LOCK_WAIT_SLICE);
    }

    #[test]
    fn test_builder() {
        let lock = LockManagerConfig {
            wait_slice: Duration::from_millis(1),
            deadlock_policy: DeadlockPolicy::Conservative,
        };
        let config = BufferPoolConfig::default()
            .with_pool_size(3)
            .with_policy(EvictionPolicyKind::Fifo)
            .with_lock_config(lock);

        assert_eq!(config.pool_size, 3);
        assert_eq!(config.policy, EvictionPolicyKind::Fifo);
        assert_eq!(config.lock, lock);
    }
}
