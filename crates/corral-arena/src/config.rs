//! Pool configuration parameters.

use crate::error::PoolError;

/// Configuration for a [`PoolAllocator`](crate::PoolAllocator).
///
/// The arena is reserved once at construction and never grows, so the
/// capacity chosen here is a hard ceiling on everything the pool will
/// ever hand out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Size of the arena in bytes.
    ///
    /// Default: 65_536 (64 KiB). Must be non-zero.
    pub capacity: usize,
}

impl PoolConfig {
    /// Default arena size in bytes.
    pub const DEFAULT_CAPACITY: usize = 64 * 1024;

    /// Create a config for an arena of `capacity` bytes.
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Check structural constraints.
    ///
    /// Called by [`PoolAllocator::new`](crate::PoolAllocator::new); exposed
    /// so callers can validate user-supplied sizes up front.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.capacity == 0 {
            return Err(PoolError::InvalidConfig {
                reason: "capacity must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
