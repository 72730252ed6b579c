//! Occupancy and activity counters for a pool.

/// Point-in-time occupancy plus cumulative operation counters.
///
/// Occupancy fields are derived from the block chain when the snapshot is
/// taken; the counters accumulate over the pool's lifetime.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Arena size in bytes.
    pub capacity: usize,
    /// Bytes held by allocated blocks.
    pub used_bytes: usize,
    /// Bytes held by free blocks.
    pub free_bytes: usize,
    /// Number of blocks in the chain.
    pub block_count: usize,
    /// Number of free blocks in the chain.
    pub free_block_count: usize,
    /// Number of allocated blocks in the chain.
    pub live_allocations: usize,
    /// Size of the largest free block.
    pub largest_free: usize,
    /// Cumulative successful `allocate` calls.
    pub allocations: u64,
    /// Cumulative successful `free` calls.
    pub frees: u64,
    /// Cumulative `allocate`/`resize` calls rejected for lack of space.
    pub failed_allocations: u64,
    /// Cumulative resizes satisfied without moving.
    pub resizes_in_place: u64,
    /// Cumulative resizes that moved the allocation.
    pub resizes_moved: u64,
}

impl PoolStats {
    /// External fragmentation in `[0, 1]`: the share of free space that
    /// lies outside the largest free block.
    pub fn fragmentation(&self) -> f64 {
        if self.free_bytes == 0 {
            return 0.0;
        }
        1.0 - self.largest_free as f64 / self.free_bytes as f64
    }
}
