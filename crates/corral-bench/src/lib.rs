//! Benchmark profiles for the Corral pool allocator and managed list.
//!
//! Provides pre-built pools, lists and workloads shared by the benches:
//!
//! - [`reference_pool`]: 64 KiB pool, the default capacity
//! - [`fragmented_pool`]: a pool with every other block freed
//! - [`filled_list`]: a list holding `0..len` in order
//! - [`reference_churn`]: a seeded mixed allocate/free/resize stream

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use corral_arena::{Addr, PoolAllocator, PoolConfig, PoolError};
use corral_list::{ListError, ManagedList, NODE_SIZE};
use corral_test_utils::{churn, ChurnProfile, PoolOp};

/// Block size used by [`fragmented_pool`].
pub const FRAGMENT: usize = 32;

/// Build a pool with the default 64 KiB capacity.
pub fn reference_pool() -> Result<PoolAllocator, PoolError> {
    PoolAllocator::new(PoolConfig::default())
}

/// Build a pool of `blocks * FRAGMENT` bytes, fill it with `FRAGMENT`-byte
/// blocks, then free every other one.
///
/// Returns the pool and the addresses that are still allocated. No two free
/// blocks are adjacent, so every request larger than `FRAGMENT` has to walk
/// the whole chain before failing.
pub fn fragmented_pool(blocks: usize) -> Result<(PoolAllocator, Vec<Addr>), PoolError> {
    let pool = PoolAllocator::with_capacity(blocks * FRAGMENT)?;
    let addrs = (0..blocks)
        .map(|_| pool.allocate(FRAGMENT))
        .collect::<Result<Vec<_>, _>>()?;
    let mut held = Vec::with_capacity(blocks / 2);
    for (i, addr) in addrs.into_iter().enumerate() {
        if i % 2 == 0 {
            pool.free(addr)?;
        } else {
            held.push(addr);
        }
    }
    Ok((pool, held))
}

/// Build a list holding `0..len`, with room for `len` more nodes.
pub fn filled_list(len: u16) -> Result<ManagedList, ListError> {
    let list = ManagedList::with_capacity(2 * usize::from(len).max(1) * NODE_SIZE)?;
    for v in 0..len {
        list.insert_tail(v)?;
    }
    Ok(list)
}

/// A 10K-op mixed workload with sizes up to 256 bytes.
pub fn reference_churn(seed: u64) -> Vec<PoolOp> {
    let profile = ChurnProfile {
        max_size: 256,
        ..ChurnProfile::default()
    };
    churn(seed, 10_000, &profile)
}
