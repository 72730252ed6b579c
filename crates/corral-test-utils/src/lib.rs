//! Test utilities and workload generators for Corral development.
//!
//! Provides seeded, reproducible operation streams for driving a
//! [`PoolAllocator`] and an [`assert_pool_consistent`] check that combines
//! the structural invariants with byte accounting.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use corral_arena::{Addr, PoolAllocator};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// One step of a generated allocator workload.
///
/// `Free` and `Resize` carry a selector that is reduced modulo the number
/// of live allocations when the op is applied, so any stream is valid
/// against any pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolOp {
    Allocate(usize),
    Free(usize),
    Resize(usize, usize),
}

/// Parameters for [`churn`].
#[derive(Clone, Debug)]
pub struct ChurnProfile {
    /// Largest size requested by `Allocate` and `Resize`.
    pub max_size: usize,
    /// Probability that a step is an `Allocate`.
    pub alloc_weight: f64,
    /// Probability that a non-allocate step is a `Resize` instead of a `Free`.
    pub resize_weight: f64,
}

impl Default for ChurnProfile {
    fn default() -> Self {
        Self {
            max_size: 64,
            alloc_weight: 0.55,
            resize_weight: 0.25,
        }
    }
}

/// Generate `len` ops from `seed`. The same seed always yields the same stream.
pub fn churn(seed: u64, len: usize, profile: &ChurnProfile) -> Vec<PoolOp> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            let size = rng.random_range(1..=profile.max_size);
            let selector = rng.random_range(0..usize::MAX);
            if rng.random_bool(profile.alloc_weight) {
                PoolOp::Allocate(size)
            } else if rng.random_bool(profile.resize_weight) {
                PoolOp::Resize(selector, size)
            } else {
                PoolOp::Free(selector)
            }
        })
        .collect()
}

/// Counts of what happened while replaying a workload.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub allocated: usize,
    pub freed: usize,
    pub resized: usize,
    pub exhausted: usize,
}

/// Apply `ops` to `pool`, tracking live addresses in `live`.
///
/// Allocation and resize exhaustion is counted, not treated as failure.
/// Any other error panics, since it means the pool rejected an address it
/// handed out itself.
pub fn replay(pool: &PoolAllocator, ops: &[PoolOp], live: &mut Vec<Addr>) -> ReplayOutcome {
    let mut outcome = ReplayOutcome::default();
    for &op in ops {
        match op {
            PoolOp::Allocate(size) => match pool.allocate(size) {
                Ok(addr) => {
                    live.push(addr);
                    outcome.allocated += 1;
                }
                Err(corral_arena::PoolError::OutOfMemory { .. }) => outcome.exhausted += 1,
                Err(e) => panic!("allocate({size}) failed: {e}"),
            },
            PoolOp::Free(_) if live.is_empty() => {}
            PoolOp::Free(selector) => {
                let addr = live.swap_remove(selector % live.len());
                pool.free(addr)
                    .unwrap_or_else(|e| panic!("free({addr}) failed: {e}"));
                outcome.freed += 1;
            }
            PoolOp::Resize(_, _) if live.is_empty() => {}
            PoolOp::Resize(selector, size) => {
                let idx = selector % live.len();
                match pool.resize(live[idx], size) {
                    Ok(addr) => {
                        live[idx] = addr;
                        outcome.resized += 1;
                    }
                    Err(corral_arena::PoolError::OutOfMemory { .. }) => outcome.exhausted += 1,
                    Err(e) => panic!("resize({}, {size}) failed: {e}", live[idx]),
                }
            }
        }
    }
    outcome
}

/// Panic unless the pool's chain is structurally sound and its byte
/// accounting adds up to the arena capacity.
pub fn assert_pool_consistent(pool: &PoolAllocator) {
    if let Err(violation) = pool.verify() {
        panic!("pool invariant violated: {violation}");
    }
    let stats = pool.stats();
    assert_eq!(
        stats.used_bytes + stats.free_bytes,
        stats.capacity,
        "used + free must equal capacity"
    );
    assert_eq!(
        stats.block_count,
        stats.live_allocations + stats.free_block_count
    );
}

/// `len` payloads drawn from `seed`, for list tests.
pub fn payloads(seed: u64, len: usize) -> Vec<u16> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len).map(|_| rng.random()).collect()
}
