//! Thread-safe first-fit pool allocator.
//!
//! [`PoolAllocator`] pairs a `BlockChain` with the arena bytes it
//! describes and serialises every operation behind one `Mutex`. Each
//! public method takes the guard exactly once and does all of its work,
//! including the split/copy/merge sequence of a moving resize, on the
//! unlocked internals. Nothing here calls back into a public method, so
//! the guard is never re-entered.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, warn};

use crate::addr::{Addr, BlockId, BlockInfo};
use crate::chain::BlockChain;
use crate::config::PoolConfig;
use crate::error::{InvariantViolation, PoolError};
use crate::stats::PoolStats;

#[derive(Default)]
struct Counters {
    allocations: u64,
    frees: u64,
    failed_allocations: u64,
    resizes_in_place: u64,
    resizes_moved: u64,
}

/// Everything behind the allocator guard.
struct PoolState {
    chain: BlockChain,
    /// Fixed-size backing storage; `chain` tiles exactly this range.
    arena: Vec<u8>,
    counters: Counters,
}

impl PoolState {
    /// Resolve `addr` to an allocated block.
    fn live(&self, addr: Addr) -> Result<(BlockId, BlockInfo), PoolError> {
        let id = self
            .chain
            .find(addr)
            .ok_or(PoolError::InvalidAddress { addr })?;
        let info = self.chain.info(id);
        if info.is_free {
            return Err(PoolError::NotAllocated { addr });
        }
        Ok((id, info))
    }

    fn out_of_memory(&mut self, requested: usize) -> PoolError {
        self.counters.failed_allocations += 1;
        let largest_free = self.chain.largest_free();
        warn!(requested, largest_free, "pool exhausted");
        PoolError::OutOfMemory {
            requested,
            largest_free,
        }
    }

    fn stats(&self, capacity: usize) -> PoolStats {
        let mut stats = PoolStats {
            capacity,
            allocations: self.counters.allocations,
            frees: self.counters.frees,
            failed_allocations: self.counters.failed_allocations,
            resizes_in_place: self.counters.resizes_in_place,
            resizes_moved: self.counters.resizes_moved,
            ..PoolStats::default()
        };
        for block in self.chain.snapshot() {
            stats.block_count += 1;
            if block.is_free {
                stats.free_bytes += block.size;
                stats.free_block_count += 1;
                stats.largest_free = stats.largest_free.max(block.size);
            } else {
                stats.used_bytes += block.size;
                stats.live_allocations += 1;
            }
        }
        stats
    }
}

/// Fixed-capacity arena with first-fit allocate/free/resize.
///
/// Constructing the allocator reserves the whole arena; it never grows.
/// Handles are plain values, so independent pools can coexist, and the
/// allocator is `Send + Sync` for sharing behind an `Arc`.
///
/// Lifecycle misuse is ruled out by construction: there is no allocator
/// before [`new`](Self::new), and [`deinit`](Self::deinit) consumes it.
pub struct PoolAllocator {
    state: Mutex<PoolState>,
    capacity: usize,
}

// Compile-time assertion: PoolAllocator must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<PoolAllocator>();
};

impl PoolAllocator {
    /// Reserve an arena and cover it with a single free block.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        debug!(capacity = config.capacity, "pool initialised");
        Ok(Self {
            state: Mutex::new(PoolState {
                chain: BlockChain::new(config.capacity),
                arena: vec![0; config.capacity],
                counters: Counters::default(),
            }),
            capacity: config.capacity,
        })
    }

    /// Shorthand for `PoolAllocator::new(PoolConfig::new(capacity))`.
    pub fn with_capacity(capacity: usize) -> Result<Self, PoolError> {
        Self::new(PoolConfig::new(capacity))
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // Chain mutations never panic midway, so a poisoned guard still
        // protects a consistent chain.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arena size in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Allocate `size` bytes from the first free block large enough.
    ///
    /// A larger block is split so the allocation is exactly `size` bytes
    /// and the tail stays free. Exhaustion is reported, never retried.
    pub fn allocate(&self, size: usize) -> Result<Addr, PoolError> {
        if size == 0 {
            return Err(PoolError::ZeroSize);
        }
        let mut state = self.lock();
        let Some(id) = state.chain.first_fit(size, None) else {
            return Err(state.out_of_memory(size));
        };
        let addr = state.chain.claim(id, size);
        state.counters.allocations += 1;
        debug!(addr = addr.0, size, "allocated");
        Ok(addr)
    }

    /// Return an allocation to the pool.
    ///
    /// `None` is accepted and ignored. Every adjacent pair of free blocks
    /// in the chain is merged afterwards, not just the neighbours of the
    /// released block.
    ///
    /// Addresses carry no generation, so a double free is only reported as
    /// [`PoolError::DoubleFree`] while the address has not been handed out
    /// again. Once `allocate` reuses it, a stale `free` releases the new
    /// owner's block.
    pub fn free(&self, addr: impl Into<Option<Addr>>) -> Result<(), PoolError> {
        let Some(addr) = addr.into() else {
            return Ok(());
        };
        let mut state = self.lock();
        let Some(id) = state.chain.find(addr) else {
            error!(addr = addr.0, "free of unknown address");
            return Err(PoolError::InvalidAddress { addr });
        };
        let info = state.chain.info(id);
        if info.is_free {
            error!(addr = addr.0, "double free");
            return Err(PoolError::DoubleFree { addr });
        }
        state.chain.release(id);
        state.counters.frees += 1;
        debug!(addr = addr.0, size = info.size, "freed");
        Ok(())
    }

    /// Change the size of an allocation, moving it if it cannot grow.
    ///
    /// Shrinking (or a same-size request) happens in place and returns
    /// the tail to the pool. Growing claims the first other free block
    /// that fits, copies the old contents, and frees the old block. On
    /// failure the original allocation and its bytes are untouched.
    pub fn resize(&self, addr: Addr, new_size: usize) -> Result<Addr, PoolError> {
        if new_size == 0 {
            return Err(PoolError::ZeroSize);
        }
        let mut state = self.lock();
        let (id, old) = state.live(addr)?;

        if old.size >= new_size {
            state.chain.shrink(id, new_size);
            state.counters.resizes_in_place += 1;
            debug!(addr = addr.0, old_size = old.size, new_size, "resized in place");
            return Ok(addr);
        }

        let Some(target) = state.chain.first_fit(new_size, Some(id)) else {
            return Err(state.out_of_memory(new_size));
        };
        let new_addr = state.chain.claim(target, new_size);
        let len = old.size.min(new_size);
        state.arena.copy_within(addr.0..addr.0 + len, new_addr.0);
        state.chain.release(id);
        state.counters.resizes_moved += 1;
        debug!(
            from = addr.0,
            to = new_addr.0,
            old_size = old.size,
            new_size,
            "resized by moving"
        );
        Ok(new_addr)
    }

    /// Copy `bytes` into the allocation starting at `addr`.
    pub fn write(&self, addr: Addr, bytes: &[u8]) -> Result<(), PoolError> {
        let mut state = self.lock();
        let (_, info) = state.live(addr)?;
        if bytes.len() > info.size {
            return Err(PoolError::OutOfBounds {
                addr,
                len: bytes.len(),
                size: info.size,
            });
        }
        state.arena[addr.0..addr.0 + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Fill `buf` from the start of the allocation at `addr`.
    pub fn read_into(&self, addr: Addr, buf: &mut [u8]) -> Result<(), PoolError> {
        let state = self.lock();
        let (_, info) = state.live(addr)?;
        if buf.len() > info.size {
            return Err(PoolError::OutOfBounds {
                addr,
                len: buf.len(),
                size: info.size,
            });
        }
        buf.copy_from_slice(&state.arena[addr.0..addr.0 + buf.len()]);
        Ok(())
    }

    /// Read the first `len` bytes of the allocation at `addr`.
    pub fn read(&self, addr: Addr, len: usize) -> Result<Vec<u8>, PoolError> {
        let mut buf = vec![0; len];
        self.read_into(addr, &mut buf)?;
        Ok(buf)
    }

    /// Size in bytes of the live allocation at `addr`.
    pub fn size_of(&self, addr: Addr) -> Result<usize, PoolError> {
        let state = self.lock();
        state.live(addr).map(|(_, info)| info.size)
    }

    /// Ordered snapshot of every block in the chain.
    pub fn blocks(&self) -> Vec<BlockInfo> {
        self.lock().chain.snapshot()
    }

    /// Check that the chain tiles the arena with no gaps, overlaps,
    /// zero-length blocks or unmerged free neighbours.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        self.lock().chain.verify()
    }

    /// Current occupancy and cumulative counters.
    pub fn stats(&self) -> PoolStats {
        self.lock().stats(self.capacity)
    }

    /// Tear the pool down, releasing the arena and all block metadata.
    ///
    /// Returns the final statistics. Outstanding allocations are not an
    /// error, but they are logged since their addresses die with the pool.
    pub fn deinit(self) -> PoolStats {
        let capacity = self.capacity;
        let state = self
            .state
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);
        let stats = state.stats(capacity);
        if stats.live_allocations > 0 {
            warn!(
                live_allocations = stats.live_allocations,
                used_bytes = stats.used_bytes,
                "pool deinitialised with live allocations"
            );
        }
        debug!(capacity, "pool released");
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(capacity: usize) -> PoolAllocator {
        PoolAllocator::with_capacity(capacity).unwrap()
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            PoolAllocator::with_capacity(0),
            Err(PoolError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn first_fit_reuse_scenario() {
        let p = pool(64);
        let a = p.allocate(16).unwrap();
        let b = p.allocate(16).unwrap();
        assert_ne!(a, b);
        assert_eq!(b.offset(), a.offset() + 16);

        p.free(a).unwrap();
        let c = p.allocate(8).unwrap();
        assert_eq!(c, a, "first fit reuses the freed head block");

        p.free(b).unwrap();
        // 8 bytes remain live at the head, so 64 contiguous bytes cannot exist.
        assert!(matches!(
            p.allocate(64),
            Err(PoolError::OutOfMemory {
                requested: 64,
                largest_free: 56
            })
        ));

        p.free(c).unwrap();
        let whole = p.allocate(64).unwrap();
        assert_eq!(whole.offset(), 0);
        assert!(p.verify().is_ok());
    }

    #[test]
    fn zero_size_allocation_rejected() {
        let p = pool(64);
        assert_eq!(p.allocate(0), Err(PoolError::ZeroSize));
        assert_eq!(p.blocks().len(), 1);
    }

    #[test]
    fn exhaustion_leaves_state_unchanged() {
        let p = pool(32);
        p.allocate(24).unwrap();
        let before = p.blocks();
        assert!(matches!(p.allocate(16), Err(PoolError::OutOfMemory { .. })));
        assert_eq!(p.blocks(), before);
        assert_eq!(p.stats().failed_allocations, 1);
    }

    #[test]
    fn free_none_is_noop() {
        let p = pool(32);
        assert!(p.free(None).is_ok());
        assert_eq!(p.stats().frees, 0);
    }

    #[test]
    fn free_unknown_address_is_error() {
        let p = pool(32);
        p.allocate(16).unwrap();
        let err = p.free(Addr(4)).unwrap_err();
        assert_eq!(err, PoolError::InvalidAddress { addr: Addr(4) });
    }

    #[test]
    fn double_free_is_error() {
        let p = pool(64);
        let a = p.allocate(16).unwrap();
        let _b = p.allocate(16).unwrap();
        p.free(a).unwrap();
        assert_eq!(p.free(a), Err(PoolError::DoubleFree { addr: a }));
        assert!(p.verify().is_ok());
    }

    #[test]
    fn double_free_is_undetectable_once_address_is_reused() {
        let p = pool(64);
        let a = p.allocate(16).unwrap();
        let _b = p.allocate(16).unwrap();
        p.free(a).unwrap();
        let reused = p.allocate(16).unwrap();
        assert_eq!(reused, a);
        // The stale free lands on the new owner.
        assert_eq!(p.free(a), Ok(()));
        assert_eq!(
            p.size_of(reused),
            Err(PoolError::NotAllocated { addr: reused })
        );
        assert!(p.verify().is_ok());
    }

    #[test]
    fn write_then_read_back() {
        let p = pool(64);
        let a = p.allocate(8).unwrap();
        p.write(a, &[1, 2, 3, 4]).unwrap();
        assert_eq!(p.read(a, 4).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn write_past_end_is_rejected() {
        let p = pool(64);
        let a = p.allocate(4).unwrap();
        assert_eq!(
            p.write(a, &[0; 5]),
            Err(PoolError::OutOfBounds {
                addr: a,
                len: 5,
                size: 4
            })
        );
    }

    #[test]
    fn read_of_freed_block_is_rejected() {
        let p = pool(64);
        let a = p.allocate(8).unwrap();
        let _b = p.allocate(8).unwrap();
        p.free(a).unwrap();
        assert_eq!(p.read(a, 1), Err(PoolError::NotAllocated { addr: a }));
    }

    #[test]
    fn shrink_in_place_returns_tail() {
        let p = pool(64);
        let a = p.allocate(32).unwrap();
        let r = p.resize(a, 8).unwrap();
        assert_eq!(r, a);
        assert_eq!(p.size_of(a).unwrap(), 8);
        assert_eq!(p.stats().free_bytes, 56);
        assert_eq!(p.stats().resizes_in_place, 1);
        assert!(p.verify().is_ok());
    }

    #[test]
    fn same_size_resize_is_noop() {
        let p = pool(64);
        let a = p.allocate(16).unwrap();
        let before = p.blocks();
        assert_eq!(p.resize(a, 16).unwrap(), a);
        assert_eq!(p.blocks(), before);
    }

    #[test]
    fn grow_moves_and_copies() {
        let p = pool(64);
        let a = p.allocate(8).unwrap();
        let _pin = p.allocate(8).unwrap();
        p.write(a, b"abcdefgh").unwrap();

        let moved = p.resize(a, 24).unwrap();
        assert_ne!(moved, a);
        assert_eq!(p.read(moved, 8).unwrap(), b"abcdefgh");
        assert_eq!(p.size_of(moved).unwrap(), 24);
        // Old block was released.
        assert!(matches!(p.size_of(a), Err(PoolError::NotAllocated { .. })));
        assert_eq!(p.stats().resizes_moved, 1);
        assert!(p.verify().is_ok());
    }

    #[test]
    fn failed_grow_leaves_original_intact() {
        let p = pool(32);
        let a = p.allocate(16).unwrap();
        let _b = p.allocate(16).unwrap();
        p.write(a, &[7; 16]).unwrap();
        let before = p.blocks();

        assert!(matches!(
            p.resize(a, 24),
            Err(PoolError::OutOfMemory { requested: 24, .. })
        ));
        assert_eq!(p.blocks(), before);
        assert_eq!(p.read(a, 16).unwrap(), vec![7; 16]);
    }

    #[test]
    fn resize_does_not_consider_own_block() {
        // The block being resized is allocated, so it can never be its own
        // move target even though it sits first in the chain.
        let p = pool(48);
        let a = p.allocate(16).unwrap();
        let b = p.resize(a, 32).unwrap();
        assert_eq!(b.offset(), 16);
        assert!(p.blocks()[0].is_free);
    }

    #[test]
    fn resize_of_unknown_address_is_error() {
        let p = pool(32);
        assert_eq!(
            p.resize(Addr(3), 8),
            Err(PoolError::InvalidAddress { addr: Addr(3) })
        );
    }

    #[test]
    fn stats_track_occupancy() {
        let p = pool(100);
        let a = p.allocate(10).unwrap();
        p.allocate(20).unwrap();
        p.free(a).unwrap();
        let s = p.stats();
        assert_eq!(s.capacity, 100);
        assert_eq!(s.used_bytes, 20);
        assert_eq!(s.free_bytes, 80);
        assert_eq!(s.live_allocations, 1);
        assert_eq!(s.free_block_count, 2);
        assert_eq!(s.largest_free, 70);
        assert_eq!(s.allocations, 2);
        assert_eq!(s.frees, 1);
    }

    #[test]
    fn deinit_reports_live_allocations() {
        let p = pool(64);
        p.allocate(16).unwrap();
        let stats = p.deinit();
        assert_eq!(stats.live_allocations, 1);
        assert_eq!(stats.used_bytes, 16);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Clone, Debug)]
        enum Op {
            Alloc(usize),
            Free(usize),
            Resize(usize, usize),
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (1usize..48).prop_map(Op::Alloc),
                (0usize..16).prop_map(Op::Free),
                ((0usize..16), (1usize..64)).prop_map(|(i, n)| Op::Resize(i, n)),
            ]
        }

        proptest! {
            #[test]
            fn invariants_hold_after_every_operation(
                ops in proptest::collection::vec(op(), 1..80),
            ) {
                let p = PoolAllocator::with_capacity(256).unwrap();
                let mut live: Vec<Addr> = Vec::new();
                for op in ops {
                    match op {
                        Op::Alloc(n) => {
                            if let Ok(a) = p.allocate(n) {
                                live.push(a);
                            }
                        }
                        Op::Free(i) if !live.is_empty() => {
                            let a = live.swap_remove(i % live.len());
                            prop_assert!(p.free(a).is_ok());
                        }
                        Op::Resize(i, n) if !live.is_empty() => {
                            let idx = i % live.len();
                            if let Ok(a) = p.resize(live[idx], n) {
                                live[idx] = a;
                            }
                        }
                        _ => {}
                    }
                    prop_assert_eq!(p.verify(), Ok(()));
                }
            }

            #[test]
            fn live_allocations_never_overlap(
                sizes in proptest::collection::vec(1usize..40, 1..40),
                frees in proptest::collection::vec(any::<bool>(), 40),
            ) {
                let p = PoolAllocator::with_capacity(512).unwrap();
                let mut live: Vec<(usize, usize)> = Vec::new();
                for (i, &n) in sizes.iter().enumerate() {
                    if let Ok(a) = p.allocate(n) {
                        live.push((a.offset(), n));
                    }
                    if frees[i] && live.len() > 1 {
                        let (off, _) = live.remove(0);
                        p.free(Addr(off)).unwrap();
                    }
                }
                live.sort_unstable();
                for pair in live.windows(2) {
                    prop_assert!(pair[0].0 + pair[0].1 <= pair[1].0);
                }
            }

            #[test]
            fn resize_preserves_prefix(
                old in 1usize..32,
                new in 1usize..64,
                fill in any::<u8>(),
            ) {
                let p = PoolAllocator::with_capacity(128).unwrap();
                let a = p.allocate(old).unwrap();
                let _pin = p.allocate(1).unwrap();
                let bytes: Vec<u8> = (0..old).map(|i| fill.wrapping_add(i as u8)).collect();
                p.write(a, &bytes).unwrap();
                let b = p.resize(a, new).unwrap();
                let keep = old.min(new);
                prop_assert_eq!(p.read(b, keep).unwrap(), bytes[..keep].to_vec());
            }
        }
    }
}
