//! Stress test: concurrent allocate/free against one shared pool.
//!
//! Several threads start together behind a `Barrier` and hammer the same
//! `PoolAllocator` with same-sized allocate/free pairs, then with seeded
//! mixed workloads. After every phase a second barrier lets the main
//! thread check the chain invariants and byte accounting while the
//! workers are parked.

use std::sync::{Arc, Barrier};
use std::thread;

use corral_arena::{Addr, PoolAllocator, PoolError};
use corral_test_utils::{assert_pool_consistent, churn, replay, ChurnProfile};

const THREADS: usize = 8;
const ROUNDS: usize = 2_000;
const BLOCK: usize = 32;

#[test]
fn same_size_churn_preserves_tiling() {
    // Room for every thread to hold 4 blocks at once.
    let pool = Arc::new(PoolAllocator::with_capacity(THREADS * 4 * BLOCK).unwrap());
    let start = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pool = Arc::clone(&pool);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut held: Vec<Addr> = Vec::with_capacity(4);
                for round in 0..ROUNDS {
                    if held.len() < 4 {
                        let addr = pool.allocate(BLOCK).expect("capacity covers all threads");
                        // Stamp the block so overlapping handouts would show up.
                        pool.write(addr, &[t as u8; BLOCK]).unwrap();
                        held.push(addr);
                    }
                    if round % 3 == 0 {
                        let addr = held.remove(0);
                        assert_eq!(pool.read(addr, BLOCK).unwrap(), vec![t as u8; BLOCK]);
                        pool.free(addr).unwrap();
                    }
                }
                for addr in held {
                    assert_eq!(pool.read(addr, BLOCK).unwrap(), vec![t as u8; BLOCK]);
                    pool.free(addr).unwrap();
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    assert_pool_consistent(&pool);
    let stats = pool.stats();
    assert_eq!(stats.live_allocations, 0);
    assert_eq!(stats.block_count, 1, "everything coalesces back to one block");
    assert_eq!(stats.allocations, stats.frees);
}

#[test]
fn mixed_workloads_checked_at_barrier() {
    let pool = Arc::new(PoolAllocator::with_capacity(16 * 1024).unwrap());
    let barrier = Arc::new(Barrier::new(THREADS + 1));
    let phases = 5;

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let pool = Arc::clone(&pool);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let mut live = Vec::new();
                let profile = ChurnProfile::default();
                for phase in 0..phases {
                    let ops = churn((t * 1_000 + phase) as u64, 400, &profile);
                    replay(&pool, &ops, &mut live);
                    // Phase done; wait while main checks, then resume.
                    barrier.wait();
                    barrier.wait();
                }
                for addr in live {
                    pool.free(addr).unwrap();
                }
            })
        })
        .collect();

    for _ in 0..phases {
        barrier.wait();
        assert_pool_consistent(&pool);
        barrier.wait();
    }

    for h in handles {
        h.join().unwrap();
    }
    assert_pool_consistent(&pool);
    assert_eq!(pool.stats().live_allocations, 0);
}

#[test]
fn exhaustion_under_contention_is_reported_not_fatal() {
    // Far too small for all threads at once.
    let pool = Arc::new(PoolAllocator::with_capacity(4 * BLOCK).unwrap());
    let start = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let pool = Arc::clone(&pool);
            let start = Arc::clone(&start);
            thread::spawn(move || {
                start.wait();
                let mut exhausted = 0usize;
                for _ in 0..500 {
                    match pool.allocate(BLOCK) {
                        Ok(addr) => pool.free(addr).unwrap(),
                        Err(PoolError::OutOfMemory { .. }) => exhausted += 1,
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
                exhausted
            })
        })
        .collect();

    let exhausted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_pool_consistent(&pool);
    assert_eq!(pool.stats().failed_allocations, exhausted as u64);
    assert_eq!(pool.stats().live_allocations, 0);
}
