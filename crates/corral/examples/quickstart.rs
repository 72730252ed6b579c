//! Corral quickstart: a pool and a list, end to end.
//!
//! Demonstrates:
//!   1. Creating a pool and watching first-fit reuse and coalescing
//!   2. Growing an allocation with `resize` and reading its bytes back
//!   3. Building a `ManagedList` and editing it in place
//!   4. Sharing the list across threads
//!   5. Tearing everything down with `cleanup`
//!
//! Run with:
//!   RUST_LOG=debug cargo run --example quickstart

use std::sync::Arc;
use std::thread;

use corral::prelude::*;

// ─── Sizes ──────────────────────────────────────────────────────

const POOL_BYTES: usize = 64;
const LIST_NODES: usize = 256;

fn print_blocks(pool: &PoolAllocator) {
    for block in pool.blocks() {
        println!("    {block}");
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // ─── 1. First-fit reuse and coalescing ──────────────────────

    println!("pool of {POOL_BYTES} bytes");
    let pool = PoolAllocator::with_capacity(POOL_BYTES)?;
    let a = pool.allocate(16)?;
    let b = pool.allocate(16)?;
    println!("  allocate(16) -> {a}, allocate(16) -> {b}");
    print_blocks(&pool);

    pool.free(a)?;
    let c = pool.allocate(8)?;
    println!("  free({a}); allocate(8) -> {c} (first fit)");
    print_blocks(&pool);

    pool.free(b)?;
    println!("  free({b}); free space coalesced:");
    print_blocks(&pool);

    match pool.allocate(POOL_BYTES) {
        Ok(addr) => println!("  allocate({POOL_BYTES}) -> {addr}"),
        Err(e) => println!("  allocate({POOL_BYTES}) failed: {e}"),
    }

    // ─── 2. Resize keeps the prefix ─────────────────────────────

    pool.write(c, b"corral!!")?;
    let grown = pool.resize(c, 32)?;
    let bytes = pool.read(grown, 8)?;
    println!(
        "  resize({c}, 32) -> {grown}, contents {:?}",
        String::from_utf8_lossy(&bytes)
    );
    pool.free(grown)?;
    let stats = pool.deinit();
    println!("  pool released: {stats:?}");

    // ─── 3. An arena-backed list ────────────────────────────────

    let list = ManagedList::with_capacity(LIST_NODES * NODE_SIZE)?;
    for v in [5, 7, 9] {
        list.insert_tail(v)?;
    }
    println!("\nlist: {list}");
    list.delete(7)?;
    println!("delete(7): {list} (count {})", list.count());
    let head = list.head().ok_or(ListError::Empty)?;
    list.insert_before(head, 3)?;
    println!("insert_before(head, 3): {list}");
    let five = list.search(5);
    let nine = list.search(9);
    println!("range 5..=9: {}", list.display_range(five, nine));

    // ─── 4. Shared across threads ───────────────────────────────

    let list = Arc::new(list);
    let workers: Vec<_> = (0..4u16)
        .map(|t| {
            let list = Arc::clone(&list);
            thread::spawn(move || {
                for i in 0..10 {
                    list.insert_tail(100 * (t + 1) + i).map(|_| ())?;
                }
                Ok::<(), ListError>(())
            })
        })
        .collect();
    for w in workers {
        w.join().map_err(|_| "worker panicked")??;
    }
    println!("after 4 writers: {} nodes", list.count());

    // ─── 5. Cleanup ─────────────────────────────────────────────

    let list = Arc::try_unwrap(list).map_err(|_| "list still shared")?;
    let stats = list.cleanup();
    println!(
        "list cleaned up: {} frees, {} live allocations left",
        stats.frees, stats.live_allocations
    );
    Ok(())
}
