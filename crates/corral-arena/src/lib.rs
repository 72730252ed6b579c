//! Fixed-capacity pool allocator for Corral.
//!
//! Reserves one contiguous byte arena up front and hands out ranges of it
//! with a first-fit policy. Block metadata lives outside the arena in an
//! index-linked table, so every address the caller passes back is checked
//! against the chain rather than trusted.
//!
//! # Architecture
//!
//! ```text
//! PoolAllocator (Mutex-guarded handle)
//! └── PoolState
//!     ├── BlockChain   Vec<Block> linked by index, tiles [0, capacity)
//!     ├── arena        Vec<u8>, fixed at construction
//!     └── counters     cumulative allocate/free/resize activity
//! ```
//!
//! # Invariants
//!
//! After every operation the chain partitions the arena with no gaps or
//! overlaps, contains no zero-length block, and has no two neighbouring
//! free blocks. [`PoolAllocator::verify`] checks all three.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod addr;
mod chain;
pub mod config;
pub mod error;
pub mod pool;
pub mod stats;

// Public re-exports for the primary API surface.
pub use addr::{Addr, BlockInfo};
pub use config::PoolConfig;
pub use error::{InvariantViolation, PoolError};
pub use pool::PoolAllocator;
pub use stats::PoolStats;
