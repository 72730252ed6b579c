//! Corral: a fixed-capacity pool allocator and a linked list that lives
//! entirely inside it.
//!
//! This is the facade crate that re-exports the public API of the Corral
//! sub-crates. Adding `corral` as a single dependency is enough for most
//! users.
//!
//! # Quick start
//!
//! ```rust
//! use corral::prelude::*;
//!
//! // A raw pool: first-fit allocation over a 64-byte arena.
//! let pool = PoolAllocator::with_capacity(64).unwrap();
//! let a = pool.allocate(16).unwrap();
//! let b = pool.allocate(16).unwrap();
//! assert_eq!(b.offset(), a.offset() + 16);
//! pool.free(a).unwrap();
//! assert_eq!(pool.allocate(8).unwrap(), a);
//!
//! // A list whose nodes are carved out of its own pool.
//! let list = ManagedList::with_capacity(1024).unwrap();
//! for v in [5, 7, 9] {
//!     list.insert_tail(v).unwrap();
//! }
//! list.delete(7).unwrap();
//! assert_eq!(list.display(), "[5, 9]");
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`arena`] | `corral-arena` | `PoolAllocator`, addresses, stats, invariant checks |
//! | [`list`] | `corral-list` | `ManagedList`, `NodeRef`, node layout |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Pool allocator (`corral-arena`).
pub use corral_arena as arena;

/// Arena-backed linked list (`corral-list`).
pub use corral_list as list;

/// Common imports for typical Corral usage.
///
/// ```rust
/// use corral::prelude::*;
/// ```
pub mod prelude {
    pub use corral_arena::{Addr, BlockInfo, PoolAllocator, PoolConfig, PoolStats};
    pub use corral_arena::{InvariantViolation, PoolError};
    pub use corral_list::{ListError, ManagedList, NodeRef, NODE_SIZE};
}
