//! Arena-backed linked list for Corral.
//!
//! [`ManagedList`] is a singly linked list of `u16` payloads. Its nodes are
//! stored exclusively in a [`corral_arena::PoolAllocator`] owned by the
//! list, encoded in the fixed layout described in [`node`].
//!
//! Mutations are serialised by the list's write guard; reads share its
//! read guard. The pool's guard nests inside the list's and is never held
//! across a call back into the list.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod list;
pub mod node;

pub use error::ListError;
pub use list::ManagedList;
pub use node::{NodeRef, NODE_SIZE};
