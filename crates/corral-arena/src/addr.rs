//! Arena addresses and block descriptors.
//!
//! An [`Addr`] is a byte offset into the pool's arena. It carries no
//! provenance: the allocator validates every address it is handed against
//! the live block chain, so a stale or foreign address is reported as an
//! error instead of being dereferenced.

use std::fmt;

/// Byte offset of an allocation within the arena.
///
/// The "null" address of a pointer-based design is modelled as
/// `Option<Addr>`; every `Addr` value names a concrete offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Addr(pub(crate) usize);

impl Addr {
    /// Byte offset from the start of the arena.
    pub fn offset(self) -> usize {
        self.0
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<usize> for Addr {
    fn from(v: usize) -> Self {
        Self(v)
    }
}

/// Index of a metadata record in the block table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockId(pub(crate) usize);

/// Read-only view of one block in the chain, in arena order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Start of the block's range.
    pub addr: Addr,
    /// Length of the range in bytes.
    pub size: usize,
    /// Whether the range is available for allocation.
    pub is_free: bool,
}

impl BlockInfo {
    /// One past the last byte of the block's range.
    pub fn end(&self) -> usize {
        self.addr.0 + self.size
    }
}

impl fmt::Display for BlockInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_free { "free" } else { "used" };
        write!(f, "Block({}..{:#x}, {} bytes, {state})", self.addr, self.end(), self.size)
    }
}
