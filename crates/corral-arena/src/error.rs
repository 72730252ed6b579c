//! Pool error types.

use std::error::Error;
use std::fmt;

use crate::addr::Addr;

/// Errors returned by [`PoolAllocator`](crate::PoolAllocator) operations.
///
/// None of these leave the pool in a modified state: a failed call is a
/// no-op as far as the block chain and arena contents are concerned.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// No free block is large enough for the request.
    OutOfMemory {
        /// Number of bytes requested.
        requested: usize,
        /// Size of the largest free block at the time of the request.
        largest_free: usize,
    },
    /// A zero-byte allocation or resize was requested.
    ZeroSize,
    /// No block starts at the given address (foreign or interior pointer).
    InvalidAddress {
        /// The rejected address.
        addr: Addr,
    },
    /// `free` was called on a block that is already free.
    DoubleFree {
        /// The address freed twice.
        addr: Addr,
    },
    /// The block at the given address exists but is not allocated.
    NotAllocated {
        /// The address of the free block.
        addr: Addr,
    },
    /// A read or write would run past the end of the allocation.
    OutOfBounds {
        /// Start of the allocation.
        addr: Addr,
        /// Number of bytes the caller tried to access.
        len: usize,
        /// Size of the allocation.
        size: usize,
    },
    /// The pool configuration failed validation.
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory {
                requested,
                largest_free,
            } => {
                write!(
                    f,
                    "out of memory: requested {requested} bytes, largest free block {largest_free} bytes"
                )
            }
            Self::ZeroSize => write!(f, "zero-sized allocation requested"),
            Self::InvalidAddress { addr } => write!(f, "no block starts at address {addr}"),
            Self::DoubleFree { addr } => write!(f, "double free of address {addr}"),
            Self::NotAllocated { addr } => write!(f, "block at address {addr} is not allocated"),
            Self::OutOfBounds { addr, len, size } => {
                write!(
                    f,
                    "access of {len} bytes exceeds allocation at {addr} ({size} bytes)"
                )
            }
            Self::InvalidConfig { reason } => write!(f, "invalid pool config: {reason}"),
        }
    }
}

impl Error for PoolError {}

/// A broken structural invariant reported by
/// [`PoolAllocator::verify`](crate::PoolAllocator::verify).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A block starts after the end of its predecessor.
    Gap {
        /// Where the next block should have started.
        expected: usize,
        /// Where it actually starts.
        found: usize,
    },
    /// A block starts before the end of its predecessor.
    Overlap {
        /// Where the next block should have started.
        expected: usize,
        /// Where it actually starts.
        found: usize,
    },
    /// A block with zero length is present in the chain.
    ZeroSizeBlock {
        /// Start of the degenerate block.
        addr: Addr,
    },
    /// Two neighbouring blocks are both free.
    AdjacentFree {
        /// Start of the first of the two free blocks.
        addr: Addr,
    },
    /// The chain does not end exactly at the arena capacity.
    CoverageMismatch {
        /// Bytes covered by the chain.
        covered: usize,
        /// Arena capacity.
        capacity: usize,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gap { expected, found } => {
                write!(f, "gap in block chain: expected {expected:#x}, found {found:#x}")
            }
            Self::Overlap { expected, found } => {
                write!(f, "overlapping blocks: expected {expected:#x}, found {found:#x}")
            }
            Self::ZeroSizeBlock { addr } => write!(f, "zero-sized block at {addr}"),
            Self::AdjacentFree { addr } => {
                write!(f, "uncoalesced free blocks starting at {addr}")
            }
            Self::CoverageMismatch { covered, capacity } => {
                write!(f, "chain covers {covered} bytes of a {capacity}-byte arena")
            }
        }
    }
}

impl Error for InvariantViolation {}
