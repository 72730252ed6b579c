//! Node layout inside the arena.
//!
//! Each node occupies one [`NODE_SIZE`]-byte pool allocation:
//!
//! ```text
//! 0..2   data        u16 little-endian
//! 2..4   zero padding
//! 4..8   generation  u32 little-endian, unique per node allocation
//! 8..16  next        u64 little-endian arena offset, u64::MAX = end of list
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use corral_arena::Addr;

/// Bytes requested from the pool per node.
pub const NODE_SIZE: usize = 16;

const NO_NEXT: u64 = u64::MAX;

/// Counter for [`Generation`] allocation, shared by every list.
static GENERATION_COUNTER: AtomicU32 = AtomicU32::new(1);

/// Stamp written into a node when its storage is allocated.
///
/// Node storage is recycled by the pool, so an address alone cannot tell a
/// deleted node from the node that later reuses its slot. Every node gets
/// a fresh generation from a process-wide counter, and a [`NodeRef`] only
/// resolves when both address and generation match. The counter wraps
/// after 2^32 allocations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct Generation(pub(crate) u32);

impl Generation {
    /// A generation no other node allocated in this process carries.
    pub(crate) fn next() -> Self {
        Self(GENERATION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Decoded contents of one node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Node {
    pub(crate) data: u16,
    pub(crate) generation: Generation,
    pub(crate) next: Option<Addr>,
}

impl Node {
    pub(crate) fn encode(&self) -> [u8; NODE_SIZE] {
        let mut buf = [0u8; NODE_SIZE];
        buf[0..2].copy_from_slice(&self.data.to_le_bytes());
        buf[4..8].copy_from_slice(&self.generation.0.to_le_bytes());
        let next = self.next.map_or(NO_NEXT, |a| a.offset() as u64);
        buf[8..16].copy_from_slice(&next.to_le_bytes());
        buf
    }

    pub(crate) fn decode(buf: &[u8; NODE_SIZE]) -> Self {
        let data = u16::from_le_bytes([buf[0], buf[1]]);
        let generation = Generation(u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]));
        let mut next = [0u8; 8];
        next.copy_from_slice(&buf[8..16]);
        let next = match u64::from_le_bytes(next) {
            NO_NEXT => None,
            offset => Some(Addr::from(offset as usize)),
        };
        Self {
            data,
            generation,
            next,
        }
    }
}

/// Handle to a node in a [`ManagedList`](crate::ManagedList).
///
/// Only the list hands these out. Every operation that accepts one checks
/// that it still names a live member of the list, matching both the
/// storage address and the generation stamped at allocation. A reference
/// from another list, or to a deleted node whose slot has since been
/// reused, is rejected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeRef {
    pub(crate) addr: Addr,
    pub(crate) generation: Generation,
}

impl NodeRef {
    pub(crate) fn new(addr: Addr, node: &Node) -> Self {
        Self {
            addr,
            generation: node.generation,
        }
    }

    /// Whether this reference names `node`, stored at `addr`.
    pub(crate) fn names(&self, addr: Addr, node: &Node) -> bool {
        self.addr == addr && self.generation == node.generation
    }

    /// Arena address of the node's storage.
    pub fn addr(self) -> Addr {
        self.addr
    }

    /// Allocation stamp distinguishing this node from later occupants of
    /// the same storage.
    pub fn generation(self) -> u32 {
        self.generation.0
    }
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node@{}#{}", self.addr, self.generation.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_layout() {
        let node = Node {
            data: 0x1234,
            generation: Generation(0xaabb_ccdd),
            next: Some(Addr::from(0x40)),
        };
        let buf = node.encode();
        assert_eq!(&buf[0..2], &[0x34, 0x12]);
        assert_eq!(&buf[2..4], &[0; 2]);
        assert_eq!(&buf[4..8], &[0xdd, 0xcc, 0xbb, 0xaa]);
        assert_eq!(&buf[8..16], &0x40u64.to_le_bytes());
        assert_eq!(Node::decode(&buf), node);
    }

    #[test]
    fn end_of_list_marker() {
        let node = Node {
            data: 9,
            generation: Generation::next(),
            next: None,
        };
        let buf = node.encode();
        assert_eq!(&buf[8..16], &[0xff; 8]);
        assert_eq!(Node::decode(&buf).next, None);
    }

    #[test]
    fn zeroed_bytes_decode_to_offset_zero_link() {
        // A fresh arena is zeroed; offset 0 is a valid address, not "none".
        let node = Node::decode(&[0; NODE_SIZE]);
        assert_eq!(node.next, Some(Addr::from(0)));
    }

    #[test]
    fn generations_are_unique() {
        let a = Generation::next();
        let b = Generation::next();
        assert_ne!(a, b);
    }

    #[test]
    fn ref_names_only_matching_generation() {
        let addr = Addr::from(0x20);
        let old = Node {
            data: 1,
            generation: Generation::next(),
            next: None,
        };
        let reused = Node {
            generation: Generation::next(),
            ..old
        };
        let r = NodeRef::new(addr, &old);
        assert!(r.names(addr, &old));
        assert!(!r.names(addr, &reused));
        assert!(!r.names(Addr::from(0x30), &old));
    }
}
