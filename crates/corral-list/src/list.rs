//! Arena-backed singly linked list.
//!
//! [`ManagedList`] stores every node in its own [`PoolAllocator`]; nothing
//! about the list's contents lives on the general heap. Links are arena
//! offsets, decoded on each hop through the pool's bounds-checked reads.
//!
//! # Locking
//!
//! The list guard is an `RwLock` over the head/tail links. Mutators hold
//! the write side for their whole duration; `search`, `count`, `display`
//! and friends hold the read side, so a reader can never observe a node
//! that a concurrent `delete` is releasing. The pool's own guard is always
//! taken second (list outer, pool inner), and the pool never calls back
//! into the list.

use std::fmt;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use corral_arena::{Addr, InvariantViolation, PoolAllocator, PoolConfig, PoolStats};
use tracing::{debug, error};

use crate::error::ListError;
use crate::node::{Generation, Node, NodeRef, NODE_SIZE};

/// Ends of the chain. The tail is cached so appends are O(1).
#[derive(Default)]
struct Links {
    head: Option<Addr>,
    tail: Option<Addr>,
}

/// Walks nodes from `cur`, decoding each one from the pool.
struct Walk<'a> {
    pool: &'a PoolAllocator,
    cur: Option<Addr>,
}

impl<'a> Walk<'a> {
    fn new(pool: &'a PoolAllocator, start: Option<Addr>) -> Self {
        Self { pool, cur: start }
    }
}

impl Iterator for Walk<'_> {
    type Item = (Addr, Node);

    fn next(&mut self) -> Option<Self::Item> {
        let addr = self.cur?;
        match load(self.pool, addr) {
            Ok(node) => {
                self.cur = node.next;
                Some((addr, node))
            }
            Err(e) => {
                // Only reachable if the chain itself is corrupt.
                error!(addr = addr.offset(), error = %e, "unreadable list node");
                self.cur = None;
                None
            }
        }
    }
}

fn load(pool: &PoolAllocator, addr: Addr) -> Result<Node, ListError> {
    let mut buf = [0u8; NODE_SIZE];
    pool.read_into(addr, &mut buf)?;
    Ok(Node::decode(&buf))
}

fn render(values: &[u16]) -> String {
    let items: Vec<String> = values.iter().map(u16::to_string).collect();
    format!("[{}]", items.join(", "))
}

/// Thread-safe singly linked list of `u16` payloads whose nodes live in a
/// dedicated fixed-capacity pool.
pub struct ManagedList {
    links: RwLock<Links>,
    pool: PoolAllocator,
}

// Compile-time assertion: ManagedList must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<ManagedList>();
};

impl ManagedList {
    /// Create an empty list backed by a fresh pool.
    pub fn new(config: PoolConfig) -> Result<Self, ListError> {
        let pool = PoolAllocator::new(config)?;
        debug!(capacity = pool.capacity(), "list initialised");
        Ok(Self {
            links: RwLock::new(Links::default()),
            pool,
        })
    }

    /// Shorthand for `ManagedList::new(PoolConfig::new(capacity))`.
    pub fn with_capacity(capacity: usize) -> Result<Self, ListError> {
        Self::new(PoolConfig::new(capacity))
    }

    fn read_links(&self) -> RwLockReadGuard<'_, Links> {
        self.links.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_links(&self) -> RwLockWriteGuard<'_, Links> {
        self.links.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn walk(&self, start: Option<Addr>) -> Walk<'_> {
        Walk::new(&self.pool, start)
    }

    fn store(&self, addr: Addr, node: Node) -> Result<(), ListError> {
        self.pool.write(addr, &node.encode())?;
        Ok(())
    }

    /// Allocate and write a node under a fresh generation. Nothing is
    /// leaked if the write fails.
    fn alloc_node(&self, data: u16, next: Option<Addr>) -> Result<NodeRef, ListError> {
        let addr = self.pool.allocate(NODE_SIZE)?;
        let node = Node {
            data,
            generation: Generation::next(),
            next,
        };
        if let Err(e) = self.store(addr, node) {
            self.release(addr);
            return Err(e);
        }
        Ok(NodeRef::new(addr, &node))
    }

    /// Find `node` in the chain from `head`, along with its predecessor.
    fn locate(
        &self,
        head: Option<Addr>,
        node: NodeRef,
    ) -> Result<(Option<(Addr, Node)>, Node), ListError> {
        let mut prev = None;
        for (addr, n) in self.walk(head) {
            if node.names(addr, &n) {
                return Ok((prev, n));
            }
            prev = Some((addr, n));
        }
        Err(ListError::UnknownNode { node })
    }

    /// Point `at`'s link to the freshly allocated `new`; on failure `new`
    /// goes back to the pool.
    fn link(&self, at: Addr, node: Node, new: Addr) -> Result<(), ListError> {
        let node = Node {
            next: Some(new),
            ..node
        };
        if let Err(e) = self.store(at, node) {
            self.release(new);
            return Err(e);
        }
        Ok(())
    }

    fn release(&self, addr: Addr) {
        if let Err(e) = self.pool.free(addr) {
            error!(addr = addr.offset(), error = %e, "failed to release node storage");
        }
    }

    /// Append `data` at the end of the list.
    pub fn insert_tail(&self, data: u16) -> Result<NodeRef, ListError> {
        let mut links = self.write_links();
        let new = self.alloc_node(data, None)?;
        let addr = new.addr;
        match links.tail {
            Some(tail) => {
                let tail_node = match load(&self.pool, tail) {
                    Ok(n) => n,
                    Err(e) => {
                        self.release(addr);
                        return Err(e);
                    }
                };
                self.link(tail, tail_node, addr)?;
            }
            None => links.head = Some(addr),
        }
        links.tail = Some(addr);
        debug!(data, addr = addr.offset(), "inserted at tail");
        Ok(new)
    }

    /// Insert `data` directly after `node`.
    ///
    /// `node` must be a live member of this list; it is located before
    /// anything is allocated, so a rejected reference changes nothing.
    pub fn insert_after(&self, node: NodeRef, data: u16) -> Result<NodeRef, ListError> {
        let mut links = self.write_links();
        let (_, at) = self.locate(links.head, node)?;
        let new = self.alloc_node(data, at.next)?;
        self.link(node.addr, at, new.addr)?;
        if links.tail == Some(node.addr) {
            links.tail = Some(new.addr);
        }
        debug!(
            data,
            after = node.addr.offset(),
            addr = new.addr.offset(),
            "inserted after"
        );
        Ok(new)
    }

    /// Insert `data` directly before `next`.
    ///
    /// Fails with [`ListError::Empty`] on an empty list and with
    /// [`ListError::UnknownNode`] if `next` is not in the chain; in both
    /// cases the list is unchanged.
    pub fn insert_before(&self, next: NodeRef, data: u16) -> Result<NodeRef, ListError> {
        let mut links = self.write_links();
        if links.head.is_none() {
            return Err(ListError::Empty);
        }
        let (pred, _) = self.locate(links.head, next)?;
        let new = self.alloc_node(data, Some(next.addr))?;
        match pred {
            Some((pred_addr, pred_node)) => self.link(pred_addr, pred_node, new.addr)?,
            None => links.head = Some(new.addr),
        }
        debug!(
            data,
            before = next.addr.offset(),
            addr = new.addr.offset(),
            "inserted before"
        );
        Ok(new)
    }

    /// Unlink the first node carrying `data` and return its storage to
    /// the pool.
    pub fn delete(&self, data: u16) -> Result<(), ListError> {
        let mut links = self.write_links();
        let mut prev: Option<(Addr, Node)> = None;
        for (addr, node) in self.walk(links.head) {
            if node.data != data {
                prev = Some((addr, node));
                continue;
            }
            match prev {
                Some((prev_addr, prev_node)) => self.store(
                    prev_addr,
                    Node {
                        next: node.next,
                        ..prev_node
                    },
                )?,
                None => links.head = node.next,
            }
            if links.tail == Some(addr) {
                links.tail = prev.map(|(prev_addr, _)| prev_addr);
            }
            self.pool.free(addr)?;
            debug!(data, addr = addr.offset(), "deleted");
            return Ok(());
        }
        Err(ListError::NotFound { data })
    }

    /// First node carrying `data`, if any.
    pub fn search(&self, data: u16) -> Option<NodeRef> {
        let links = self.read_links();
        self.walk(links.head)
            .find(|(_, n)| n.data == data)
            .map(|(addr, n)| NodeRef::new(addr, &n))
    }

    /// Payload of `node`.
    pub fn data(&self, node: NodeRef) -> Result<u16, ListError> {
        let links = self.read_links();
        self.locate(links.head, node).map(|(_, n)| n.data)
    }

    /// All payloads, head to tail.
    pub fn values(&self) -> Vec<u16> {
        let links = self.read_links();
        self.walk(links.head).map(|(_, n)| n.data).collect()
    }

    /// Payloads from `start` through `end` inclusive.
    ///
    /// `None` leaves that side unbounded. A `start` that is not in the
    /// list, or an `end` that does not occur at or after `start`, yields
    /// an empty sequence.
    pub fn values_range(&self, start: Option<NodeRef>, end: Option<NodeRef>) -> Vec<u16> {
        let links = self.read_links();
        let mut out = Vec::new();
        let mut started = start.is_none();
        for (addr, node) in self.walk(links.head) {
            if !started {
                if start.is_some_and(|s| s.names(addr, &node)) {
                    started = true;
                } else {
                    continue;
                }
            }
            out.push(node.data);
            if end.is_some_and(|e| e.names(addr, &node)) {
                return out;
            }
        }
        if end.is_some() {
            out.clear();
        }
        out
    }

    /// Render the list as `[a, b, c]`; `[]` when empty.
    pub fn display(&self) -> String {
        render(&self.values())
    }

    /// Render the `start..=end` range as `[a, b, c]`, following the bounds
    /// rules of [`values_range`](Self::values_range).
    pub fn display_range(&self, start: Option<NodeRef>, end: Option<NodeRef>) -> String {
        render(&self.values_range(start, end))
    }

    /// Number of nodes, by traversal.
    pub fn count(&self) -> usize {
        let links = self.read_links();
        self.walk(links.head).count()
    }

    /// First node, if any.
    pub fn head(&self) -> Option<NodeRef> {
        let links = self.read_links();
        self.end_ref(links.head)
    }

    /// Last node, if any.
    pub fn tail(&self) -> Option<NodeRef> {
        let links = self.read_links();
        self.end_ref(links.tail)
    }

    fn end_ref(&self, addr: Option<Addr>) -> Option<NodeRef> {
        let addr = addr?;
        match load(&self.pool, addr) {
            Ok(node) => Some(NodeRef::new(addr, &node)),
            Err(e) => {
                error!(addr = addr.offset(), error = %e, "unreadable list end");
                None
            }
        }
    }

    /// Whether the list has no nodes.
    pub fn is_empty(&self) -> bool {
        self.read_links().head.is_none()
    }

    /// Occupancy of the backing pool.
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Structural check of the backing pool.
    pub fn verify_pool(&self) -> Result<(), InvariantViolation> {
        self.pool.verify()
    }

    /// Release every node, then tear down the pool.
    ///
    /// Consumes the list, so no operation can run concurrently or
    /// afterwards. Returns the pool's final statistics.
    pub fn cleanup(self) -> PoolStats {
        let ManagedList { links, pool } = self;
        let links = links.into_inner().unwrap_or_else(PoisonError::into_inner);
        let nodes: Vec<Addr> = Walk::new(&pool, links.head).map(|(addr, _)| addr).collect();
        for &addr in &nodes {
            if let Err(e) = pool.free(addr) {
                error!(addr = addr.offset(), error = %e, "failed to release node storage");
            }
        }
        debug!(released = nodes.len(), "list cleaned up");
        pool.deinit()
    }
}

impl fmt::Display for ManagedList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}
