//! The block chain: metadata that tiles the arena.
//!
//! `BlockChain` is the unsynchronised core of the pool. It knows nothing
//! about the arena's bytes, only about which ranges are free and which are
//! allocated. Blocks live in a `Vec` and link to their successor by index,
//! so a bad address turns into a failed lookup instead of a wild pointer.
//! Metadata slots released by coalescing are recycled through a free-slot
//! list.

use crate::addr::{Addr, BlockId, BlockInfo};
use crate::error::InvariantViolation;

/// One metadata record. `offset..offset + size` is the block's range.
#[derive(Clone, Copy, Debug)]
struct Block {
    offset: usize,
    size: usize,
    is_free: bool,
    next: Option<BlockId>,
}

/// Ordered chain of blocks partitioning `[0, capacity)`.
pub(crate) struct BlockChain {
    /// All metadata slots, live and recycled.
    blocks: Vec<Block>,
    /// Indices of slots no longer linked into the chain.
    free_slots: Vec<usize>,
    /// First block; always starts at offset 0.
    head: BlockId,
    capacity: usize,
}

impl BlockChain {
    /// A chain holding one free block that covers the whole arena.
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            blocks: vec![Block {
                offset: 0,
                size: capacity,
                is_free: true,
                next: None,
            }],
            free_slots: Vec::new(),
            head: BlockId(0),
            capacity,
        }
    }

    /// Walk the chain from the head.
    fn iter(&self) -> ChainIter<'_> {
        ChainIter {
            chain: self,
            cur: Some(self.head),
        }
    }

    /// Public view of the block at `id`.
    pub(crate) fn info(&self, id: BlockId) -> BlockInfo {
        let b = &self.blocks[id.0];
        BlockInfo {
            addr: Addr(b.offset),
            size: b.size,
            is_free: b.is_free,
        }
    }

    /// Linear scan for the block starting at `addr`.
    pub(crate) fn find(&self, addr: Addr) -> Option<BlockId> {
        self.iter()
            .find(|(_, b)| b.offset == addr.0)
            .map(|(id, _)| id)
    }

    /// First free block with at least `size` bytes, skipping `exclude`.
    pub(crate) fn first_fit(&self, size: usize, exclude: Option<BlockId>) -> Option<BlockId> {
        self.iter()
            .find(|&(id, b)| b.is_free && b.size >= size && Some(id) != exclude)
            .map(|(id, _)| id)
    }

    /// Split `id` down to `size` bytes and mark it allocated.
    ///
    /// The caller guarantees the block is free and at least `size` long.
    pub(crate) fn claim(&mut self, id: BlockId, size: usize) -> Addr {
        debug_assert!(self.blocks[id.0].is_free);
        self.split(id, size);
        let block = &mut self.blocks[id.0];
        block.is_free = false;
        Addr(block.offset)
    }

    /// Shrink an allocated block to `new_size`, returning any remainder to
    /// the free pool.
    pub(crate) fn shrink(&mut self, id: BlockId, new_size: usize) {
        self.split(id, new_size);
        self.coalesce();
    }

    /// Mark `id` free and merge every run of adjacent free blocks.
    pub(crate) fn release(&mut self, id: BlockId) {
        self.blocks[id.0].is_free = true;
        self.coalesce();
    }

    /// Cut `id` to exactly `size` bytes; the tail becomes a new free
    /// successor. A zero-length tail never produces a block.
    fn split(&mut self, id: BlockId, size: usize) {
        let block = self.blocks[id.0];
        debug_assert!(size > 0 && size <= block.size);
        if block.size == size {
            return;
        }
        let remainder = Block {
            offset: block.offset + size,
            size: block.size - size,
            is_free: true,
            next: block.next,
        };
        let rid = self.insert_slot(remainder);
        let block = &mut self.blocks[id.0];
        block.size = size;
        block.next = Some(rid);
        tracing::trace!(
            offset = block.offset,
            size,
            remainder = remainder.size,
            "split block"
        );
    }

    /// Full forward pass merging every adjacent pair of free blocks.
    ///
    /// Stays on a block after a merge so runs longer than two collapse in
    /// one pass. Returns the number of merges performed.
    pub(crate) fn coalesce(&mut self) -> usize {
        let mut merges = 0;
        let mut cur = Some(self.head);
        while let Some(id) = cur {
            let block = self.blocks[id.0];
            match block.next {
                Some(nid) if block.is_free && self.blocks[nid.0].is_free => {
                    let absorbed = self.blocks[nid.0];
                    let block = &mut self.blocks[id.0];
                    block.size += absorbed.size;
                    block.next = absorbed.next;
                    self.free_slots.push(nid.0);
                    merges += 1;
                }
                next => cur = next,
            }
        }
        if merges > 0 {
            tracing::trace!(merges, "coalesced free blocks");
        }
        merges
    }

    fn insert_slot(&mut self, block: Block) -> BlockId {
        if let Some(idx) = self.free_slots.pop() {
            self.blocks[idx] = block;
            BlockId(idx)
        } else {
            self.blocks.push(block);
            BlockId(self.blocks.len() - 1)
        }
    }

    /// Size of the largest free block, or 0 if none.
    pub(crate) fn largest_free(&self) -> usize {
        self.iter()
            .filter(|(_, b)| b.is_free)
            .map(|(_, b)| b.size)
            .max()
            .unwrap_or(0)
    }

    /// Snapshot of the chain in arena order.
    pub(crate) fn snapshot(&self) -> Vec<BlockInfo> {
        self.iter().map(|(id, _)| self.info(id)).collect()
    }

    /// Number of blocks currently linked into the chain.
    pub(crate) fn len(&self) -> usize {
        self.blocks.len() - self.free_slots.len()
    }

    /// Check tiling, block sizes and coalescing.
    pub(crate) fn verify(&self) -> Result<(), InvariantViolation> {
        let mut expected = 0usize;
        let mut prev_free: Option<usize> = None;
        let mut steps = 0usize;
        let mut cur = Some(self.head);
        while let Some(id) = cur {
            // A cycle would otherwise spin forever.
            steps += 1;
            if steps > self.blocks.len() {
                return Err(InvariantViolation::CoverageMismatch {
                    covered: expected,
                    capacity: self.capacity,
                });
            }
            let b = &self.blocks[id.0];
            if b.size == 0 {
                return Err(InvariantViolation::ZeroSizeBlock { addr: Addr(b.offset) });
            }
            if b.offset > expected {
                return Err(InvariantViolation::Gap {
                    expected,
                    found: b.offset,
                });
            }
            if b.offset < expected {
                return Err(InvariantViolation::Overlap {
                    expected,
                    found: b.offset,
                });
            }
            if b.is_free {
                if let Some(prev) = prev_free {
                    return Err(InvariantViolation::AdjacentFree { addr: Addr(prev) });
                }
                prev_free = Some(b.offset);
            } else {
                prev_free = None;
            }
            expected = b.offset + b.size;
            cur = b.next;
        }
        if expected != self.capacity {
            return Err(InvariantViolation::CoverageMismatch {
                covered: expected,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

struct ChainIter<'a> {
    chain: &'a BlockChain,
    cur: Option<BlockId>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = (BlockId, &'a Block);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cur?;
        let block = &self.chain.blocks[id.0];
        self.cur = block.next;
        Some((id, block))
    }
}
