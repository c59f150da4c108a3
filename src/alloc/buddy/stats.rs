//! Free-list snapshots, byte accounting and a structural self-check.

use super::freelist::Link;
use super::header::{BlockHeader, Tag};
use super::size_class::block_size;
use super::BuddyPool;
use serde::{Deserialize, Serialize};

/// A free block as seen on its list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeBlock {
    /// Arena-relative offset of the block header.
    pub offset: usize,
    /// Size class of the block.
    pub kval: usize,
}

/// Every free list of a pool, each in head-to-tail order.
///
/// Two snapshots compare equal exactly when the pools would serve the same
/// sequence of requests identically.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSnapshot {
    /// Arena class.
    pub kval_m: usize,
    /// `avail[k]` for every class `k` in `0..=kval_m`.
    pub avail: Vec<Vec<FreeBlock>>,
}

impl PoolSnapshot {
    /// Serializes the snapshot as JSON.
    ///
    /// # Errors
    /// Propagates `serde_json` failures.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Total bytes held in free blocks.
    pub fn free_bytes(&self) -> usize {
        self.avail
            .iter()
            .flatten()
            .map(|b| block_size(b.kval))
            .sum()
    }
}

/// Byte accounting for a pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Arena bytes.
    pub capacity: usize,
    /// Bytes in free blocks.
    pub free_bytes: usize,
    /// Bytes in reserved blocks, headers included.
    pub reserved_bytes: usize,
    /// Number of free blocks across all classes.
    pub free_blocks: usize,
    /// Number of reserved blocks.
    pub reserved_blocks: usize,
}

impl PoolStats {
    /// Bytes of reserved blocks lost to headers.
    pub fn header_overhead(&self) -> usize {
        self.reserved_blocks * crate::allocator::constants::HEADER_SIZE
    }
}

impl BuddyPool {
    /// Captures every free list.
    pub fn snapshot(&self) -> PoolSnapshot {
        let Some(region) = self.region.as_ref() else {
            return PoolSnapshot::default();
        };
        let mem = region.as_slice();
        let avail = (0..self.avail.classes())
            .map(|k| {
                self.avail
                    .iter(mem, k)
                    .map(|offset| FreeBlock { offset, kval: k })
                    .collect()
            })
            .collect();
        PoolSnapshot {
            kval_m: self.kval_m,
            avail,
        }
    }

    /// Current byte accounting.
    pub fn stats(&self) -> PoolStats {
        let snapshot = self.snapshot();
        PoolStats {
            capacity: self.capacity(),
            free_bytes: snapshot.free_bytes(),
            reserved_bytes: self.reserved_bytes,
            free_blocks: snapshot.avail.iter().map(Vec::len).sum(),
            reserved_blocks: self.reserved_blocks,
        }
    }

    /// Walks every free list checking the structural invariants:
    ///
    /// - each listed block is `Available` with the list's class, aligned to
    ///   its size and inside the arena;
    /// - back-links mirror forward links and every list returns to its sentinel;
    /// - no listed block has a free buddy of the same class;
    /// - free plus reserved bytes equal the capacity.
    ///
    /// # Errors
    /// A description of the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        let Some(region) = self.region.as_ref() else {
            return Ok(());
        };
        let mem = region.as_slice();
        let capacity = region.len();
        let max_nodes = capacity >> crate::allocator::constants::SMALLEST_K;

        let mut free_bytes = 0usize;
        for k in 0..self.avail.classes() {
            let mut prev = Link::Head(k);
            let mut seen = 0usize;
            for off in self.avail.iter(mem, k) {
                seen += 1;
                if seen > max_nodes {
                    return Err(format!("avail[{k}] does not return to its sentinel"));
                }
                if off >= capacity || off % block_size(k) != 0 {
                    return Err(format!("avail[{k}] holds misplaced block {off:#x}"));
                }
                let h = BlockHeader::read(mem, off);
                if h.tag() != Tag::Available || h.kval() != k {
                    return Err(format!(
                        "block {off:#x} on avail[{k}] has tag {:?} class {}",
                        h.tag(),
                        h.kval()
                    ));
                }
                if Link::decode(h.prev) != prev {
                    return Err(format!("block {off:#x} on avail[{k}] has a stale back-link"));
                }
                if k < self.kval_m {
                    let buddy = super::buddy_of(off, k);
                    let bh = BlockHeader::read(mem, buddy);
                    if bh.tag() == Tag::Available && bh.kval() == k {
                        return Err(format!("free buddies {off:#x} and {buddy:#x} were not merged"));
                    }
                }
                prev = Link::Block(off);
                free_bytes += block_size(k);
            }
            if self.avail.iter_rev(mem, k).take(max_nodes + 1).count() != seen {
                return Err(format!("avail[{k}] back-links disagree with forward links"));
            }
        }

        if free_bytes + self.reserved_bytes != capacity {
            return Err(format!(
                "free {free_bytes} + reserved {} != capacity {capacity}",
                self.reserved_bytes
            ));
        }
        Ok(())
    }
}
