//! Read-only diagnostic walk over the split tree.
//!
//! The walk starts at the whole arena and halves it at every level. A node
//! that is currently on its class's free list is reported as an `Available`
//! leaf. A node at [`SMALLEST_K`] that is not free is reserved. When both
//! halves of a node turn out fully reserved, the node is reported once as a
//! reserved region of its own size; otherwise each half reports separately.
//!
//! The walk only reads free-list membership, never block headers, so it does
//! not depend on the contents of reserved payloads.

use super::BuddyPool;
use crate::allocator::constants::SMALLEST_K;
use core::fmt::Write as _;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Whether a reported region is free or reserved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeafState {
    /// On a free list.
    Available,
    /// Handed out to a caller (possibly several adjacent blocks).
    Reserved,
}

/// One region reported by [`BuddyPool::leaves`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Leaf {
    /// Split depth below the root; the root is depth 0.
    pub depth: usize,
    /// Arena-relative offset.
    pub offset: usize,
    /// Size class; the region spans `2^kval` bytes.
    pub kval: usize,
    /// Free or reserved.
    pub state: LeafState,
}

impl Leaf {
    /// Bytes spanned by the region.
    pub fn size(&self) -> usize {
        1 << self.kval
    }
}

/// Result of visiting one subtree.
enum Visit {
    /// The whole subtree is reserved and not yet reported.
    Reserved,
    /// The subtree reported its leaves.
    Reported,
}

struct Walker<'a> {
    free: &'a HashSet<(usize, usize)>,
    leaves: Vec<Leaf>,
}

impl Walker<'_> {
    fn visit(&mut self, offset: usize, k: usize, depth: usize) -> Visit {
        if self.free.contains(&(offset, k)) {
            self.leaves.push(Leaf {
                depth,
                offset,
                kval: k,
                state: LeafState::Available,
            });
            return Visit::Reported;
        }
        if k <= SMALLEST_K {
            return Visit::Reserved;
        }

        let half = 1 << (k - 1);
        // A reserved left half is only reported once the right half is known,
        // so it goes in at `mark` to keep address order.
        let mark = self.leaves.len();
        let left = self.visit(offset, k - 1, depth + 1);
        let right = self.visit(offset + half, k - 1, depth + 1);

        match (left, right) {
            (Visit::Reserved, Visit::Reserved) => Visit::Reserved,
            (left, right) => {
                if let Visit::Reserved = right {
                    self.leaves.push(reserved(depth + 1, offset + half, k - 1));
                }
                if let Visit::Reserved = left {
                    self.leaves.insert(mark, reserved(depth + 1, offset, k - 1));
                }
                Visit::Reported
            }
        }
    }
}

fn reserved(depth: usize, offset: usize, kval: usize) -> Leaf {
    Leaf {
        depth,
        offset,
        kval,
        state: LeafState::Reserved,
    }
}

impl BuddyPool {
    /// Reports the free/reserved structure of the arena in address order.
    ///
    /// Empty for a destroyed pool. Never mutates the pool.
    pub fn leaves(&self) -> Vec<Leaf> {
        let Some(region) = self.region.as_ref() else {
            return Vec::new();
        };
        let mem = region.as_slice();

        let free: HashSet<(usize, usize)> = (0..self.avail.classes())
            .flat_map(|k| self.avail.iter(mem, k).map(move |off| (off, k)))
            .collect();

        let mut walker = Walker {
            free: &free,
            leaves: Vec::new(),
        };
        if let Visit::Reserved = walker.visit(0, self.kval_m, 0) {
            walker.leaves.push(reserved(0, 0, self.kval_m));
        }
        walker.leaves
    }

    /// Human-readable tree of `AVAIL`/`RESERVED` leaves. Indentation encodes
    /// split depth.
    ///
    /// ```text
    /// buddy pool: kval_m=20 capacity=1048576
    ///     RESERVED 2^18 (262144 bytes) @ 0x0
    ///     AVAIL    2^18 (262144 bytes) @ 0x40000
    ///   AVAIL    2^19 (524288 bytes) @ 0x80000
    /// ```
    pub fn describe(&self) -> String {
        if !self.is_initialized() {
            return String::from("buddy pool: uninitialized\n");
        }

        let mut out = String::new();
        let _ = writeln!(
            out,
            "buddy pool: kval_m={} capacity={}",
            self.kval_m,
            self.capacity()
        );
        for leaf in self.leaves() {
            let label = match leaf.state {
                LeafState::Available => "AVAIL",
                LeafState::Reserved => "RESERVED",
            };
            let _ = writeln!(
                out,
                "{:indent$}{:<8} 2^{} ({} bytes) @ {:#x}",
                "",
                label,
                leaf.kval,
                leaf.size(),
                leaf.offset,
                indent = leaf.depth * 2,
            );
        }
        out
    }
}
