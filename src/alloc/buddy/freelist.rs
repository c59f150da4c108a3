//! Per-class circular doubly-linked free lists.
//!
//! The lists are intrusive: a free block's header doubles as its list node,
//! and links are arena offsets rather than addresses. Each class has a
//! sentinel head kept outside the arena; an empty list is a sentinel whose
//! `next` and `prev` both point back at itself.

use super::header::{BlockHeader, Tag};

// Block offsets stay below 2^MAX_K, so the top bit is free to mark sentinels.
const HEAD_BIT: u64 = 1 << 63;

/// A position in a free list: either a class sentinel or a block offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Link {
    Head(usize),
    Block(usize),
}

impl Link {
    #[inline]
    pub(crate) fn encode(self) -> u64 {
        match self {
            Link::Head(k) => HEAD_BIT | k as u64,
            Link::Block(off) => off as u64,
        }
    }

    #[inline]
    pub(crate) fn decode(raw: u64) -> Link {
        if raw & HEAD_BIT != 0 {
            Link::Head((raw & !HEAD_BIT) as usize)
        } else {
            Link::Block(raw as usize)
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Sentinel {
    next: Link,
    prev: Link,
}

/// The sentinel array `avail[0..=kval_m]`.
pub(crate) struct FreeLists {
    heads: Vec<Sentinel>,
}

impl FreeLists {
    /// Creates `kval_m + 1` empty lists.
    pub(crate) fn new(kval_m: usize) -> Self {
        let heads = (0..=kval_m)
            .map(|k| Sentinel {
                next: Link::Head(k),
                prev: Link::Head(k),
            })
            .collect();
        Self { heads }
    }

    /// Number of classes tracked (`kval_m + 1`).
    #[inline]
    pub(crate) fn classes(&self) -> usize {
        self.heads.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self, k: usize) -> bool {
        self.heads[k].next == Link::Head(k)
    }

    /// Returns the first block of list `k` without unlinking it.
    #[inline]
    pub(crate) fn first(&self, k: usize) -> Option<usize> {
        match self.heads[k].next {
            Link::Block(off) => Some(off),
            Link::Head(_) => None,
        }
    }

    fn next_of(&self, mem: &[u8], at: Link) -> Link {
        match at {
            Link::Head(k) => self.heads[k].next,
            Link::Block(off) => Link::decode(BlockHeader::read(mem, off).next),
        }
    }

    fn set_next(&mut self, mem: &mut [u8], at: Link, to: Link) {
        match at {
            Link::Head(k) => self.heads[k].next = to,
            Link::Block(off) => BlockHeader::update(mem, off, |h| h.next = to.encode()),
        }
    }

    fn set_prev(&mut self, mem: &mut [u8], at: Link, to: Link) {
        match at {
            Link::Head(k) => self.heads[k].prev = to,
            Link::Block(off) => BlockHeader::update(mem, off, |h| h.prev = to.encode()),
        }
    }

    /// Marks the block at `off` as `Available` with class `k` and links it
    /// at the head of list `k`.
    pub(crate) fn push_front(&mut self, mem: &mut [u8], k: usize, off: usize) {
        let head = Link::Head(k);
        let old_first = self.heads[k].next;

        let mut header = BlockHeader::new(Tag::Available, k);
        header.next = old_first.encode();
        header.prev = head.encode();
        header.write(mem, off);

        self.set_prev(mem, old_first, Link::Block(off));
        self.heads[k].next = Link::Block(off);
    }

    /// Unlinks the block at `off` from whichever list holds it and clears
    /// its links. The tag and class are left for the caller to rewrite.
    pub(crate) fn remove(&mut self, mem: &mut [u8], off: usize) {
        let header = BlockHeader::read(mem, off);
        let next = Link::decode(header.next);
        let prev = Link::decode(header.prev);

        self.set_next(mem, prev, next);
        self.set_prev(mem, next, prev);

        BlockHeader::update(mem, off, |h| {
            h.next = 0;
            h.prev = 0;
        });
    }

    /// Unlinks and returns the head block of list `k`.
    pub(crate) fn pop_front(&mut self, mem: &mut [u8], k: usize) -> Option<usize> {
        let off = self.first(k)?;
        self.remove(mem, off);
        Some(off)
    }

    /// Walks list `k` from head to tail.
    pub(crate) fn iter<'a>(&'a self, mem: &'a [u8], k: usize) -> Iter<'a> {
        Iter {
            lists: self,
            mem,
            cursor: self.heads[k].next,
        }
    }

    /// Walks list `k` from tail to head.
    pub(crate) fn iter_rev<'a>(&'a self, mem: &'a [u8], k: usize) -> RevIter<'a> {
        RevIter {
            mem,
            cursor: self.heads[k].prev,
        }
    }
}

pub(crate) struct Iter<'a> {
    lists: &'a FreeLists,
    mem: &'a [u8],
    cursor: Link,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self.cursor {
            Link::Block(off) => {
                self.cursor = self.lists.next_of(self.mem, self.cursor);
                Some(off)
            }
            Link::Head(_) => None,
        }
    }
}

pub(crate) struct RevIter<'a> {
    mem: &'a [u8],
    cursor: Link,
}

impl Iterator for RevIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        match self.cursor {
            Link::Block(off) => {
                self.cursor = Link::decode(BlockHeader::read(self.mem, off).prev);
                Some(off)
            }
            Link::Head(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(lists: &FreeLists, mem: &[u8], k: usize) -> Vec<usize> {
        lists.iter(mem, k).collect()
    }

    #[test]
    fn test_new_lists_are_self_referencing() {
        let lists = FreeLists::new(10);
        assert_eq!(lists.classes(), 11);
        for k in 0..=10 {
            assert!(lists.is_empty(k));
            assert_eq!(lists.heads[k].next, Link::Head(k));
            assert_eq!(lists.heads[k].prev, Link::Head(k));
        }
    }

    #[test]
    fn test_link_encoding() {
        for link in [Link::Head(0), Link::Head(48), Link::Block(0), Link::Block(1 << 40)] {
            assert_eq!(Link::decode(link.encode()), link);
        }
    }

    #[test]
    fn test_push_is_lifo_and_remove_relinks() {
        let mut mem = vec![0u8; 1024];
        let mut lists = FreeLists::new(10);

        lists.push_front(&mut mem, 6, 0);
        lists.push_front(&mut mem, 6, 128);
        lists.push_front(&mut mem, 6, 256);
        assert_eq!(collect(&lists, &mem, 6), vec![256, 128, 0]);
        assert_eq!(lists.iter_rev(&mem, 6).collect::<Vec<_>>(), vec![0, 128, 256]);

        let h = BlockHeader::read(&mem, 128);
        assert_eq!(h.tag(), Tag::Available);
        assert_eq!(h.kval(), 6);

        // Middle removal
        lists.remove(&mut mem, 128);
        assert_eq!(collect(&lists, &mem, 6), vec![256, 0]);
        assert_eq!(lists.iter_rev(&mem, 6).collect::<Vec<_>>(), vec![0, 256]);

        assert_eq!(lists.pop_front(&mut mem, 6), Some(256));
        assert_eq!(lists.pop_front(&mut mem, 6), Some(0));
        assert_eq!(lists.pop_front(&mut mem, 6), None);
        assert!(lists.is_empty(6));
        assert_eq!(lists.heads[6].prev, Link::Head(6));
    }

    #[test]
    fn test_lists_are_independent_per_class() {
        let mut mem = vec![0u8; 1024];
        let mut lists = FreeLists::new(10);

        lists.push_front(&mut mem, 6, 0);
        lists.push_front(&mut mem, 7, 128);
        lists.push_front(&mut mem, 8, 256);

        assert_eq!(collect(&lists, &mem, 6), vec![0]);
        assert_eq!(collect(&lists, &mem, 7), vec![128]);
        assert_eq!(collect(&lists, &mem, 8), vec![256]);

        lists.remove(&mut mem, 128);
        assert!(lists.is_empty(7));
        assert_eq!(lists.first(6), Some(0));
        assert_eq!(lists.first(8), Some(256));
    }
}
