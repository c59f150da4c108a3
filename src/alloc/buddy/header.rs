//! In-place block header.
//!
//! Every block, free or reserved, starts with a [`BlockHeader`]. Headers are
//! never allocated separately: they are read from and written to the arena
//! bytes at the block's offset through `zerocopy` views.
//!
//! ```text
//!   offset o                          o + HEADER_SIZE                o + 2^kval
//!   ┌──────┬──────┬──────┬──────┬─────┬───────────────────────────────┐
//!   │ tag  │ kval │ pad  │ next │prev │ payload (reserved blocks)     │
//!   │ u16  │ u16  │ u32  │ u64  │ u64 │                               │
//!   └──────┴──────┴──────┴──────┴─────┴───────────────────────────────┘
//! ```

use zerocopy::{AsBytes, FromBytes, FromZeroes};

/// State of a block. Fresh (zeroed) memory reads as `Unused`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u16)]
pub enum Tag {
    Unused = 0,
    Available = 1,
    Reserved = 2,
}

impl Tag {
    #[inline]
    fn from_raw(raw: u16) -> Tag {
        match raw {
            1 => Tag::Available,
            2 => Tag::Reserved,
            _ => Tag::Unused,
        }
    }
}

/// Raw on-arena header layout. `next`/`prev` are encoded [`Link`](super::freelist::Link)s
/// and only meaningful while the block is `Available`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, FromZeroes, FromBytes, AsBytes)]
#[repr(C)]
pub struct BlockHeader {
    tag: u16,
    kval: u16,
    _pad: u32,
    pub(crate) next: u64,
    pub(crate) prev: u64,
}

impl BlockHeader {
    pub(crate) fn new(tag: Tag, kval: usize) -> Self {
        Self {
            tag: tag as u16,
            kval: kval as u16,
            _pad: 0,
            next: 0,
            prev: 0,
        }
    }

    #[inline]
    pub fn tag(&self) -> Tag {
        Tag::from_raw(self.tag)
    }

    #[inline]
    pub fn kval(&self) -> usize {
        usize::from(self.kval)
    }

    #[inline]
    pub(crate) fn set_tag(&mut self, tag: Tag) {
        self.tag = tag as u16;
    }

    #[cfg(test)]
    #[inline]
    pub(crate) fn set_kval(&mut self, kval: usize) {
        self.kval = kval as u16;
    }

    /// Reads the header stored at `offset`.
    ///
    /// # Panics
    /// If fewer than `HEADER_SIZE` bytes remain after `offset`.
    #[inline]
    pub(crate) fn read(mem: &[u8], offset: usize) -> Self {
        match BlockHeader::read_from_prefix(&mem[offset..]) {
            Some(h) => h,
            None => panic!("block header at {offset:#x} runs past the arena"),
        }
    }

    /// Writes this header at `offset`.
    #[inline]
    pub(crate) fn write(&self, mem: &mut [u8], offset: usize) {
        if self.write_to_prefix(&mut mem[offset..]).is_none() {
            panic!("block header at {offset:#x} runs past the arena");
        }
    }

    /// Read-modify-write helper.
    #[inline]
    pub(crate) fn update(mem: &mut [u8], offset: usize, f: impl FnOnce(&mut BlockHeader)) {
        let mut header = BlockHeader::read(mem, offset);
        f(&mut header);
        header.write(mem, offset);
    }
}

const _: () = {
    assert!(core::mem::size_of::<BlockHeader>() == 24);
};
