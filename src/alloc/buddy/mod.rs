//! Buddy-system pool.
//!
//! A [`BuddyPool`] owns one OS region of `2^kval_m` bytes and hands out
//! power-of-two blocks carved from it. Allocation takes the head of the
//! first non-empty free list whose class is large enough and splits it down
//! to the requested class, pushing each split-off upper half onto its own
//! list. Release walks the other way, merging a block with its buddy for as
//! long as the buddy is free and of the same class.
//!
//! ```text
//!   acquire(8) on a fresh 2^20 pool:
//!
//!   ┌──────────────────────────── 2^20 ────────────────────────────┐
//!   ├─────────────── 2^19 ──────────────┬────────── 2^19 ──────────┤ avail[19]
//!   ├──────── 2^18 ────────┬── 2^18 ────┤                          │ avail[18]
//!   ...                                                               ...
//!   ├ 2^6 ┬ 2^6 ┤                                                     avail[6]
//!   │ RSV │ AV  │
//! ```
//!
//! The pool is single-threaded. It is `Send`, so a caller that needs shared
//! access can put it behind a `Mutex` and hold the lock for every call.

pub(crate) mod freelist;
pub(crate) mod header;
pub mod size_class;
pub mod stats;
pub mod visitor;


use crate::alloc::error::AllocError;
use crate::allocator::constants::{DEFAULT_K, HEADER_SIZE, MAX_K, MIN_K, SMALLEST_K};
use crate::allocator::Region;
use crate::log;
use core::ptr::NonNull;
use freelist::FreeLists;
use header::{BlockHeader, Tag};

pub use size_class::{block_size, buddy_of, class_for, usable_size};
pub use stats::{FreeBlock, PoolSnapshot, PoolStats};
pub use visitor::{Leaf, LeafState};

/// Handle to a reserved block.
///
/// Holds the arena-relative offset of the first usable byte, i.e. the byte
/// right after the block header. Handles are plain values: releasing one
/// twice, or using one after release, is a caller error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Allocation {
    offset: usize,
}

impl Allocation {
    /// Arena-relative offset of the usable bytes.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Arena-relative offset of the block (its header).
    #[inline]
    pub fn block_offset(&self) -> usize {
        self.offset - HEADER_SIZE
    }
}

/// A fixed-capacity buddy allocator over one OS region.
pub struct BuddyPool {
    region: Option<Region>,
    kval_m: usize,
    avail: FreeLists,
    reserved_bytes: usize,
    reserved_blocks: usize,
    last_error: Option<AllocError>,
}

impl BuddyPool {
    /// Returns a pool that owns no memory. Every allocation on it fails with
    /// [`AllocError::InvalidArgument`].
    pub fn uninit() -> Self {
        Self {
            region: None,
            kval_m: 0,
            avail: FreeLists::new(0),
            reserved_bytes: 0,
            reserved_blocks: 0,
            last_error: None,
        }
    }

    /// Creates a pool able to hold at least `capacity` bytes.
    ///
    /// The arena class is the smallest `k` with `2^k >= capacity`, clamped to
    /// `[MIN_K, MAX_K]`; a zero hint selects [`DEFAULT_K`].
    ///
    /// # Errors
    /// [`AllocError::OutOfMemory`] if the OS cannot supply the region.
    pub fn new(capacity: usize) -> Result<Self, AllocError> {
        let k = if capacity == 0 {
            DEFAULT_K
        } else {
            size_class::arena_class(capacity).unwrap_or(MAX_K)
        };
        Self::with_kval(k)
    }

    /// Creates a pool of exactly `2^k` bytes, `k` clamped to `[MIN_K, MAX_K]`.
    ///
    /// # Errors
    /// [`AllocError::OutOfMemory`] if the OS cannot supply the region.
    pub fn with_kval(k: usize) -> Result<Self, AllocError> {
        let kval_m = k.clamp(MIN_K, MAX_K);
        let Some(mut region) = Region::new(block_size(kval_m)) else {
            log::debug!(kval_m, "region reservation failed");
            return Err(AllocError::OutOfMemory);
        };

        let mut avail = FreeLists::new(kval_m);
        avail.push_front(region.as_mut_slice(), kval_m, 0);

        log::debug!(kval_m, bytes = block_size(kval_m), "buddy pool created");

        Ok(Self {
            region: Some(region),
            kval_m,
            avail,
            reserved_bytes: 0,
            reserved_blocks: 0,
            last_error: None,
        })
    }

    /// Returns the region to the OS and leaves the pool uninitialized.
    /// Calling it again is a no-op.
    pub fn destroy(&mut self) {
        if self.region.take().is_some() {
            log::debug!(kval_m = self.kval_m, "buddy pool destroyed");
        }
        self.kval_m = 0;
        self.avail = FreeLists::new(0);
        self.reserved_bytes = 0;
        self.reserved_blocks = 0;
    }

    /// Whether the pool currently owns its region.
    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.region.is_some()
    }

    /// The arena class `kval_m` (0 once destroyed).
    #[inline]
    pub fn kval(&self) -> usize {
        self.kval_m
    }

    /// Total arena bytes (0 once destroyed).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.region.as_ref().map_or(0, Region::len)
    }

    /// Base address of the arena.
    #[inline]
    pub fn base_ptr(&self) -> Option<NonNull<u8>> {
        self.region.as_ref().map(Region::as_ptr)
    }

    /// The most recent failure reported by this pool. Successful calls do
    /// not reset it.
    #[inline]
    pub fn last_error(&self) -> Option<AllocError> {
        self.last_error
    }

    /// Clears the indicator returned by [`last_error`](Self::last_error).
    #[inline]
    pub fn clear_last_error(&mut self) {
        self.last_error = None;
    }

    fn fail<T>(&mut self, err: AllocError) -> Result<T, AllocError> {
        self.last_error = Some(err);
        Err(err)
    }

    /// Reserves a block with at least `size` usable bytes.
    ///
    /// # Errors
    /// - [`AllocError::InvalidArgument`] on a destroyed pool or a zero `size`.
    /// - [`AllocError::OutOfMemory`] when no free block is large enough. The
    ///   free lists are left untouched.
    pub fn acquire(&mut self, size: usize) -> Result<Allocation, AllocError> {
        if self.region.is_none() || size == 0 {
            log::debug!(size, "acquire rejected");
            return self.fail(AllocError::InvalidArgument);
        }

        let k = match class_for(size) {
            Some(k) if k <= self.kval_m => k,
            _ => {
                log::debug!(size, kval_m = self.kval_m, "request larger than the pool");
                return self.fail(AllocError::OutOfMemory);
            }
        };

        let Some(mut i) = (k..=self.kval_m).find(|&i| !self.avail.is_empty(i)) else {
            log::debug!(size, k, "no free block large enough");
            return self.fail(AllocError::OutOfMemory);
        };

        let Some(region) = self.region.as_mut() else {
            return self.fail(AllocError::InvalidArgument);
        };
        let mem = region.as_mut_slice();
        let avail = &mut self.avail;

        let Some(block) = avail.pop_front(mem, i) else {
            return self.fail(AllocError::OutOfMemory);
        };

        while i > k {
            i -= 1;
            let buddy = block + block_size(i);
            avail.push_front(mem, i, buddy);
            log::trace!(block, buddy, k = i, "split");
        }

        BlockHeader::new(Tag::Reserved, k).write(mem, block);

        self.reserved_bytes += block_size(k);
        self.reserved_blocks += 1;

        Ok(Allocation {
            offset: block + HEADER_SIZE,
        })
    }

    /// Returns a block to the pool, merging it with free buddies.
    ///
    /// `None` and calls on a destroyed pool are no-ops. A handle that does
    /// not name a reserved block of this pool is ignored.
    pub fn release(&mut self, block: impl Into<Option<Allocation>>) {
        let Some(block) = block.into() else {
            return;
        };
        let Some((mut off, header)) = self.reserved_header(block) else {
            if self.region.is_some() {
                log::warn!(offset = block.offset, "release of a block this pool does not hold");
            }
            return;
        };

        let mut k = header.kval();
        self.reserved_bytes -= block_size(k);
        self.reserved_blocks -= 1;

        let kval_m = self.kval_m;
        let Some(region) = self.region.as_mut() else {
            return;
        };
        let mem = region.as_mut_slice();
        let avail = &mut self.avail;

        BlockHeader::new(Tag::Available, k).write(mem, off);

        while k < kval_m {
            let buddy = buddy_of(off, k);
            let bh = BlockHeader::read(mem, buddy);
            if bh.tag() != Tag::Available || bh.kval() != k {
                break;
            }

            avail.remove(mem, buddy);
            // The upper half's header now lies inside the merged block.
            BlockHeader::update(mem, off.max(buddy), |h| h.set_tag(Tag::Unused));
            off = off.min(buddy);
            k += 1;
            log::trace!(block = off, k, "coalesce");
        }

        avail.push_front(mem, k, off);
    }

    /// Grows a block to hold `size` usable bytes.
    ///
    /// `None` behaves as [`acquire`](Self::acquire). If `size` still fits the
    /// current block the same handle is returned. Otherwise a new block is
    /// acquired first, the old contents are copied over and the old block is
    /// released.
    ///
    /// # Errors
    /// - [`AllocError::InvalidArgument`] on a destroyed pool or a handle
    ///   that does not name a reserved block.
    /// - [`AllocError::OutOfMemory`] if no larger block is available; the
    ///   original block and its contents stay valid.
    pub fn resize(
        &mut self,
        block: impl Into<Option<Allocation>>,
        size: usize,
    ) -> Result<Allocation, AllocError> {
        let Some(block) = block.into() else {
            return self.acquire(size);
        };
        let Some((_, header)) = self.reserved_header(block) else {
            return self.fail(AllocError::InvalidArgument);
        };

        let k = header.kval();
        if size
            .checked_add(HEADER_SIZE)
            .is_some_and(|total| total <= block_size(k))
        {
            return Ok(block);
        }

        let fresh = self.acquire(size)?;

        let fresh_k = self.class_of(fresh).unwrap_or(k);
        let len = usable_size(k).min(usable_size(fresh_k));
        if let Some(region) = self.region.as_mut() {
            region
                .as_mut_slice()
                .copy_within(block.offset..block.offset + len, fresh.offset);
        }
        log::trace!(from = block.offset, to = fresh.offset, len, "resize moved block");

        self.release(block);
        Ok(fresh)
    }

    /// Class of the block behind `block`, if it is a reserved block of this pool.
    pub fn class_of(&self, block: Allocation) -> Option<usize> {
        self.reserved_header(block).map(|(_, h)| h.kval())
    }

    /// Usable bytes in the block behind `block`.
    pub fn usable_size(&self, block: Allocation) -> Option<usize> {
        self.class_of(block).map(usable_size)
    }

    /// The usable bytes of a reserved block.
    pub fn payload(&self, block: Allocation) -> Option<&[u8]> {
        let len = self.usable_size(block)?;
        let region = self.region.as_ref()?;
        Some(&region.as_slice()[block.offset..block.offset + len])
    }

    /// The usable bytes of a reserved block, mutably.
    pub fn payload_mut(&mut self, block: Allocation) -> Option<&mut [u8]> {
        let len = self.usable_size(block)?;
        let region = self.region.as_mut()?;
        Some(&mut region.as_mut_slice()[block.offset..block.offset + len])
    }

    /// Raw address of the usable bytes, for callers that hand the memory to
    /// foreign code. Valid until the block is released or the pool destroyed.
    pub fn as_ptr(&self, block: Allocation) -> Option<NonNull<u8>> {
        self.class_of(block)?;
        self.region.as_ref()?.ptr_at(block.offset)
    }

    /// Locates and checks the header of a reserved block.
    fn reserved_header(&self, block: Allocation) -> Option<(usize, BlockHeader)> {
        let region = self.region.as_ref()?;
        let off = block.offset.checked_sub(HEADER_SIZE)?;
        if off >= region.len() || off % block_size(SMALLEST_K) != 0 {
            return None;
        }
        let header = BlockHeader::read(region.as_slice(), off);
        let k = header.kval();
        if header.tag() != Tag::Reserved
            || !(SMALLEST_K..=self.kval_m).contains(&k)
            || off % block_size(k) != 0
        {
            return None;
        }
        Some((off, header))
    }

    /// Bytes held by reserved blocks, headers included.
    #[inline]
    pub fn reserved_bytes(&self) -> usize {
        self.reserved_bytes
    }

    /// Number of blocks currently reserved.
    #[inline]
    pub fn reserved_blocks(&self) -> usize {
        self.reserved_blocks
    }
}

impl Default for BuddyPool {
    fn default() -> Self {
        Self::uninit()
    }
}

impl core::fmt::Debug for BuddyPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BuddyPool")
            .field("initialized", &self.is_initialized())
            .field("kval_m", &self.kval_m)
            .field("capacity", &self.capacity())
            .field("reserved_bytes", &self.reserved_bytes)
            .field("reserved_blocks", &self.reserved_blocks)
            .finish_non_exhaustive()
    }
}
