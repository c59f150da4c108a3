//! The OS-backed memory region a pool carves its blocks from.

use super::syscall;
use crate::log;
use core::ptr::NonNull;

/// One contiguous memory region reserved from the OS as a single unit.
///
/// The region is addressed through offset-based slice views; nothing outside
/// this type performs pointer arithmetic on the base address.
pub struct Region {
    start: NonNull<u8>,
    size: usize,
}

impl Region {
    /// Acquires a new zero-filled region of `size` bytes.
    pub fn new(size: usize) -> Option<Self> {
        if size == 0 {
            return None;
        }
        // SAFETY: the base is owned by the returned `Region`, whose `Drop`
        // releases it once with the same size.
        let start = unsafe { syscall::allocate_region(size)? };
        Some(Self { start, size })
    }

    /// Returns the length of the region in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.size
    }

    /// Always `false`; `new` rejects zero-sized regions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Returns the base address of the region.
    #[inline]
    pub fn as_ptr(&self) -> NonNull<u8> {
        self.start
    }

    /// Address of the byte at `offset`, if it lies inside the region.
    #[inline]
    pub fn ptr_at(&self, offset: usize) -> Option<NonNull<u8>> {
        if offset >= self.size {
            return None;
        }
        // SAFETY: `offset` is in bounds of the live mapping.
        Some(unsafe { NonNull::new_unchecked(self.start.as_ptr().add(offset)) })
    }

    /// Views the whole region as bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        // SAFETY: the mapping is live, readable and `size` bytes long for the
        // lifetime of `self`; shared access is tied to `&self`.
        unsafe { core::slice::from_raw_parts(self.start.as_ptr(), self.size) }
    }

    /// Views the whole region as mutable bytes.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        // SAFETY: as above; exclusive access is tied to `&mut self`.
        unsafe { core::slice::from_raw_parts_mut(self.start.as_ptr(), self.size) }
    }
}

// The region is uniquely owned; moving it to another thread moves the mapping.
unsafe impl Send for Region {}

impl Drop for Region {
    fn drop(&mut self) {
        let released = unsafe { syscall::free_region(self.start, self.size) };
        if !released {
            log::warn!(size = self.size, "failed to return region to the OS");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_is_zeroed_and_writable() {
        let mut region = Region::new(1 << 16).expect("mmap failed");
        assert_eq!(region.len(), 1 << 16);
        assert!(region.as_slice().iter().all(|&b| b == 0));

        region.as_mut_slice()[100] = 0xAB;
        assert_eq!(region.as_slice()[100], 0xAB);
    }

    #[test]
    fn test_region_base_is_page_aligned() {
        let region = Region::new(3 * 4096 + 1).expect("mmap failed");
        assert_eq!(region.as_ptr().as_ptr() as usize % 4096, 0);
        assert_eq!(region.ptr_at(0), Some(region.as_ptr()));
        assert!(region.ptr_at(region.len() - 1).is_some());
        assert!(region.ptr_at(region.len()).is_none());
    }

    #[test]
    fn test_raw_region_round_trips_through_the_os() {
        unsafe {
            let base = syscall::allocate_region(1 << 16).expect("mmap failed");
            assert_eq!(*base.as_ptr().add((1 << 16) - 1), 0);
            assert!(syscall::free_region(base, 1 << 16));
        }
    }

    #[test]
    fn test_zero_size_is_rejected() {
        assert!(Region::new(0).is_none());
    }
}
