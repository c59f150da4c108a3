//! `mmap`-backed regions.
#![cfg(unix)]

use core::ptr::{self, NonNull};
use libc::{c_void, mmap, munmap, MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE};

/// Maps `size` bytes of private anonymous memory.
///
/// Anonymous mappings are zero-filled and page-aligned. Returns `None` when
/// the kernel refuses the mapping.
///
/// # Safety
/// A returned base must be unmapped exactly once with [`free_region`] and the
/// same `size`.
pub unsafe fn allocate_region(size: usize) -> Option<NonNull<u8>> {
    let base = mmap(
        ptr::null_mut(),
        size,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
    );
    if base == MAP_FAILED {
        return None;
    }
    // Without MAP_FIXED the kernel never places a mapping at address zero.
    NonNull::new(base.cast::<u8>())
}

/// Unmaps a region. Returns `false` if `munmap` reports an error.
///
/// # Safety
/// `base` and `size` must describe one live mapping from [`allocate_region`].
pub unsafe fn free_region(base: NonNull<u8>, size: usize) -> bool {
    munmap(base.as_ptr().cast::<c_void>(), size) == 0
}
