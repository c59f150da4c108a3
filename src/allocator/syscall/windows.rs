//! `VirtualAlloc`-backed regions.
#![cfg(windows)]

use core::ptr::{self, NonNull};
use windows_sys::Win32::System::Memory::{
    VirtualAlloc, VirtualFree, MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_READWRITE,
};

/// Reserves and commits `size` bytes in one step.
///
/// Committed pages are zero-filled and the base is aligned to the allocation
/// granularity. Returns `None` when the system refuses.
///
/// # Safety
/// A returned base must be released exactly once with [`free_region`].
pub unsafe fn allocate_region(size: usize) -> Option<NonNull<u8>> {
    let base = VirtualAlloc(ptr::null(), size, MEM_COMMIT | MEM_RESERVE, PAGE_READWRITE);
    NonNull::new(base.cast::<u8>())
}

/// Releases the whole reservation. `MEM_RELEASE` requires a size of zero, so
/// `_size` is unused.
///
/// # Safety
/// `base` must be the base of one live reservation from [`allocate_region`].
pub unsafe fn free_region(base: NonNull<u8>, _size: usize) -> bool {
    VirtualFree(base.as_ptr().cast(), 0, MEM_RELEASE) != 0
}
