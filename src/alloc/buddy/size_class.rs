//! Size-class arithmetic: request sizes to classes, classes to byte counts,
//! and the buddy relation between block offsets.

use crate::allocator::constants::{HEADER_SIZE, MAX_K, SMALLEST_K};

/// Returns the smallest class `k` with `2^k >= bytes + HEADER_SIZE`,
/// never below [`SMALLEST_K`].
///
/// Returns `None` when the class would exceed [`MAX_K`]; such a request can
/// never be served by any pool.
#[inline]
pub const fn class_for(bytes: usize) -> Option<usize> {
    let total = match bytes.checked_add(HEADER_SIZE) {
        Some(t) => t,
        None => return None,
    };
    let rounded = match total.checked_next_power_of_two() {
        Some(r) => r,
        None => return None,
    };
    let k = rounded.trailing_zeros() as usize;
    let k = if k < SMALLEST_K { SMALLEST_K } else { k };
    if k > MAX_K {
        None
    } else {
        Some(k)
    }
}

/// Returns the size in bytes of a block of class `k`.
#[inline]
pub const fn block_size(k: usize) -> usize {
    1 << k
}

/// Returns the bytes a caller may use in a block of class `k`.
#[inline]
pub const fn usable_size(k: usize) -> usize {
    block_size(k) - HEADER_SIZE
}

/// Returns the arena-relative offset of the buddy of the class-`k` block at `offset`.
///
/// Applying it twice yields `offset` again.
#[inline]
pub const fn buddy_of(offset: usize, k: usize) -> usize {
    offset ^ block_size(k)
}

/// Returns the class of the smallest arena that holds `capacity` bytes.
///
/// `None` when `capacity` cannot be represented as a power of two.
#[inline]
pub const fn arena_class(capacity: usize) -> Option<usize> {
    match capacity.checked_next_power_of_two() {
        Some(r) => Some(r.trailing_zeros() as usize),
        None => None,
    }
}
