//! Pool configuration constants.
//!
//! Every exponent here is a *size class*: a block of class `k` spans `2^k`
//! bytes including its header.

use crate::alloc::buddy::header::BlockHeader;

/// Smallest block class (64 bytes). No block is ever split below this, so
/// every block is large enough to carry its header.
pub const SMALLEST_K: usize = 6;

/// Smallest arena class (1 MiB). Capacity hints below this are rounded up.
pub const MIN_K: usize = 20;

/// Largest arena class the pool supports.
#[cfg(target_pointer_width = "64")]
pub const MAX_K: usize = 48;

/// Largest arena class the pool supports.
#[cfg(not(target_pointer_width = "64"))]
pub const MAX_K: usize = 30;

/// Arena class used when no capacity hint is given (1 GiB).
pub const DEFAULT_K: usize = 30;

/// Bytes of metadata at the start of every block, free or reserved.
pub const HEADER_SIZE: usize = core::mem::size_of::<BlockHeader>();

const _: () = {
    assert!(HEADER_SIZE <= 1 << SMALLEST_K);
    assert!(SMALLEST_K <= MIN_K);
    assert!(MIN_K <= DEFAULT_K);
    assert!(DEFAULT_K <= MAX_K);
};
