//! # `buddy-pool` - Buddy-System Memory Pool
//!
//! A fixed-capacity arena that serves allocation, release and resize
//! requests by splitting and merging power-of-two blocks.
//!
//! ## Architecture
//!
//! ```text
//!   buddy_pool
//!   ├── allocator      - OS layer
//!   │   ├── constants  - SMALLEST_K, MIN_K, MAX_K, DEFAULT_K, HEADER_SIZE
//!   │   ├── syscall    - mmap/munmap, VirtualAlloc/VirtualFree
//!   │   └── region     - owned region with offset-based views
//!   └── alloc
//!       ├── error      - AllocError
//!       └── buddy      - BuddyPool
//!           ├── size_class - request size -> class, buddy offsets
//!           ├── header     - in-place block header
//!           ├── freelist   - per-class circular lists with sentinels
//!           ├── visitor    - read-only diagnostic walk
//!           └── stats      - snapshots, accounting, invariant checks
//! ```
//!
//! ### Blocks
//!
//! A block of class `k` spans `2^k` bytes and starts with a 24-byte header.
//! The buddy of the block at arena offset `o` is the block at `o ^ 2^k`.
//! Every address the pool computes is an offset into its own region, so the
//! buddy relation never depends on where the OS placed the mapping.
//!
//! ### Invariants
//!
//! Between any two calls:
//! - free bytes plus reserved bytes equal the arena size;
//! - every block on `avail[k]` is tagged available with class `k`;
//! - no two free blocks of the same class are buddies.
//!
//! ## Example
//!
//! ```rust
//! use buddy_pool::{AllocError, BuddyPool};
//!
//! let mut pool = BuddyPool::new(1 << 20).unwrap();
//!
//! let p = pool.acquire(100).unwrap();
//! pool.payload_mut(p).unwrap()[..5].copy_from_slice(b"hello");
//!
//! // Growing keeps the contents.
//! let p = pool.resize(p, 4000).unwrap();
//! assert_eq!(&pool.payload(p).unwrap()[..5], b"hello");
//!
//! assert_eq!(pool.acquire(1 << 21), Err(AllocError::OutOfMemory));
//!
//! pool.release(p);
//! assert_eq!(pool.stats().free_bytes, pool.capacity());
//! ```
//!
//! ## Thread safety
//!
//! The pool is a plain sequential structure. It is `Send` but not `Sync`;
//! share it behind a lock held for the whole of each call.

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod alloc;
pub mod allocator;
mod log;

pub use alloc::{AllocError, Allocation, BuddyPool, PoolSnapshot, PoolStats};
pub use allocator::constants;

// Compile-time assertions for the on-arena layout.
const _: () = {
    use constants::{HEADER_SIZE, MAX_K, SMALLEST_K};

    // Block offsets must leave the top bit of a link free for sentinels.
    assert!(MAX_K < 63);
    // Payloads start 8-byte aligned inside a 64-byte aligned block.
    assert!(HEADER_SIZE % 8 == 0);
    assert!(HEADER_SIZE < 1 << SMALLEST_K);
};
