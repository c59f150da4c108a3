//! Platform primitives for reserving and releasing one contiguous region.
//!
//! Both back-ends hand out zero-filled, read-write memory aligned to the OS
//! page size, which is what the pool relies on for block alignment.

#[cfg(unix)]
pub mod unix;

#[cfg(windows)]
pub mod windows;

#[cfg(unix)]
pub use unix::{allocate_region, free_region};

#[cfg(windows)]
pub use windows::{allocate_region, free_region};

#[cfg(not(any(unix, windows)))]
compile_error!("buddy-pool reserves its arena with mmap or VirtualAlloc; this target has neither");
