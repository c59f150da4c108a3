//! Errors reported by pool operations.

/// The error type for pool operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocError {
    /// The pool is uninitialized (destroyed) or the request was zero bytes.
    InvalidArgument,
    /// No free block of a sufficient class exists, or the request's class is
    /// larger than the pool itself.
    OutOfMemory,
}

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AllocError::InvalidArgument => f.write_str("invalid argument to pool operation"),
            AllocError::OutOfMemory => f.write_str("memory allocation failed: pool exhausted"),
        }
    }
}

impl std::error::Error for AllocError {}
