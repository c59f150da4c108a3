pub mod buddy;
pub mod error;

pub use buddy::{Allocation, BuddyPool, PoolSnapshot, PoolStats};
pub use error::AllocError;
