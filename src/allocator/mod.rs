//! OS-facing layer: configuration constants, region reservation and the
//! owned [`Region`] type the pool carves its blocks from.

pub mod constants;
pub mod region;
pub mod syscall;

pub use region::Region;
