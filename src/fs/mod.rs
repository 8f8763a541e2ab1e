//! Filesystem support: error taxonomy, the sector buffer cache and the
//! FAT12/16/32 driver.

pub mod bcache;
pub mod error;
pub mod fat;

pub use error::{FsError, FsResult};
