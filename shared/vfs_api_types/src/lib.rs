#![no_std]

#[cfg(test)]
extern crate std;

extern crate alloc;

pub mod fs;
pub mod time;

pub use fs::{FileKind, FileStat, FsStatus, MountableFs, VolumeInfo};
pub use time::DateTime;
