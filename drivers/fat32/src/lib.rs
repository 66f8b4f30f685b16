// Read-only FAT32 driver.
// No_std (plus alloc) unless testing or built with the `std` feature.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod cluster;
pub mod config;
pub mod device;
pub mod dir_entry;
pub mod directory;
pub mod dos_time;
pub mod error;
pub mod geometry;
pub mod layout;
pub mod path_cache;
pub mod volume;

#[cfg(test)]
mod test_image;

pub use cluster::{ClusterChain, ClusterId, ClusterReader};
pub use config::MountOptions;
pub use device::{BlockDevice, DeviceError, MemDevice};
#[cfg(feature = "std")]
pub use device::IoDevice;
pub use dir_entry::{Attributes, DirectoryEntry, EntryLocation};
pub use directory::{Directory, EntryKind};
pub use error::{Fat32Error, InvalidVolume, Result};
pub use geometry::VolumeGeometry;
pub use path_cache::{CacheStats, PathCache};
pub use volume::Fat32Volume;
