use core::fmt;

use vfs_api_types::FsStatus;

use crate::cluster::ClusterId;
use crate::device::DeviceError;

pub type Result<T> = core::result::Result<T, Fat32Error>;

/// Why a boot sector / FSINFO pair was refused at mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidVolume {
    /// The device could not supply a full boot or FSINFO sector.
    Unreadable(DeviceError),
    /// Bytes 510..512 are not 0xAA55.
    BootSignature(u16),
    /// FAT32 keeps its root in the data region; a fixed root area means FAT12/16.
    FixedRootArea(u16),
    ZeroFatSize,
    NoSectorCount,
    ZeroBytesPerSector,
    ZeroSectorsPerCluster,
    /// The reserved region cannot hold the FSINFO sector it points at.
    FsInfoOutsideReserved { fsinfo_sector: u16, reserved_sectors: u16 },
    /// Mirroring is disabled and the active FAT index exceeds the FAT count.
    ActiveFatOutOfRange { active: u8, num_fats: u8 },
    RootCluster(u32),
    FsInfoLeadSignature(u32),
    FsInfoStructSignature(u32),
    FsInfoTrailSignature(u32),
}

impl fmt::Display for InvalidVolume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreadable(e) => write!(f, "boot region unreadable: {e}"),
            Self::BootSignature(sig) => write!(f, "boot signature {sig:#06x}, expected 0xaa55"),
            Self::FixedRootArea(n) => write!(f, "fixed root area of {n} entries (not FAT32)"),
            Self::ZeroFatSize => f.write_str("FAT size is zero"),
            Self::NoSectorCount => f.write_str("neither 16- nor 32-bit sector count is set"),
            Self::ZeroBytesPerSector => f.write_str("bytes per sector is zero"),
            Self::ZeroSectorsPerCluster => f.write_str("sectors per cluster is zero"),
            Self::FsInfoOutsideReserved { fsinfo_sector, reserved_sectors } => write!(
                f,
                "FSINFO sector {fsinfo_sector} outside {reserved_sectors} reserved sectors"
            ),
            Self::ActiveFatOutOfRange { active, num_fats } => {
                write!(f, "active FAT {active} of {num_fats}")
            }
            Self::RootCluster(id) => write!(f, "root cluster {id} is not a data cluster"),
            Self::FsInfoLeadSignature(sig) => write!(f, "FSINFO lead signature {sig:#010x}"),
            Self::FsInfoStructSignature(sig) => write!(f, "FSINFO struct signature {sig:#010x}"),
            Self::FsInfoTrailSignature(sig) => write!(f, "FSINFO trail signature {sig:#010x}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fat32Error {
    InvalidVolume(InvalidVolume),
    Io(DeviceError),
    /// The FAT entry of this cluster holds the damaged-cluster marker.
    DamagedCluster(ClusterId),
    /// A chain starting here ran past the cluster count or ended before the file did.
    CorruptChain { start: ClusterId },
    /// A cluster id outside the data region (or the FAT) was dereferenced.
    BadClusterId(u32),
    /// A long-name record disagrees with its siblings or its short-name anchor.
    ChecksumMismatch { expected: u8, found: u8 },
    NotFound,
    NotADirectory,
    IsADirectory,
    /// Mutation on a read-only volume.
    Unsupported,
}

impl Fat32Error {
    /// Status code for the capability interface.
    pub fn status(&self) -> FsStatus {
        match self {
            Self::InvalidVolume(_) => FsStatus::InvalidFs,
            Self::Io(_) => FsStatus::IoError,
            Self::DamagedCluster(_)
            | Self::CorruptChain { .. }
            | Self::BadClusterId(_)
            | Self::ChecksumMismatch { .. } => FsStatus::Corrupt,
            Self::NotFound => FsStatus::NotFound,
            Self::NotADirectory => FsStatus::NotDir,
            Self::IsADirectory => FsStatus::IsDir,
            Self::Unsupported => FsStatus::Unsupported,
        }
    }
}

impl From<DeviceError> for Fat32Error {
    fn from(e: DeviceError) -> Self {
        Self::Io(e)
    }
}

impl From<InvalidVolume> for Fat32Error {
    fn from(e: InvalidVolume) -> Self {
        Self::InvalidVolume(e)
    }
}

impl fmt::Display for Fat32Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidVolume(why) => write!(f, "not a FAT32 volume: {why}"),
            Self::Io(e) => write!(f, "i/o error: {e}"),
            Self::DamagedCluster(id) => write!(f, "cluster {id} is marked damaged"),
            Self::CorruptChain { start } => write!(f, "corrupt cluster chain starting at {start}"),
            Self::BadClusterId(id) => write!(f, "cluster id {id:#x} out of range"),
            Self::ChecksumMismatch { expected, found } => {
                write!(f, "long name checksum {found:#04x}, expected {expected:#04x}")
            }
            Self::NotFound => f.write_str("no such file or directory"),
            Self::NotADirectory => f.write_str("not a directory"),
            Self::IsADirectory => f.write_str("is a directory"),
            Self::Unsupported => f.write_str("operation not supported on a read-only volume"),
        }
    }
}

impl core::error::Error for Fat32Error {}
