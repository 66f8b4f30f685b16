//! Capability interface between a mountable filesystem driver and the VFS
//! dispatcher that routes path-based calls to it.
//!
//! Drivers implement `MountableFs`; the dispatcher owns mount points, path
//! normalisation relative to the mount, and POSIX-style stat translation.

use alloc::string::String;
use alloc::vec::Vec;

use crate::time::DateTime;

/// Result codes a driver error collapses to when crossing the VFS boundary.
#[repr(u64)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FsStatus {
    Ok          = 0,
    NotFound    = 1,
    IsDir       = 2,
    NotDir      = 3,
    Unsupported = 4,
    IoError     = 5,
    Corrupt     = 6,
    InvalidFs   = 7,
}

impl FsStatus {
    pub fn from_u64(v: u64) -> Self {
        match v {
            0 => FsStatus::Ok,
            1 => FsStatus::NotFound,
            2 => FsStatus::IsDir,
            3 => FsStatus::NotDir,
            4 => FsStatus::Unsupported,
            6 => FsStatus::Corrupt,
            7 => FsStatus::InvalidFs,
            _ => FsStatus::IoError,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    File,
    Directory,
    Symlink,
}

/// Metadata for one resolved path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileStat {
    pub kind:      FileKind,
    pub size:      u64,
    pub created:   DateTime,
    pub accessed:  DateTime,
    pub modified:  DateTime,
    pub read_only: bool,
}

impl FileStat {
    pub fn is_dir(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == FileKind::File
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeInfo {
    pub id:         u32,
    pub label:      String,
    pub free_bytes: u64,
}

/// Operations a filesystem must provide to be mounted by the dispatcher.
///
/// Query methods with default bodies are derived from `stat`; drivers may
/// override them when they have a cheaper path. Mutating operations have no
/// default so that every driver states its write policy explicitly.
pub trait MountableFs {
    type Error;

    fn volume_info(&self) -> VolumeInfo;

    /// Sorted entry names of the directory at `path`.
    fn dir_entries(&self, path: &str) -> Result<Vec<String>, Self::Error>;

    fn stat(&self, path: &str) -> Result<FileStat, Self::Error>;

    fn read_file(&self, path: &str) -> Result<Vec<u8>, Self::Error>;

    fn dir_exists(&self, path: &str) -> bool {
        self.dir_entries(path).is_ok()
    }

    fn file_exists(&self, path: &str) -> bool {
        self.stat(path).is_ok()
    }

    fn is_directory(&self, path: &str) -> bool {
        self.stat(path).is_ok_and(|s| s.kind == FileKind::Directory)
    }

    fn is_file(&self, path: &str) -> bool {
        self.stat(path).is_ok_and(|s| s.kind == FileKind::File)
    }

    fn is_symlink(&self, path: &str) -> bool {
        self.stat(path).is_ok_and(|s| s.kind == FileKind::Symlink)
    }

    fn size(&self, path: &str) -> Result<u64, Self::Error> {
        self.stat(path).map(|s| s.size)
    }

    fn atime(&self, path: &str) -> Result<DateTime, Self::Error> {
        self.stat(path).map(|s| s.accessed)
    }

    fn ctime(&self, path: &str) -> Result<DateTime, Self::Error> {
        self.stat(path).map(|s| s.created)
    }

    fn mtime(&self, path: &str) -> Result<DateTime, Self::Error> {
        self.stat(path).map(|s| s.modified)
    }

    // ─── Mutations ─────────────────────────────────────────────────────────────

    fn dir_mkdir(&self, path: &str) -> Result<(), Self::Error>;
    fn dir_delete(&self, path: &str) -> Result<(), Self::Error>;
    fn file_delete(&self, path: &str) -> Result<(), Self::Error>;
    fn file_rename(&self, from: &str, to: &str) -> Result<(), Self::Error>;
    fn file_chmod(&self, path: &str, mode: u32) -> Result<(), Self::Error>;
    fn file_write(&self, path: &str, data: &[u8]) -> Result<(), Self::Error>;
}
