//! A mounted volume: path resolution, lookups and file reads.

use alloc::string::String;
use alloc::vec::Vec;

use log::{debug, info, trace, warn};
use spin::Mutex;
use vfs_api_types::{FileStat, MountableFs, VolumeInfo};

use crate::cluster::{ClusterId, ClusterReader};
use crate::config::MountOptions;
use crate::device::BlockDevice;
use crate::dir_entry::DirectoryEntry;
use crate::directory::{Directory, EntryKind};
use crate::error::{Fat32Error, Result};
use crate::geometry::VolumeGeometry;
use crate::layout::{boot, BOOT_SECTOR_SIZE};
use crate::path_cache::{CacheStats, PathCache};

pub struct Fat32Volume<D> {
    reader: ClusterReader<D>,
    cache:  Mutex<PathCache>,
}

impl<D: BlockDevice> Fat32Volume<D> {
    /// True if the filesystem-type label at byte 82 reads `FAT32`.
    ///
    /// Much weaker than mounting: nothing else in the boot sector is checked.
    pub fn probe(device: &mut D) -> Result<bool> {
        let raw = device.read_at(0, BOOT_SECTOR_SIZE)?;
        Ok(raw[boot::FS_LABEL..boot::FS_LABEL + 5] == *b"FAT32")
    }

    pub fn mount(device: D) -> Result<Self> {
        Self::mount_with(device, MountOptions::default())
    }

    pub fn mount_with(mut device: D, options: MountOptions) -> Result<Self> {
        let geometry = VolumeGeometry::open(&mut device)?;
        info!(
            "fat32: mounted {:?} serial {:#010x}, {} clusters of {} bytes, root at cluster {}",
            geometry.label(),
            geometry.serial_number,
            geometry.total_clusters,
            geometry.bytes_per_cluster,
            geometry.root_cluster,
        );
        let chain_limit = options.chain_limit(geometry.total_clusters);
        Ok(Self {
            reader: ClusterReader::new(geometry, device, chain_limit),
            cache:  Mutex::new(PathCache::new(options.path_cache_capacity)),
        })
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        self.reader.geometry()
    }

    /// Volume serial number.
    pub fn id(&self) -> u32 {
        self.geometry().serial_number
    }

    pub fn label(&self) -> String {
        self.geometry().label()
    }

    pub fn free_bytes(&self) -> u64 {
        self.geometry().free_bytes()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.lock().stats()
    }

    pub fn root(&self) -> Directory<'_, D> {
        Directory::root(&self.reader)
    }

    pub fn open_dir(&self, cluster: ClusterId) -> Directory<'_, D> {
        Directory::new(&self.reader, cluster)
    }

    /// Open a directory found by an earlier lookup.
    pub fn open_entry(&self, entry: &DirectoryEntry) -> Result<Directory<'_, D>> {
        if !entry.is_dir() {
            return Err(Fat32Error::NotADirectory);
        }
        Ok(self.open_dir(entry.first_cluster()))
    }

    /// Resolve a directory path from the root, consulting the path cache first.
    ///
    /// The cache lock is held for the whole walk so two callers never resolve
    /// the same path at once.
    pub fn resolve(&self, path: &str) -> Result<Directory<'_, D>> {
        let components = components(path);
        if components.is_empty() {
            return Ok(self.root());
        }
        let key = cache_key(&components);

        let mut cache = self.cache.lock();
        if let Some(cluster) = cache.get(&key) {
            trace!("fat32: path cache hit {key:?}");
            return Ok(self.open_dir(cluster));
        }
        debug!("fat32: path cache miss {key:?}");

        let mut dir = self.root();
        for name in &components {
            let entry = dir.find_entry(name, EntryKind::Directory)?.ok_or(Fat32Error::NotFound)?;
            dir = self.open_dir(entry.first_cluster());
        }
        debug!("fat32: caching {key:?} at cluster {}", dir.cluster());
        cache.insert(key, dir.cluster());
        Ok(dir)
    }

    /// Entry for a file or directory path; the root yields its pseudo-entry.
    pub fn lookup(&self, path: &str) -> Result<DirectoryEntry> {
        let mut components = components(path);
        let Some(leaf) = components.pop() else {
            return Ok(DirectoryEntry::root(self.geometry().root_cluster));
        };
        let parent = self.resolve(&components.join("/"))?;
        parent.find_entry(leaf, EntryKind::Any)?.ok_or(Fat32Error::NotFound)
    }

    /// The first `len()` bytes of the entry's cluster chain.
    pub fn read_entry(&self, entry: &DirectoryEntry) -> Result<Vec<u8>> {
        if entry.is_dir() {
            return Err(Fat32Error::IsADirectory);
        }
        let size = entry.len() as usize;
        if size == 0 {
            return Ok(Vec::new());
        }
        let start = entry.first_cluster();
        let bytes_per_cluster = self.geometry().bytes_per_cluster;
        let reachable = u64::from(self.reader.chain_limit()) * u64::from(bytes_per_cluster);
        if u64::from(entry.len()) > reachable {
            warn!(
                "fat32: {} claims {} bytes, more than a chain from cluster {start} can hold",
                entry.name(),
                entry.len()
            );
            return Err(Fat32Error::CorruptChain { start });
        }
        // The recorded size is untrusted until the chain backs it.
        let mut data = Vec::with_capacity(size.min(bytes_per_cluster as usize));
        for cluster in self.reader.chain(start) {
            let (_, bytes) = cluster?;
            data.extend_from_slice(&bytes);
            if data.len() >= size {
                data.truncate(size);
                return Ok(data);
            }
        }
        Err(Fat32Error::CorruptChain { start })
    }

    pub fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let entry = self.lookup(path)?;
        self.read_entry(&entry)
    }

    pub fn into_device(self) -> D {
        self.reader.into_device()
    }
}

/// Path components with any `X:` drive prefix, empty parts and `.` removed.
/// Both `/` and `\` separate components.
fn components(path: &str) -> Vec<&str> {
    let bytes = path.as_bytes();
    let path = if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
        &path[2..]
    } else {
        path
    };
    path.split(['/', '\\']).filter(|c| !c.is_empty() && *c != ".").collect()
}

/// Lookups ignore case, so the cache key does too.
fn cache_key(components: &[&str]) -> String {
    let mut key = String::new();
    for c in components {
        key.push('/');
        key.extend(c.chars().flat_map(char::to_lowercase));
    }
    key
}

impl<D: BlockDevice> MountableFs for Fat32Volume<D> {
    type Error = Fat32Error;

    fn volume_info(&self) -> VolumeInfo {
        VolumeInfo { id: self.id(), label: self.label(), free_bytes: self.free_bytes() }
    }

    fn dir_entries(&self, path: &str) -> Result<Vec<String>> {
        self.resolve(path)?.names()
    }

    fn dir_exists(&self, path: &str) -> bool {
        self.resolve(path).is_ok()
    }

    fn is_symlink(&self, _path: &str) -> bool {
        false
    }

    fn stat(&self, path: &str) -> Result<FileStat> {
        Ok(self.lookup(path)?.stat())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        Fat32Volume::read_file(self, path)
    }

    fn dir_mkdir(&self, path: &str) -> Result<()> {
        refuse("mkdir", path)
    }

    fn dir_delete(&self, path: &str) -> Result<()> {
        refuse("rmdir", path)
    }

    fn file_delete(&self, path: &str) -> Result<()> {
        refuse("delete", path)
    }

    fn file_rename(&self, from: &str, _to: &str) -> Result<()> {
        refuse("rename", from)
    }

    fn file_chmod(&self, path: &str, _mode: u32) -> Result<()> {
        refuse("chmod", path)
    }

    fn file_write(&self, path: &str, _data: &[u8]) -> Result<()> {
        refuse("write", path)
    }
}

fn refuse(op: &str, path: &str) -> Result<()> {
    debug!("fat32: {op} {path:?} refused, volume is read-only");
    Err(Fat32Error::Unsupported)
}
