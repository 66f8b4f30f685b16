//! Volume geometry: everything derived from the boot sector and FSINFO.
//!
//! All offsets are computed once in [`VolumeGeometry::parse`] and frozen.

use alloc::string::String;
use alloc::vec::Vec;

use log::{trace, warn};

use crate::cluster::ClusterId;
use crate::device::{BlockDevice, DeviceError};
use crate::error::{Fat32Error, InvalidVolume, Result};
use crate::layout::{
    BootSector, FsInfo, BOOT_SECTOR_SIZE, FSINFO_SIZE, FU_ACTIVE_FAT_MASK, FU_ONE_FAT,
};

/// FSINFO value meaning "free count not known".
const FREE_COUNT_UNKNOWN: u32 = 0xFFFF_FFFF;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeGeometry {
    pub bytes_per_sector:    u32,
    pub sectors_per_cluster: u32,
    pub bytes_per_cluster:   u32,
    pub reserved_sectors:    u32,
    pub reserved_bytes:      u64,
    pub num_fats:            u32,
    pub fat_size_sectors:    u32,
    pub fat_size_bytes:      u64,
    pub fat_usage:           u16,
    /// Byte offset of the FAT consulted for chain walks.
    pub fat_base:            u64,
    /// Byte offset of cluster 2.
    pub data_base:           u64,
    pub root_cluster:        ClusterId,
    pub root_base:           u64,
    pub fsinfo_sector:       u16,
    pub total_sectors:       u32,
    /// Clusters in the data region, after clamping to what the FAT can address.
    pub total_clusters:      u32,
    /// `None` when FSINFO does not know (0xFFFFFFFF) or reports more than exist.
    pub free_clusters:       Option<u32>,
    pub next_free_hint:      u32,
    pub serial_number:       u32,
    pub volume_label:        [u8; 11],
    pub oem_name:            [u8; 8],
    pub fs_label:            [u8; 8],
    pub signature:           u16,
}

impl VolumeGeometry {
    /// Read the boot sector at byte 0 and the FSINFO sector it names, then parse.
    pub fn open<D: BlockDevice + ?Sized>(device: &mut D) -> Result<Self> {
        let raw = read_sector(device, 0, BOOT_SECTOR_SIZE)?;
        let boot = BootSector::from_bytes(&raw).ok_or(InvalidVolume::Unreadable(DeviceError::OutOfRange))?;
        // The FSINFO position comes from this sector, so it must hold up first.
        boot.validate()?;

        let fsinfo_at = u64::from(boot.fsinfo_sector()) * u64::from(boot.bytes_per_sector());
        let raw = read_sector(device, fsinfo_at, FSINFO_SIZE)?;
        let fsinfo = FsInfo::from_bytes(&raw).ok_or(InvalidVolume::Unreadable(DeviceError::OutOfRange))?;

        Self::parse(&boot, &fsinfo)
    }

    /// Validate both sectors and derive the frozen geometry.
    pub fn parse(boot: &BootSector, fsinfo: &FsInfo) -> Result<Self> {
        boot.validate()?;
        fsinfo.validate()?;

        let bytes_per_sector = u32::from(boot.bytes_per_sector());
        let sectors_per_cluster = u32::from(boot.sectors_per_cluster());
        let bytes_per_cluster = bytes_per_sector * sectors_per_cluster;
        let reserved_sectors = u32::from(boot.reserved_sectors());
        let reserved_bytes = u64::from(reserved_sectors) * u64::from(bytes_per_sector);
        let num_fats = u32::from(boot.num_fats());
        let fat_size_sectors = boot.fat_size_32();
        let fat_size_bytes = u64::from(fat_size_sectors) * u64::from(bytes_per_sector);

        let fat_usage = boot.fat_usage();
        let fat_base = if fat_usage & FU_ONE_FAT != 0 {
            reserved_bytes + fat_size_bytes * u64::from(fat_usage & FU_ACTIVE_FAT_MASK)
        } else {
            reserved_bytes
        };
        let data_base = reserved_bytes + fat_size_bytes * u64::from(num_fats);

        let total_sectors = boot.total_sectors();
        let meta_sectors = u64::from(reserved_sectors) + u64::from(num_fats) * u64::from(fat_size_sectors);
        let data_sectors = u64::from(total_sectors).saturating_sub(meta_sectors);
        let data_clusters = data_sectors / u64::from(sectors_per_cluster);
        // The FAT holds one 4-byte entry per cluster, including the two reserved ones.
        let fat_addressable = (fat_size_bytes / 4).saturating_sub(2);
        let total_clusters = u32::try_from(data_clusters.min(fat_addressable)).unwrap_or(ClusterId::MASK);

        let free_clusters = match fsinfo.free_clusters() {
            FREE_COUNT_UNKNOWN => None,
            n if n > total_clusters => {
                warn!("fat32: FSINFO free count {n} exceeds {total_clusters} clusters, ignoring");
                None
            }
            n => Some(n),
        };

        let mut geometry = Self {
            bytes_per_sector,
            sectors_per_cluster,
            bytes_per_cluster,
            reserved_sectors,
            reserved_bytes,
            num_fats,
            fat_size_sectors,
            fat_size_bytes,
            fat_usage,
            fat_base,
            data_base,
            root_cluster: ClusterId::new(boot.root_cluster()),
            root_base: 0,
            fsinfo_sector: boot.fsinfo_sector(),
            total_sectors,
            total_clusters,
            free_clusters,
            next_free_hint: fsinfo.next_free(),
            serial_number: boot.serial_number(),
            volume_label: boot.volume_label(),
            oem_name: boot.oem_name(),
            fs_label: boot.fs_label(),
            signature: boot.signature(),
        };
        geometry.root_base = geometry
            .cluster_to_byte(geometry.root_cluster)
            .map_err(|_| InvalidVolume::RootCluster(boot.root_cluster()))?;
        Ok(geometry)
    }

    /// Highest cluster id that addresses data on this volume.
    pub fn max_cluster(&self) -> u32 {
        self.total_clusters + 1
    }

    pub fn is_data_cluster(&self, id: ClusterId) -> bool {
        id >= ClusterId::FIRST_DATA && id.get() <= self.max_cluster()
    }

    /// Mirroring disabled: only the active FAT is current.
    pub fn single_active_fat(&self) -> bool {
        self.fat_usage & FU_ONE_FAT != 0
    }

    pub fn active_fat(&self) -> u8 {
        (self.fat_usage & FU_ACTIVE_FAT_MASK) as u8
    }

    /// A cheap sanity probe, weaker than the checks in [`parse`](Self::parse).
    pub fn is_mountable(&self) -> bool {
        self.fat_base != 0 && self.fat_size_bytes != 0 && self.root_base != 0
    }

    pub fn free_bytes(&self) -> u64 {
        u64::from(self.free_clusters.unwrap_or(0)) * u64::from(self.bytes_per_cluster)
    }

    pub fn label(&self) -> String {
        trimmed(&self.volume_label)
    }

    pub fn oem(&self) -> String {
        trimmed(&self.oem_name)
    }

    pub fn fs_type_label(&self) -> String {
        trimmed(&self.fs_label)
    }

    pub fn cluster_to_byte(&self, id: ClusterId) -> Result<u64> {
        if !self.is_data_cluster(id) {
            return Err(Fat32Error::BadClusterId(id.get()));
        }
        Ok(self.data_base + u64::from(id.get() - 2) * u64::from(self.bytes_per_cluster))
    }

    pub fn read_cluster<D: BlockDevice + ?Sized>(&self, device: &mut D, id: ClusterId) -> Result<Vec<u8>> {
        let at = self.cluster_to_byte(id)?;
        trace!("fat32: read cluster {id} @ {at:#x}");
        Ok(device.read_at(at, self.bytes_per_cluster as usize)?)
    }

    /// The 28-bit FAT entry for `id`.
    pub fn fat_entry<D: BlockDevice + ?Sized>(&self, device: &mut D, id: ClusterId) -> Result<u32> {
        let offset = u64::from(id.get()) * 4;
        if offset + 4 > self.fat_size_bytes {
            return Err(Fat32Error::BadClusterId(id.get()));
        }
        let raw = device.read_at(self.fat_base + offset, 4)?;
        Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) & ClusterId::MASK)
    }

    /// `None` at the end of the chain.
    pub fn next_cluster_id<D: BlockDevice + ?Sized>(&self, device: &mut D, id: ClusterId) -> Result<Option<ClusterId>> {
        let next = ClusterId::new(self.fat_entry(device, id)?);
        Ok((!next.is_end_of_chain()).then_some(next))
    }

    /// The following cluster and its bytes, `None` at the end of the chain.
    pub fn next_cluster<D: BlockDevice + ?Sized>(
        &self,
        device: &mut D,
        id: ClusterId,
    ) -> Result<Option<(ClusterId, Vec<u8>)>> {
        let Some(next) = self.next_cluster_id(device, id)? else {
            return Ok(None);
        };
        if next.is_damaged() {
            warn!("fat32: cluster {id} links to the damaged marker");
            return Err(Fat32Error::DamagedCluster(id));
        }
        let data = self.read_cluster(device, next)?;
        Ok(Some((next, data)))
    }
}

/// A sector the mount cannot do without; any device failure refuses the volume.
fn read_sector<D: BlockDevice + ?Sized>(device: &mut D, offset: u64, len: usize) -> Result<Vec<u8>> {
    device.read_at(offset, len).map_err(|e| {
        warn!("fat32: cannot read {len} bytes at {offset:#x}: {e}");
        Fat32Error::InvalidVolume(InvalidVolume::Unreadable(e))
    })
}

fn trimmed(raw: &[u8]) -> String {
    let end = raw.iter().rposition(|&b| b != b' ' && b != 0).map_or(0, |i| i + 1);
    raw[..end].iter().map(|&b| b as char).collect()
}
