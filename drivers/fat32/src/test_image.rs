//! Volume images for unit tests: hand-assembled ones for byte-exact cases,
//! and `fatfs`-formatted ones for "does it read what a real formatter wrote".

use std::io::{Cursor, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::device::{BlockDevice, DeviceError, MemDevice};
use crate::dir_entry::{lfn_checksum, FA_LFN, LFN_LAST, LFN_UNITS};
use crate::layout::{boot, fsinfo, DOS_SIGNATURE, FSINFO_LEAD_SIGNATURE, FSINFO_STRUCT_SIGNATURE, FSINFO_TRAIL_SIGNATURE};

pub(crate) const SERIAL: u32 = 0x1234_ABCD;

fn put(buf: &mut [u8], at: usize, bytes: &[u8]) {
    buf[at..at + bytes.len()].copy_from_slice(bytes);
}

#[derive(Clone, Copy)]
pub(crate) struct BootParams {
    pub bytes_per_sector:    u16,
    pub sectors_per_cluster: u8,
    pub reserved_sectors:    u16,
    pub num_fats:            u8,
    pub fat_size:            u32,
    pub total_sectors:       u32,
    pub root_cluster:        u32,
    pub fat_usage:           u16,
}

impl Default for BootParams {
    /// 128 one-sector clusters behind two 8-sector FATs.
    fn default() -> Self {
        Self {
            bytes_per_sector:    512,
            sectors_per_cluster: 1,
            reserved_sectors:    32,
            num_fats:            2,
            fat_size:            8,
            total_sectors:       32 + 2 * 8 + 128,
            root_cluster:        2,
            fat_usage:           0,
        }
    }
}

pub(crate) fn boot_sector(p: &BootParams) -> [u8; 512] {
    let mut b = [0u8; 512];
    put(&mut b, boot::JUMP_CODE, &[0xEB, 0x58, 0x90]);
    put(&mut b, boot::OEM_NAME, b"FAT32RO ");
    put(&mut b, boot::BYTES_PER_SECTOR, &p.bytes_per_sector.to_le_bytes());
    b[boot::SECTORS_PER_CLUSTER] = p.sectors_per_cluster;
    put(&mut b, boot::RESERVED_SECTORS, &p.reserved_sectors.to_le_bytes());
    b[boot::NUM_FATS] = p.num_fats;
    b[boot::MEDIA_TYPE] = 0xF8;
    put(&mut b, boot::NUM_SECTORS_32, &p.total_sectors.to_le_bytes());
    put(&mut b, boot::FAT_SIZE_32, &p.fat_size.to_le_bytes());
    put(&mut b, boot::FAT_USAGE, &p.fat_usage.to_le_bytes());
    put(&mut b, boot::ROOT_CLUSTER, &p.root_cluster.to_le_bytes());
    put(&mut b, boot::FSINFO_SECTOR, &1u16.to_le_bytes());
    put(&mut b, boot::BACKUP_BOOT_SECTOR, &6u16.to_le_bytes());
    b[boot::DRIVE_NUMBER] = 0x80;
    b[boot::EXT_SIGNATURE] = 0x29;
    put(&mut b, boot::SERIAL_NUMBER, &SERIAL.to_le_bytes());
    put(&mut b, boot::VOLUME_LABEL, b"TESTVOL    ");
    put(&mut b, boot::FS_LABEL, b"FAT32   ");
    put(&mut b, boot::SIGNATURE, &DOS_SIGNATURE.to_le_bytes());
    b
}

pub(crate) fn fsinfo_sector(free_clusters: u32, next_free: u32) -> [u8; 512] {
    let mut b = [0u8; 512];
    put(&mut b, fsinfo::LEAD_SIGNATURE, &FSINFO_LEAD_SIGNATURE.to_le_bytes());
    put(&mut b, fsinfo::STRUCT_SIGNATURE, &FSINFO_STRUCT_SIGNATURE.to_le_bytes());
    put(&mut b, fsinfo::FREE_CLUSTERS, &free_clusters.to_le_bytes());
    put(&mut b, fsinfo::NEXT_FREE, &next_free.to_le_bytes());
    put(&mut b, fsinfo::TRAIL_SIGNATURE, &FSINFO_TRAIL_SIGNATURE.to_le_bytes());
    b
}

/// An SFN record; `name` is the padded 11-byte form.
pub(crate) fn sfn_record(name: &[u8; 11], attr: u8, first_cluster: u32, size: u32) -> [u8; 32] {
    let mut r = [0u8; 32];
    put(&mut r, 0, name);
    r[11] = attr;
    put(&mut r, 20, &((first_cluster >> 16) as u16).to_le_bytes());
    put(&mut r, 26, &(first_cluster as u16).to_le_bytes());
    put(&mut r, 28, &size.to_le_bytes());
    r
}

/// LFN records for `long` in on-disk order (last-flagged record first).
pub(crate) fn lfn_records(long: &str, anchor: &[u8; 11]) -> Vec<[u8; 32]> {
    fn unit_offset(k: usize) -> usize {
        match k {
            0..=4 => 1 + 2 * k,
            5..=10 => 14 + 2 * (k - 5),
            _ => 28 + 2 * (k - 11),
        }
    }

    let units: Vec<u16> = long.encode_utf16().collect();
    let count = units.len().div_ceil(LFN_UNITS);
    let checksum = lfn_checksum(anchor);
    (1..=count)
        .rev()
        .map(|seq| {
            let mut r = [0u8; 32];
            r[0] = seq as u8 | if seq == count { LFN_LAST } else { 0 };
            r[11] = FA_LFN;
            r[13] = checksum;
            for k in 0..LFN_UNITS {
                let i = (seq - 1) * LFN_UNITS + k;
                let unit = match i.cmp(&units.len()) {
                    std::cmp::Ordering::Less => units[i],
                    std::cmp::Ordering::Equal => 0x0000,
                    std::cmp::Ordering::Greater => 0xFFFF,
                };
                put(&mut r, unit_offset(k), &unit.to_le_bytes());
            }
            r
        })
        .collect()
}

// ─── Hand-assembled image ──────────────────────────────────────────────────────

pub(crate) struct TestImage {
    params: BootParams,
    data:   Vec<u8>,
}

impl TestImage {
    /// Empty root directory in cluster 2.
    pub fn new() -> Self {
        Self::with_params(BootParams::default())
    }

    pub fn with_params(params: BootParams) -> Self {
        let size = params.total_sectors as usize * params.bytes_per_sector as usize;
        let mut img = Self { params, data: vec![0u8; size] };
        put(&mut img.data, 0, &boot_sector(&params));
        let fsinfo_at = params.bytes_per_sector as usize;
        put(&mut img.data, fsinfo_at, &fsinfo_sector(100, 3));
        img.set_fat(0, 0x0FFF_FFF8);
        img.set_fat(1, 0x0FFF_FFFF);
        img.set_fat(params.root_cluster, 0x0FFF_FFFF);
        img
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    fn bytes_per_cluster(&self) -> usize {
        self.params.bytes_per_sector as usize * self.params.sectors_per_cluster as usize
    }

    /// Writes the same value into every FAT copy.
    pub fn set_fat(&mut self, cluster: u32, value: u32) {
        let bps = self.params.bytes_per_sector as usize;
        for fat in 0..self.params.num_fats as usize {
            let at = self.params.reserved_sectors as usize * bps
                + fat * self.params.fat_size as usize * bps
                + cluster as usize * 4;
            put(&mut self.data, at, &value.to_le_bytes());
        }
    }

    pub fn cluster_offset(&self, cluster: u32) -> usize {
        let bps = self.params.bytes_per_sector as usize;
        let data_base = (self.params.reserved_sectors as usize
            + self.params.num_fats as usize * self.params.fat_size as usize)
            * bps;
        data_base + (cluster as usize - 2) * self.bytes_per_cluster()
    }

    pub fn fill_cluster(&mut self, cluster: u32, byte: u8) {
        let at = self.cluster_offset(cluster);
        let len = self.bytes_per_cluster();
        self.data[at..at + len].fill(byte);
    }

    pub fn write_record(&mut self, cluster: u32, slot: u32, record: &[u8; 32]) {
        let at = self.cluster_offset(cluster) + slot as usize * 32;
        put(&mut self.data, at, record);
    }

    /// Flip bits in one byte of a record.
    pub fn corrupt_record(&mut self, cluster: u32, slot: u32, byte: usize) {
        let at = self.cluster_offset(cluster) + slot as usize * 32 + byte;
        self.data[at] ^= 0x5A;
    }

    /// LFN records followed by their SFN; returns the slot after the entry.
    pub fn write_entry(
        &mut self,
        cluster: u32,
        slot: u32,
        long: &str,
        short: &[u8; 11],
        attr: u8,
        first_cluster: u32,
        size: u32,
    ) -> u32 {
        let mut slot = slot;
        for r in lfn_records(long, short) {
            self.write_record(cluster, slot, &r);
            slot += 1;
        }
        self.write_record(cluster, slot, &sfn_record(short, attr, first_cluster, size));
        slot + 1
    }

    /// A subdirectory in `cluster` with `.` and `..` and a one-cluster chain.
    pub fn make_dir(&mut self, cluster: u32, parent: u32) {
        self.set_fat(cluster, 0x0FFF_FFFF);
        let parent = if parent == self.params.root_cluster { 0 } else { parent };
        self.write_record(cluster, 0, &sfn_record(b".          ", 0x10, cluster, 0));
        self.write_record(cluster, 1, &sfn_record(b"..         ", 0x10, parent, 0));
    }

    pub fn into_device(self) -> MemDevice {
        MemDevice::new(self.data)
    }

    /// A device that counts its reads, and the shared counter.
    pub fn into_counting_device(self) -> (CountingDevice, Arc<AtomicUsize>) {
        let reads = Arc::new(AtomicUsize::new(0));
        let dev = CountingDevice { inner: self.into_device(), reads: Arc::clone(&reads) };
        (dev, reads)
    }
}

pub(crate) struct CountingDevice {
    inner: MemDevice,
    reads: Arc<AtomicUsize>,
}

impl BlockDevice for CountingDevice {
    fn seek(&mut self, offset: u64) -> Result<(), DeviceError> {
        self.inner.seek(offset)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<(), DeviceError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(buf)
    }
}

// ─── fatfs-formatted image ─────────────────────────────────────────────────────

/// A 40 MB FAT32 volume formatted by `fatfs`, with `dirs` created in order
/// and then `files` written. Paths use `/`.
pub(crate) fn fatfs_image(dirs: &[&str], files: &[(&str, &[u8])]) -> MemDevice {
    const SIZE: usize = 40 * 1024 * 1024;
    let mut disk = vec![0u8; SIZE];
    {
        let mut cursor = Cursor::new(&mut disk);
        fatfs::format_volume(
            &mut cursor,
            fatfs::FormatVolumeOptions::new()
                .fat_type(fatfs::FatType::Fat32)
                .volume_label(*b"FATFS_TEST "),
        )
        .expect("format_volume failed");
        let fs = fatfs::FileSystem::new(&mut cursor, fatfs::FsOptions::new())
            .expect("FileSystem::new failed");
        let root = fs.root_dir();
        for dir in dirs {
            root.create_dir(dir).expect("create_dir failed");
        }
        for (path, content) in files {
            let mut f = root.create_file(path).expect("create_file failed");
            f.truncate().unwrap();
            f.write_all(content).unwrap();
        }
    }
    MemDevice::new(disk)
}
