//! On-disk records read at mount: the boot sector and the FSINFO sector.
//!
//! Both are fixed little-endian layouts. They are kept as byte arrays with
//! offset accessors rather than packed structs so no unaligned reference is
//! ever taken.

pub const BOOT_SECTOR_SIZE: usize = 512;
pub const FSINFO_SIZE: usize = 512;

pub const DOS_SIGNATURE: u16 = 0xAA55;
/// "RRaA"
pub const FSINFO_LEAD_SIGNATURE: u32 = 0x4161_5252;
/// "rrAa"
pub const FSINFO_STRUCT_SIGNATURE: u32 = 0x6141_7272;
pub const FSINFO_TRAIL_SIGNATURE: u32 = 0xAA55_0000;

/// `fat_usage` bit: mirroring disabled, only the active FAT is current.
pub const FU_ONE_FAT: u16 = 0x0080;
pub const FU_ACTIVE_FAT_MASK: u16 = 0x000F;

/// Byte offsets inside the boot sector.
pub mod boot {
    pub const JUMP_CODE: usize = 0;
    pub const OEM_NAME: usize = 3;
    pub const BYTES_PER_SECTOR: usize = 11;
    pub const SECTORS_PER_CLUSTER: usize = 13;
    pub const RESERVED_SECTORS: usize = 14;
    pub const NUM_FATS: usize = 16;
    pub const MAX_ROOT: usize = 17;
    pub const NUM_SECTORS_16: usize = 19;
    pub const MEDIA_TYPE: usize = 21;
    pub const FAT_SIZE_16: usize = 22;
    pub const SECTORS_PER_TRACK: usize = 24;
    pub const NUM_HEADS: usize = 26;
    pub const HIDDEN_SECTORS: usize = 28;
    pub const NUM_SECTORS_32: usize = 32;
    pub const FAT_SIZE_32: usize = 36;
    pub const FAT_USAGE: usize = 40;
    pub const VERSION: usize = 42;
    pub const ROOT_CLUSTER: usize = 44;
    pub const FSINFO_SECTOR: usize = 48;
    pub const BACKUP_BOOT_SECTOR: usize = 50;
    pub const DRIVE_NUMBER: usize = 64;
    pub const EXT_SIGNATURE: usize = 66;
    pub const SERIAL_NUMBER: usize = 67;
    pub const VOLUME_LABEL: usize = 71;
    pub const FS_LABEL: usize = 82;
    pub const SIGNATURE: usize = 510;
}

/// Byte offsets inside the FSINFO sector.
pub mod fsinfo {
    pub const LEAD_SIGNATURE: usize = 0;
    pub const STRUCT_SIGNATURE: usize = 484;
    pub const FREE_CLUSTERS: usize = 488;
    pub const NEXT_FREE: usize = 492;
    pub const TRAIL_SIGNATURE: usize = 508;
}

#[inline]
pub(crate) fn le_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

#[inline]
pub(crate) fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn array<const N: usize>(bytes: &[u8], at: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[at..at + N]);
    out
}

// ─── Boot sector ───────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct BootSector([u8; BOOT_SECTOR_SIZE]);

impl BootSector {
    /// `None` if fewer than 512 bytes are supplied.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw = bytes.get(..BOOT_SECTOR_SIZE)?;
        Some(Self(array(raw, 0)))
    }

    pub fn as_bytes(&self) -> &[u8; BOOT_SECTOR_SIZE] {
        &self.0
    }

    pub fn jump_code(&self) -> [u8; 3] { array(&self.0, boot::JUMP_CODE) }
    pub fn oem_name(&self) -> [u8; 8] { array(&self.0, boot::OEM_NAME) }
    pub fn bytes_per_sector(&self) -> u16 { le_u16(&self.0, boot::BYTES_PER_SECTOR) }
    pub fn sectors_per_cluster(&self) -> u8 { self.0[boot::SECTORS_PER_CLUSTER] }
    pub fn reserved_sectors(&self) -> u16 { le_u16(&self.0, boot::RESERVED_SECTORS) }
    pub fn num_fats(&self) -> u8 { self.0[boot::NUM_FATS] }
    pub fn max_root(&self) -> u16 { le_u16(&self.0, boot::MAX_ROOT) }
    pub fn num_sectors_16(&self) -> u16 { le_u16(&self.0, boot::NUM_SECTORS_16) }
    pub fn media_type(&self) -> u8 { self.0[boot::MEDIA_TYPE] }
    pub fn fat_size_16(&self) -> u16 { le_u16(&self.0, boot::FAT_SIZE_16) }
    pub fn sectors_per_track(&self) -> u16 { le_u16(&self.0, boot::SECTORS_PER_TRACK) }
    pub fn num_heads(&self) -> u16 { le_u16(&self.0, boot::NUM_HEADS) }
    pub fn hidden_sectors(&self) -> u32 { le_u32(&self.0, boot::HIDDEN_SECTORS) }
    pub fn num_sectors_32(&self) -> u32 { le_u32(&self.0, boot::NUM_SECTORS_32) }
    pub fn fat_size_32(&self) -> u32 { le_u32(&self.0, boot::FAT_SIZE_32) }
    pub fn fat_usage(&self) -> u16 { le_u16(&self.0, boot::FAT_USAGE) }
    pub fn version(&self) -> u16 { le_u16(&self.0, boot::VERSION) }
    pub fn root_cluster(&self) -> u32 { le_u32(&self.0, boot::ROOT_CLUSTER) }
    pub fn fsinfo_sector(&self) -> u16 { le_u16(&self.0, boot::FSINFO_SECTOR) }
    pub fn backup_boot_sector(&self) -> u16 { le_u16(&self.0, boot::BACKUP_BOOT_SECTOR) }
    pub fn drive_number(&self) -> u8 { self.0[boot::DRIVE_NUMBER] }
    pub fn ext_signature(&self) -> u8 { self.0[boot::EXT_SIGNATURE] }
    pub fn serial_number(&self) -> u32 { le_u32(&self.0, boot::SERIAL_NUMBER) }
    pub fn volume_label(&self) -> [u8; 11] { array(&self.0, boot::VOLUME_LABEL) }
    pub fn fs_label(&self) -> [u8; 8] { array(&self.0, boot::FS_LABEL) }
    pub fn signature(&self) -> u16 { le_u16(&self.0, boot::SIGNATURE) }

    /// The 16-bit sector count when set, else the 32-bit one.
    pub fn total_sectors(&self) -> u32 {
        match self.num_sectors_16() {
            0 => self.num_sectors_32(),
            n => u32::from(n),
        }
    }

    /// Field checks that need nothing but the boot sector itself.
    pub fn validate(&self) -> Result<(), crate::error::InvalidVolume> {
        use crate::error::InvalidVolume as Why;

        if self.signature() != DOS_SIGNATURE {
            return Err(Why::BootSignature(self.signature()));
        }
        if self.max_root() != 0 {
            return Err(Why::FixedRootArea(self.max_root()));
        }
        if self.fat_size_32() == 0 {
            return Err(Why::ZeroFatSize);
        }
        if self.num_sectors_16() == 0 && self.num_sectors_32() == 0 {
            return Err(Why::NoSectorCount);
        }
        if self.bytes_per_sector() == 0 {
            return Err(Why::ZeroBytesPerSector);
        }
        if self.sectors_per_cluster() == 0 {
            return Err(Why::ZeroSectorsPerCluster);
        }
        if self.fsinfo_sector() >= self.reserved_sectors() {
            return Err(Why::FsInfoOutsideReserved {
                fsinfo_sector:    self.fsinfo_sector(),
                reserved_sectors: self.reserved_sectors(),
            });
        }
        if self.root_cluster() < 2 {
            return Err(Why::RootCluster(self.root_cluster()));
        }
        let usage = self.fat_usage();
        let active = (usage & FU_ACTIVE_FAT_MASK) as u8;
        if usage & FU_ONE_FAT != 0 && active >= self.num_fats() {
            return Err(Why::ActiveFatOutOfRange { active, num_fats: self.num_fats() });
        }
        Ok(())
    }
}

// ─── FSINFO ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct FsInfo([u8; FSINFO_SIZE]);

impl FsInfo {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw = bytes.get(..FSINFO_SIZE)?;
        Some(Self(array(raw, 0)))
    }

    pub fn lead_signature(&self) -> u32 { le_u32(&self.0, fsinfo::LEAD_SIGNATURE) }
    pub fn struct_signature(&self) -> u32 { le_u32(&self.0, fsinfo::STRUCT_SIGNATURE) }
    pub fn free_clusters(&self) -> u32 { le_u32(&self.0, fsinfo::FREE_CLUSTERS) }
    pub fn next_free(&self) -> u32 { le_u32(&self.0, fsinfo::NEXT_FREE) }
    pub fn trail_signature(&self) -> u32 { le_u32(&self.0, fsinfo::TRAIL_SIGNATURE) }

    pub fn validate(&self) -> Result<(), crate::error::InvalidVolume> {
        use crate::error::InvalidVolume as Why;

        if self.lead_signature() != FSINFO_LEAD_SIGNATURE {
            return Err(Why::FsInfoLeadSignature(self.lead_signature()));
        }
        if self.struct_signature() != FSINFO_STRUCT_SIGNATURE {
            return Err(Why::FsInfoStructSignature(self.struct_signature()));
        }
        if self.trail_signature() != FSINFO_TRAIL_SIGNATURE {
            return Err(Why::FsInfoTrailSignature(self.trail_signature()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvalidVolume;
    use crate::test_image::{boot_sector, fsinfo_sector, BootParams};

    #[test]
    fn signatures_spell_their_magic() {
        assert_eq!(&FSINFO_LEAD_SIGNATURE.to_le_bytes(), b"RRaA");
        assert_eq!(&FSINFO_STRUCT_SIGNATURE.to_le_bytes(), b"rrAa");
    }

    #[test]
    fn reads_fields_at_their_offsets() {
        let bs = BootSector::from_bytes(&boot_sector(&BootParams::default())).unwrap();
        assert_eq!(bs.bytes_per_sector(), 512);
        assert_eq!(bs.sectors_per_cluster(), 1);
        assert_eq!(bs.reserved_sectors(), 32);
        assert_eq!(bs.num_fats(), 2);
        assert_eq!(bs.root_cluster(), 2);
        assert_eq!(bs.fsinfo_sector(), 1);
        assert_eq!(&bs.fs_label(), b"FAT32   ");
        assert_eq!(bs.signature(), DOS_SIGNATURE);
        assert!(bs.validate().is_ok());
    }

    #[test]
    fn short_input_is_rejected() {
        assert!(BootSector::from_bytes(&[0u8; 100]).is_none());
        assert!(FsInfo::from_bytes(&[0u8; 511]).is_none());
    }

    #[test]
    fn sixteen_bit_sector_count_wins_when_set() {
        let mut raw = boot_sector(&BootParams::default());
        raw[boot::NUM_SECTORS_16..boot::NUM_SECTORS_16 + 2].copy_from_slice(&100u16.to_le_bytes());
        let bs = BootSector::from_bytes(&raw).unwrap();
        assert_eq!(bs.total_sectors(), 100);
    }

    #[test]
    fn each_mount_check_has_a_reason() {
        let cases: [(usize, &[u8], InvalidVolume); 5] = [
            (boot::SIGNATURE, &[0, 0], InvalidVolume::BootSignature(0)),
            (boot::MAX_ROOT, &[0, 2], InvalidVolume::FixedRootArea(512)),
            (boot::FAT_SIZE_32, &[0, 0, 0, 0], InvalidVolume::ZeroFatSize),
            (boot::BYTES_PER_SECTOR, &[0, 0], InvalidVolume::ZeroBytesPerSector),
            (boot::SECTORS_PER_CLUSTER, &[0], InvalidVolume::ZeroSectorsPerCluster),
        ];
        for (at, bytes, why) in cases {
            let mut raw = boot_sector(&BootParams::default());
            raw[at..at + bytes.len()].copy_from_slice(bytes);
            let bs = BootSector::from_bytes(&raw).unwrap();
            assert_eq!(bs.validate(), Err(why), "patch at offset {at}");
        }
    }

    #[test]
    fn active_fat_must_exist_when_mirroring_is_off() {
        let params = BootParams { fat_usage: FU_ONE_FAT | 2, ..BootParams::default() };
        let bs = BootSector::from_bytes(&boot_sector(&params)).unwrap();
        assert_eq!(
            bs.validate(),
            Err(InvalidVolume::ActiveFatOutOfRange { active: 2, num_fats: 2 })
        );
    }

    #[test]
    fn fsinfo_trail_signature_is_checked() {
        let mut raw = fsinfo_sector(100, 3);
        assert!(FsInfo::from_bytes(&raw).unwrap().validate().is_ok());

        raw[fsinfo::TRAIL_SIGNATURE + 2] = 0;
        let info = FsInfo::from_bytes(&raw).unwrap();
        assert_eq!(info.validate(), Err(InvalidVolume::FsInfoTrailSignature(0xAA00_0000)));
        assert_eq!(info.free_clusters(), 100);
        assert_eq!(info.next_free(), 3);
    }
}
