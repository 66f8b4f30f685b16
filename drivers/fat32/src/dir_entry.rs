//! 32-byte directory records and the entries decoded from them.
//!
//! A logical entry is zero or more long-name (LFN) records followed by the
//! short-name (SFN) record that anchors them. LFN records are stored last
//! fragment first, so the name is assembled by walking them in reverse.

use alloc::string::String;
use alloc::vec::Vec;

use bitflags::bitflags;
use log::{debug, warn};
use vfs_api_types::{DateTime, FileKind, FileStat};

use crate::cluster::ClusterId;
use crate::dos_time;
use crate::error::{Fat32Error, Result};
use crate::layout::{le_u16, le_u32};

pub const RECORD_SIZE: usize = 32;

/// First-byte allocation markers.
pub const AF_END_OF_DIR: u8 = 0x00;
pub const AF_DELETED: u8 = 0xE5;
/// A live name whose real first byte is 0xE5.
pub const AF_KANJI_E5: u8 = 0x05;

/// Attribute byte of an LFN record (RO | HIDDEN | SYSTEM | VOLUME_LABEL).
pub const FA_LFN: u8 = 0x0F;
const FA_LFN_MASK: u8 = 0x3F;
/// Sequence-number flag on the last LFN record (the first one on disk).
pub const LFN_LAST: u8 = 0x40;
const LFN_ORDER_MASK: u8 = 0x1F;
pub const LFN_UNITS: usize = 13;

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct Attributes: u8 {
        const READ_ONLY    = 0x01;
        const HIDDEN       = 0x02;
        const SYSTEM       = 0x04;
        const VOLUME_LABEL = 0x08;
        const DIRECTORY    = 0x10;
        const ARCHIVE      = 0x20;
    }
}

// ─── Checksums and 8.3 names ───────────────────────────────────────────────────

/// Checksum over an 11-byte short name, carried by every LFN record of the entry.
pub fn lfn_checksum(short_name: &[u8; 11]) -> u8 {
    short_name.iter().fold(0u8, |csum, &b| {
        let high = if csum & 1 != 0 { 0x80u8 } else { 0 };
        high.wrapping_add(csum >> 1).wrapping_add(b)
    })
}

/// `"NAME    TXT"` → `"NAME.TXT"`; the dot only appears with an extension.
pub fn render_short_name(raw: &[u8; 11]) -> String {
    fn trim(part: &[u8]) -> &[u8] {
        let end = part.iter().rposition(|&b| b != b' ').map_or(0, |i| i + 1);
        &part[..end]
    }

    let (base, ext) = raw.split_at(8);
    let mut name: String = trim(base)
        .iter()
        .enumerate()
        .map(|(i, &b)| if i == 0 && b == AF_KANJI_E5 { AF_DELETED as char } else { b as char })
        .collect();
    let ext = trim(ext);
    if !ext.is_empty() {
        name.push('.');
        name.extend(ext.iter().map(|&b| b as char));
    }
    name
}

/// Pad an 8.3 name into its on-disk form, or `None` if it does not fit.
pub fn pack_short_name(name: &str) -> Option<[u8; 11]> {
    let mut raw = [b' '; 11];
    if name == "." || name == ".." {
        raw[..name.len()].copy_from_slice(name.as_bytes());
        return Some(raw);
    }
    let (base, ext) = match name.rsplit_once('.') {
        Some((base, ext)) => (base, ext),
        None => (name, ""),
    };
    let valid = |part: &str| part.bytes().all(|b| b.is_ascii_graphic() && b != b'.');
    if base.is_empty() || base.len() > 8 || ext.len() > 3 || !valid(base) || !valid(ext) {
        return None;
    }
    raw[..base.len()].copy_from_slice(base.as_bytes());
    raw[8..8 + ext.len()].copy_from_slice(ext.as_bytes());
    Some(raw)
}

// ─── Raw records ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Allocation {
    /// No live records follow in this directory.
    EndOfDirectory,
    Deleted,
    Live,
}

#[derive(Clone, Copy)]
pub struct RawRecord([u8; RECORD_SIZE]);

impl RawRecord {
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let raw: [u8; RECORD_SIZE] = bytes.get(..RECORD_SIZE)?.try_into().ok()?;
        Some(Self(raw))
    }

    pub fn allocation(&self) -> Allocation {
        match self.0[0] {
            AF_END_OF_DIR => Allocation::EndOfDirectory,
            AF_DELETED => Allocation::Deleted,
            _ => Allocation::Live,
        }
    }

    pub fn attribute_byte(&self) -> u8 {
        self.0[11]
    }

    pub fn is_long_name(&self) -> bool {
        self.attribute_byte() & FA_LFN_MASK == FA_LFN
    }
}

/// The fixed fields of a short-name record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ShortRecord {
    pub name:          [u8; 11],
    pub attributes:    Attributes,
    pub ctime_tenths:  u8,
    pub ctime_hms:     u16,
    pub ctime_day:     u16,
    pub atime_day:     u16,
    pub mtime_hms:     u16,
    pub mtime_day:     u16,
    pub first_cluster: ClusterId,
    pub file_size:     u32,
}

impl ShortRecord {
    pub fn decode(raw: &RawRecord) -> Self {
        let b = &raw.0;
        let mut name = [0u8; 11];
        name.copy_from_slice(&b[0..11]);
        Self {
            name,
            attributes:    Attributes::from_bits_retain(b[11]),
            ctime_tenths:  b[13],
            ctime_hms:     le_u16(b, 14),
            ctime_day:     le_u16(b, 16),
            atime_day:     le_u16(b, 18),
            mtime_hms:     le_u16(b, 22),
            mtime_day:     le_u16(b, 24),
            first_cluster: ClusterId::from_halves(le_u16(b, 20), le_u16(b, 26)),
            file_size:     le_u32(b, 28),
        }
    }

    pub fn is_volume_label(&self) -> bool {
        self.attributes.contains(Attributes::VOLUME_LABEL)
    }
}

/// One long-name fragment record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LongRecord {
    pub sequence: u8,
    pub units:    [u16; LFN_UNITS],
    pub checksum: u8,
}

impl LongRecord {
    pub fn decode(raw: &RawRecord) -> Self {
        let b = &raw.0;
        let mut units = [0u16; LFN_UNITS];
        // 5 units at 1, 6 at 14, 2 at 28.
        let spans = [(1usize, 5usize), (14, 6), (28, 2)];
        let mut i = 0;
        for (start, count) in spans {
            for k in 0..count {
                units[i] = le_u16(b, start + 2 * k);
                i += 1;
            }
        }
        Self { sequence: b[0], units, checksum: b[13] }
    }

    pub fn is_last(&self) -> bool {
        self.sequence & LFN_LAST != 0
    }

    pub fn order(&self) -> u8 {
        self.sequence & LFN_ORDER_MASK
    }

    /// Name units with the 0x0000 terminator and 0xFFFF padding removed.
    pub fn fragment(&self) -> impl Iterator<Item = u16> + '_ {
        self.units.iter().copied().take_while(|&u| u != 0x0000 && u != 0xFFFF)
    }
}

/// Long-name records collected ahead of their short-name anchor.
///
/// Records are buffered in on-disk order and only turned into a name by
/// [`fold`](Self::fold) once the anchor is known.
#[derive(Default)]
pub struct LfnChain {
    records: Vec<LongRecord>,
}

impl LfnChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        if !self.records.is_empty() {
            debug!("fat32: dropping {} orphaned long-name records", self.records.len());
        }
        self.records.clear();
    }

    pub fn push(&mut self, record: LongRecord) {
        if record.is_last() {
            self.clear();
            self.records.push(record);
        } else if self.records.is_empty() {
            debug!("fat32: long-name record {} has no head, skipping", record.order());
        } else {
            self.records.push(record);
        }
    }

    /// Check every record against the anchor and assemble the name.
    ///
    /// Leaves the buffer untouched; `Ok(None)` when no records were collected.
    pub fn fold(&self, anchor: &[u8; 11]) -> Result<Option<String>> {
        let Some(head) = self.records.first() else {
            return Ok(None);
        };
        if let Some(odd) = self.records.iter().find(|r| r.checksum != head.checksum) {
            warn!("fat32: long-name records disagree on checksum");
            return Err(Fat32Error::ChecksumMismatch { expected: head.checksum, found: odd.checksum });
        }
        let expected = lfn_checksum(anchor);
        if head.checksum != expected {
            warn!("fat32: long name does not belong to {:?}", render_short_name(anchor));
            return Err(Fat32Error::ChecksumMismatch { expected, found: head.checksum });
        }
        let units = self.records.iter().rev().flat_map(LongRecord::fragment);
        Ok(Some(
            char::decode_utf16(units).map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER)).collect(),
        ))
    }
}

// ─── Decoded entry ─────────────────────────────────────────────────────────────

/// Where an entry's short-name record sits: directory cluster and byte offset in it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct EntryLocation {
    pub cluster: ClusterId,
    pub offset:  u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    name:          String,
    short_name:    String,
    raw_name:      [u8; 11],
    has_long_name: bool,
    attributes:    Attributes,
    first_cluster: ClusterId,
    length:        u32,
    created:       DateTime,
    accessed:      DateTime,
    modified:      DateTime,
    checksum:      u8,
    location:      EntryLocation,
    /// Short-name record plus its long-name records.
    record_count:  usize,
}

impl DirectoryEntry {
    /// Build from an anchor and its already-folded long name.
    pub fn decode(
        short: &ShortRecord,
        long_name: Option<String>,
        location: EntryLocation,
        long_records: usize,
    ) -> Self {
        let short_name = render_short_name(&short.name);
        let is_dir = short.attributes.contains(Attributes::DIRECTORY);
        Self {
            name: long_name.clone().unwrap_or_else(|| short_name.clone()),
            has_long_name: long_name.is_some(),
            short_name,
            raw_name: short.name,
            attributes: short.attributes,
            first_cluster: short.first_cluster,
            length: if is_dir { 0 } else { short.file_size },
            created: dos_time::decode_with_hundredths(short.ctime_day, short.ctime_hms, short.ctime_tenths),
            accessed: dos_time::decode(short.atime_day, 0),
            modified: dos_time::decode(short.mtime_day, short.mtime_hms),
            checksum: lfn_checksum(&short.name),
            location,
            record_count: long_records + 1,
        }
    }

    /// The pseudo-entry standing for the root directory, which has no record.
    pub fn root(root_cluster: ClusterId) -> Self {
        let raw_name = [b' '; 11];
        let epoch = dos_time::decode(0, 0);
        Self {
            name: String::from("/"),
            short_name: String::from("/"),
            raw_name,
            has_long_name: false,
            attributes: Attributes::DIRECTORY,
            first_cluster: root_cluster,
            length: 0,
            created: epoch,
            accessed: epoch,
            modified: epoch,
            checksum: lfn_checksum(&raw_name),
            location: EntryLocation::default(),
            record_count: 0,
        }
    }

    /// Long name when present, else the short name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }

    pub fn long_name(&self) -> Option<&str> {
        self.has_long_name.then_some(self.name.as_str())
    }

    pub fn raw_short_name(&self) -> &[u8; 11] {
        &self.raw_name
    }

    pub fn attributes(&self) -> Attributes {
        self.attributes
    }

    pub fn is_dir(&self) -> bool {
        self.attributes.contains(Attributes::DIRECTORY)
    }

    pub fn is_file(&self) -> bool {
        !self.is_dir()
    }

    pub fn is_read_only(&self) -> bool {
        self.attributes.contains(Attributes::READ_ONLY)
    }

    pub fn first_cluster(&self) -> ClusterId {
        self.first_cluster
    }

    /// Byte length; always 0 for directories.
    pub fn len(&self) -> u32 {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn created(&self) -> DateTime {
        self.created
    }

    pub fn accessed(&self) -> DateTime {
        self.accessed
    }

    pub fn modified(&self) -> DateTime {
        self.modified
    }

    pub fn checksum(&self) -> u8 {
        self.checksum
    }

    pub fn location(&self) -> EntryLocation {
        self.location
    }

    pub fn record_count(&self) -> usize {
        self.record_count
    }

    /// Case-insensitive match on the resolved name, then the short name.
    pub fn matches(&self, name: &str) -> bool {
        eq_ignore_case(&self.name, name) || eq_ignore_case(&self.short_name, name)
    }

    pub fn stat(&self) -> FileStat {
        FileStat {
            kind:      if self.is_dir() { FileKind::Directory } else { FileKind::File },
            size:      u64::from(self.length),
            created:   self.created,
            accessed:  self.accessed,
            modified:  self.modified,
            read_only: self.is_read_only(),
        }
    }
}

fn eq_ignore_case(a: &str, b: &str) -> bool {
    a.chars().flat_map(char::to_lowercase).eq(b.chars().flat_map(char::to_lowercase))
}
