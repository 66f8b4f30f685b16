//! Directory enumeration and name lookup.

use alloc::string::String;
use alloc::vec::Vec;
use core::cell::OnceCell;
use core::iter::FusedIterator;

use crate::cluster::{ClusterChain, ClusterId, ClusterReader};
use crate::device::BlockDevice;
use crate::dir_entry::{
    Allocation, DirectoryEntry, EntryLocation, LfnChain, LongRecord, RawRecord, ShortRecord, RECORD_SIZE,
};
use crate::error::Result;

/// Which entries a lookup may return.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    Directory,
    File,
    Any,
}

impl EntryKind {
    pub fn admits(self, entry: &DirectoryEntry) -> bool {
        match self {
            EntryKind::Directory => entry.is_dir(),
            EntryKind::File => entry.is_file(),
            EntryKind::Any => true,
        }
    }
}

/// A directory's cluster chain read as 32-byte records.
///
/// The first full enumeration is kept for the lifetime of this value.
pub struct Directory<'a, D> {
    reader:  &'a ClusterReader<D>,
    cluster: ClusterId,
    cached:  OnceCell<Vec<DirectoryEntry>>,
}

impl<'a, D: BlockDevice> Directory<'a, D> {
    /// Cluster 0 (as stored in a `..` entry that points at the root) means the root.
    pub fn new(reader: &'a ClusterReader<D>, cluster: ClusterId) -> Self {
        let cluster = if cluster.is_free() { reader.geometry().root_cluster } else { cluster };
        Self { reader, cluster, cached: OnceCell::new() }
    }

    pub fn root(reader: &'a ClusterReader<D>) -> Self {
        Self::new(reader, reader.geometry().root_cluster)
    }

    pub fn cluster(&self) -> ClusterId {
        self.cluster
    }

    pub fn is_root(&self) -> bool {
        self.cluster == self.reader.geometry().root_cluster
    }

    /// Lazily decode live entries, one pass over the chain.
    pub fn enumerate(&self) -> Entries<'a, D> {
        Entries {
            chain:   self.reader.chain(self.cluster),
            current: None,
            pos:     0,
            pending: LfnChain::new(),
            done:    false,
        }
    }

    /// Every live entry, decoded once and then served from memory.
    pub fn entries(&self) -> Result<&[DirectoryEntry]> {
        if let Some(entries) = self.cached.get() {
            return Ok(entries);
        }
        let entries = self.enumerate().collect::<Result<Vec<_>>>()?;
        Ok(self.cached.get_or_init(|| entries))
    }

    /// Sorted, de-duplicated resolved names.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.entries()?.iter().map(|e| String::from(e.name())).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// First live entry of `kind` whose long or short name matches, ignoring case.
    ///
    /// Stops reading the chain at the first match.
    pub fn find_entry(&self, name: &str, kind: EntryKind) -> Result<Option<DirectoryEntry>> {
        let wanted = |e: &DirectoryEntry| kind.admits(e) && e.matches(name);
        if let Some(entries) = self.cached.get() {
            return Ok(entries.iter().find(|e| wanted(e)).cloned());
        }
        for entry in self.enumerate() {
            let entry = entry?;
            if wanted(&entry) {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}

/// Iterator behind [`Directory::enumerate`].
///
/// Ends at the end-of-directory marker or when the chain runs out, and after
/// the first error.
pub struct Entries<'a, D> {
    chain:   ClusterChain<'a, D>,
    current: Option<(ClusterId, Vec<u8>)>,
    pos:     usize,
    pending: LfnChain,
    done:    bool,
}

impl<D: BlockDevice> Entries<'_, D> {
    /// Next 32-byte record and where it lives, pulling clusters as needed.
    fn next_record(&mut self) -> Result<Option<(RawRecord, EntryLocation)>> {
        loop {
            if let Some((cluster, data)) = &self.current {
                if self.pos + RECORD_SIZE <= data.len() {
                    let location = EntryLocation { cluster: *cluster, offset: self.pos as u32 };
                    let record = RawRecord::from_slice(&data[self.pos..]);
                    self.pos += RECORD_SIZE;
                    if let Some(record) = record {
                        return Ok(Some((record, location)));
                    }
                    continue;
                }
            }
            match self.chain.next() {
                None => return Ok(None),
                Some(cluster) => {
                    self.current = Some(cluster?);
                    self.pos = 0;
                }
            }
        }
    }

    fn next_entry(&mut self) -> Result<Option<DirectoryEntry>> {
        while let Some((record, location)) = self.next_record()? {
            match record.allocation() {
                Allocation::EndOfDirectory => return Ok(None),
                Allocation::Deleted => {
                    self.pending.clear();
                    continue;
                }
                Allocation::Live => {}
            }
            if record.is_long_name() {
                self.pending.push(LongRecord::decode(&record));
                continue;
            }
            let short = ShortRecord::decode(&record);
            if short.is_volume_label() {
                self.pending.clear();
                continue;
            }
            let long_name = self.pending.fold(&short.name)?;
            let long_records = self.pending.len();
            self.pending = LfnChain::new();
            return Ok(Some(DirectoryEntry::decode(&short, long_name, location, long_records)));
        }
        Ok(None)
    }
}

impl<D: BlockDevice> Iterator for Entries<'_, D> {
    type Item = Result<DirectoryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.next_entry().transpose();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

impl<D: BlockDevice> FusedIterator for Entries<'_, D> {}
