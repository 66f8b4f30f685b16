//! Cluster ids and the FAT chain walker.

use alloc::vec::Vec;
use core::fmt;
use core::iter::FusedIterator;

use log::warn;
use spin::Mutex;

use crate::device::BlockDevice;
use crate::error::{Fat32Error, Result};
use crate::geometry::VolumeGeometry;

/// A 28-bit FAT cluster number. The top nibble of a FAT entry is reserved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ClusterId(u32);

impl ClusterId {
    pub const MASK: u32 = 0x0FFF_FFFF;

    pub const FREE: ClusterId = ClusterId(0);
    /// First cluster of the data region; 0 and 1 are reserved.
    pub const FIRST_DATA: ClusterId = ClusterId(2);
    pub const DAMAGED: ClusterId = ClusterId(0x0FFF_FFF7);
    /// Entries at or above this value terminate a chain.
    pub const END_OF_CHAIN: ClusterId = ClusterId(0x0FFF_FFF8);

    pub const fn new(raw: u32) -> Self {
        Self(raw & Self::MASK)
    }

    /// Combines the split high/low halves stored in a short-name record.
    pub const fn from_halves(hi: u16, lo: u16) -> Self {
        Self::new(((hi as u32) << 16) | lo as u32)
    }

    pub const fn get(self) -> u32 {
        self.0
    }

    pub const fn is_free(self) -> bool {
        self.0 == Self::FREE.0
    }

    pub const fn is_damaged(self) -> bool {
        self.0 == Self::DAMAGED.0
    }

    pub const fn is_end_of_chain(self) -> bool {
        self.0 >= Self::END_OF_CHAIN.0
    }
}

impl From<ClusterId> for u32 {
    fn from(id: ClusterId) -> u32 {
        id.0
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─── Device-bound reader ───────────────────────────────────────────────────────

/// Frozen geometry plus the device it was read from.
///
/// Each cluster or FAT read is a seek+read pair taken under the device lock,
/// so a reader can be shared between threads when `D: Send`.
pub struct ClusterReader<D> {
    geometry:    VolumeGeometry,
    device:      Mutex<D>,
    chain_limit: u32,
}

impl<D: BlockDevice> ClusterReader<D> {
    pub fn new(geometry: VolumeGeometry, device: D, chain_limit: u32) -> Self {
        Self { geometry, device: Mutex::new(device), chain_limit: chain_limit.max(1) }
    }

    pub fn geometry(&self) -> &VolumeGeometry {
        &self.geometry
    }

    /// Longest chain walked before it is declared corrupt.
    pub fn chain_limit(&self) -> u32 {
        self.chain_limit
    }

    pub fn read_cluster(&self, id: ClusterId) -> Result<Vec<u8>> {
        let mut dev = self.device.lock();
        self.geometry.read_cluster(&mut *dev, id)
    }

    pub fn next_cluster_id(&self, id: ClusterId) -> Result<Option<ClusterId>> {
        let mut dev = self.device.lock();
        self.geometry.next_cluster_id(&mut *dev, id)
    }

    pub fn next_cluster(&self, id: ClusterId) -> Result<Option<(ClusterId, Vec<u8>)>> {
        let mut dev = self.device.lock();
        self.geometry.next_cluster(&mut *dev, id)
    }

    /// Walk the chain starting at `start`.
    pub fn chain(&self, start: ClusterId) -> ClusterChain<'_, D> {
        ClusterChain { reader: self, start, state: ChainState::Start(start), visited: 0 }
    }

    pub fn into_device(self) -> D {
        self.device.into_inner()
    }
}

// ─── Chain walker ──────────────────────────────────────────────────────────────

enum ChainState {
    Start(ClusterId),
    After(ClusterId),
    Done,
}

/// Lazy, forward-only walk over `(cluster id, cluster bytes)` pairs.
///
/// The walk is cut off with `CorruptChain` after `chain_limit` clusters:
/// well-formed chains are acyclic, but a corrupt FAT can loop. After the
/// first error the iterator is exhausted.
pub struct ClusterChain<'a, D> {
    reader:  &'a ClusterReader<D>,
    start:   ClusterId,
    state:   ChainState,
    visited: u32,
}

impl<D: BlockDevice> ClusterChain<'_, D> {
    pub fn start(&self) -> ClusterId {
        self.start
    }

    fn step(&mut self) -> Result<Option<(ClusterId, Vec<u8>)>> {
        let item = match self.state {
            ChainState::Done => return Ok(None),
            ChainState::Start(id) => {
                self.check_bound()?;
                Some((id, self.reader.read_cluster(id)?))
            }
            ChainState::After(prev) => match self.reader.next_cluster(prev)? {
                None => None,
                Some(item) => {
                    self.check_bound()?;
                    Some(item)
                }
            },
        };
        self.state = match &item {
            Some((id, _)) => ChainState::After(*id),
            None => ChainState::Done,
        };
        Ok(item)
    }

    fn check_bound(&mut self) -> Result<()> {
        if self.visited >= self.reader.chain_limit {
            warn!(
                "fat32: chain from cluster {} exceeds {} clusters",
                self.start, self.reader.chain_limit
            );
            return Err(Fat32Error::CorruptChain { start: self.start });
        }
        self.visited += 1;
        Ok(())
    }
}

impl<D: BlockDevice> Iterator for ClusterChain<'_, D> {
    type Item = Result<(ClusterId, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.step() {
            Ok(item) => item.map(Ok),
            Err(e) => {
                self.state = ChainState::Done;
                Some(Err(e))
            }
        }
    }
}

impl<D: BlockDevice> FusedIterator for ClusterChain<'_, D> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_image::TestImage;

    fn reader(img: TestImage) -> ClusterReader<crate::device::MemDevice> {
        let mut dev = img.into_device();
        let geometry = VolumeGeometry::open(&mut dev).unwrap();
        let limit = geometry.total_clusters + 1;
        ClusterReader::new(geometry, dev, limit)
    }

    #[test]
    fn id_is_masked_to_28_bits() {
        assert_eq!(ClusterId::new(0xF000_0005).get(), 5);
        assert!(ClusterId::new(0xFFFF_FFFF).is_end_of_chain());
        assert!(ClusterId::new(0x0FFF_FFF8).is_end_of_chain());
        assert!(!ClusterId::new(0x0FFF_FFF7).is_end_of_chain());
        assert!(ClusterId::new(0x0FFF_FFF7).is_damaged());
    }

    #[test]
    fn halves_combine_high_first() {
        assert_eq!(ClusterId::from_halves(0x0001, 0x0002).get(), 0x0001_0002);
    }

    #[test]
    fn chain_yields_every_cluster_in_order() {
        let mut img = TestImage::new();
        img.set_fat(3, 7);
        img.set_fat(7, 4);
        img.set_fat(4, 0x0FFF_FFFF);
        img.fill_cluster(3, 0x33);
        img.fill_cluster(7, 0x77);
        img.fill_cluster(4, 0x44);

        let r = reader(img);
        let got: Vec<(u32, u8)> = r
            .chain(ClusterId::new(3))
            .map(|c| c.map(|(id, data)| (id.get(), data[0])).unwrap())
            .collect();
        assert_eq!(got, vec![(3, 0x33), (7, 0x77), (4, 0x44)]);
    }

    #[test]
    fn single_cluster_chain() {
        let mut img = TestImage::new();
        img.set_fat(9, 0x0FFF_FFF8);
        let r = reader(img);
        assert_eq!(r.chain(ClusterId::new(9)).count(), 1);
    }

    #[test]
    fn looping_chain_is_cut_off() {
        let mut img = TestImage::new();
        img.set_fat(5, 6);
        img.set_fat(6, 5);
        let r = reader(img);
        let results: Vec<_> = r.chain(ClusterId::new(5)).collect();
        let last = results.last().unwrap();
        assert_eq!(*last, Err(Fat32Error::CorruptChain { start: ClusterId::new(5) }));
        assert_eq!(results.len() as u32, r.chain_limit() + 1);
    }

    #[test]
    fn damaged_link_stops_the_walk() {
        let mut img = TestImage::new();
        img.set_fat(5, 6);
        img.set_fat(6, 0x0FFF_FFF7);
        let r = reader(img);
        let mut chain = r.chain(ClusterId::new(5));
        assert!(chain.next().unwrap().is_ok());
        assert!(chain.next().unwrap().is_ok());
        assert_eq!(chain.next(), Some(Err(Fat32Error::DamagedCluster(ClusterId::new(6)))));
        assert_eq!(chain.next(), None);
    }

    #[test]
    fn free_link_is_a_bad_id() {
        let mut img = TestImage::new();
        img.set_fat(5, 0);
        let r = reader(img);
        let results: Vec<_> = r.chain(ClusterId::new(5)).collect();
        assert_eq!(results[1], Err(Fat32Error::BadClusterId(0)));
    }
}
