//! Bounded LRU map from normalized directory path to its first cluster.

use alloc::collections::BTreeMap;
use alloc::string::String;

use log::debug;

use crate::cluster::ClusterId;

pub const DEFAULT_CAPACITY: usize = 50;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheStats {
    pub hits:     u64,
    pub misses:   u64,
    pub len:      usize,
    pub capacity: usize,
}

struct Slot {
    cluster:   ClusterId,
    last_used: u64,
}

pub struct PathCache {
    capacity: usize,
    slots:    BTreeMap<String, Slot>,
    /// Logical clock; bumped on every hit and insert.
    tick:     u64,
    hits:     u64,
    misses:   u64,
}

impl PathCache {
    /// `capacity` is clamped to at least one slot.
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), slots: BTreeMap::new(), tick: 0, hits: 0, misses: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&mut self, path: &str) -> Option<ClusterId> {
        self.tick += 1;
        match self.slots.get_mut(path) {
            Some(slot) => {
                slot.last_used = self.tick;
                self.hits += 1;
                Some(slot.cluster)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    /// Insert or refresh; evicts the least recently used path when full.
    pub fn insert(&mut self, path: String, cluster: ClusterId) {
        self.tick += 1;
        if let Some(slot) = self.slots.get_mut(&path) {
            slot.cluster = cluster;
            slot.last_used = self.tick;
            return;
        }
        if self.slots.len() >= self.capacity {
            let oldest = self
                .slots
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(path, _)| path.clone());
            if let Some(oldest) = oldest {
                debug!("fat32: path cache full, evicting {oldest:?}");
                self.slots.remove(&oldest);
            }
        }
        self.slots.insert(path, Slot { cluster, last_used: self.tick });
    }

    pub fn contains(&self, path: &str) -> bool {
        self.slots.contains_key(path)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats { hits: self.hits, misses: self.misses, len: self.slots.len(), capacity: self.capacity }
    }
}

impl Default for PathCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
