use crate::path_cache::DEFAULT_CAPACITY;

/// Per-mount tunables.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MountOptions {
    /// Directories remembered by the path resolver. At least 1.
    pub path_cache_capacity: usize,
    /// Clusters a single chain may span before it is treated as looping.
    /// `None` uses the volume's data cluster count plus one.
    pub max_chain_len:       Option<u32>,
}

impl Default for MountOptions {
    fn default() -> Self {
        Self { path_cache_capacity: DEFAULT_CAPACITY, max_chain_len: None }
    }
}

impl MountOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path_cache_capacity(mut self, capacity: usize) -> Self {
        self.path_cache_capacity = capacity.max(1);
        self
    }

    pub fn max_chain_len(mut self, clusters: u32) -> Self {
        self.max_chain_len = Some(clusters.max(1));
        self
    }

    pub(crate) fn chain_limit(&self, total_clusters: u32) -> u32 {
        self.max_chain_len.unwrap_or(total_clusters.saturating_add(1))
    }
}
