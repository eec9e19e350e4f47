//! Memo of land/water labels.
//!
//! The land/water layer is static, so a tile's terrain label is the same for
//! every date. The memo is keyed by the static tile's path and bounded; with a
//! capacity of at least the grid size nothing is ever recomputed.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use lru::LruCache;

use crate::classify::Terrain;
use crate::error::Result;

pub struct TerrainMemo {
    cache: LruCache<PathBuf, Terrain>,
    hits: u64,
    misses: u64,
}

impl TerrainMemo {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            cache: LruCache::new(capacity),
            hits: 0,
            misses: 0,
        }
    }

    /// Capacity of zero is bumped to one.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN))
    }

    /// Return the memoized label for `path`, computing it with `classify` on
    /// a miss. Errors from `classify` are not cached.
    pub fn get_or_classify<F>(&mut self, path: &Path, classify: F) -> Result<Terrain>
    where
        F: FnOnce(&Path) -> Result<Terrain>,
    {
        if let Some(terrain) = self.cache.get(path) {
            self.hits += 1;
            return Ok(*terrain);
        }
        let terrain = classify(path)?;
        self.misses += 1;
        self.cache.put(path.to_path_buf(), terrain);
        Ok(terrain)
    }

    pub fn peek(&self, path: &Path) -> Option<Terrain> {
        self.cache.peek(path).copied()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.cache.cap().get()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    /// Number of labels actually computed.
    pub fn misses(&self) -> u64 {
        self.misses
    }
}
