//! LRU cache of decoded tiles for one open COG.

use lru::LruCache;
use std::num::NonZeroUsize;

/// LRU cache storing decompressed, predictor-reversed tile bytes by tile index.
pub struct TileCache {
    inner: LruCache<usize, Vec<u8>>,
}

impl TileCache {
    /// Create a new cache holding at most `capacity` tiles (at least one).
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(cap),
        }
    }

    pub fn get(&mut self, tile_idx: usize) -> Option<&Vec<u8>> {
        self.inner.get(&tile_idx)
    }

    pub fn contains(&self, tile_idx: usize) -> bool {
        self.inner.contains(&tile_idx)
    }

    pub fn insert(&mut self, tile_idx: usize, data: Vec<u8>) {
        self.inner.put(tile_idx, data);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_insert_get() {
        let mut cache = TileCache::new(2);
        cache.insert(5, vec![1, 2, 3]);
        assert_eq!(cache.get(5), Some(&vec![1, 2, 3]));
        assert!(cache.contains(5));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_eviction() {
        let mut cache = TileCache::new(2);
        cache.insert(0, vec![1]);
        cache.insert(1, vec![2]);
        cache.insert(2, vec![3]); // evicts 0

        assert!(cache.get(0).is_none());
        assert!(cache.get(1).is_some());
        assert!(cache.get(2).is_some());
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let mut cache = TileCache::new(0);
        cache.insert(0, vec![1]);
        assert_eq!(cache.len(), 1);
    }
}
