//! Shared LRU cache of decoded table blocks.
//!
//! Entries are charged by their encoded size; once usage exceeds capacity
//! the least recently used blocks are evicted. One cache can serve several
//! databases: every open table draws its own id from the cache, and keys
//! carry that id rather than the file number.

use crate::table::Block;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// `(table cache id, block offset)`
pub(crate) type CacheKey = (u64, u64);

struct CacheEntry {
    block: Arc<Block>,
    charge: usize,
    tick: u64,
}

#[derive(Default)]
struct LruState {
    map: HashMap<CacheKey, CacheEntry>,
    order: BTreeMap<u64, CacheKey>,
    tick: u64,
    usage: usize,
}

impl LruState {
    fn touch(&mut self, key: CacheKey) -> Option<Arc<Block>> {
        self.tick += 1;
        let tick = self.tick;
        let entry = self.map.get_mut(&key)?;
        self.order.remove(&entry.tick);
        entry.tick = tick;
        self.order.insert(tick, key);
        Some(Arc::clone(&entry.block))
    }

    fn remove(&mut self, key: &CacheKey) {
        if let Some(entry) = self.map.remove(key) {
            self.order.remove(&entry.tick);
            self.usage -= entry.charge;
        }
    }
}

/// A byte-bounded LRU cache of table blocks.
pub struct BlockCache {
    capacity: usize,
    state: Mutex<LruState>,
    hits: AtomicU64,
    misses: AtomicU64,
    next_id: AtomicU64,
}

impl fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCache")
            .field("capacity", &self.capacity)
            .field("usage", &self.usage())
            .finish_non_exhaustive()
    }
}

impl BlockCache {
    /// Creates a cache holding up to `capacity` bytes of blocks.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(LruState::default()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            next_id: AtomicU64::new(1),
        }
    }

    /// Maximum bytes held.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently held.
    pub fn usage(&self) -> usize {
        self.state.lock().usage
    }

    /// Number of cached blocks.
    pub fn len(&self) -> usize {
        self.state.lock().map.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lookups served from the cache.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Lookups that had to read from a table file.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// A key prefix no other table using this cache has been given.
    pub(crate) fn new_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn lookup(&self, key: CacheKey) -> Option<Arc<Block>> {
        let found = self.state.lock().touch(key);
        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub(crate) fn insert(&self, key: CacheKey, block: Arc<Block>, charge: usize) {
        if charge > self.capacity {
            return;
        }
        let mut state = self.state.lock();
        state.remove(&key);

        while state.usage + charge > self.capacity {
            let Some((_, victim)) = state.order.pop_first() else {
                break;
            };
            if let Some(entry) = state.map.remove(&victim) {
                state.usage -= entry.charge;
            }
        }

        state.tick += 1;
        let tick = state.tick;
        state.order.insert(tick, key);
        state.map.insert(
            key,
            CacheEntry {
                block,
                charge,
                tick,
            },
        );
        state.usage += charge;
    }

    /// Drops every block cached under `cache_id`.
    pub(crate) fn erase_table(&self, cache_id: u64) {
        let mut state = self.state.lock();
        let keys: Vec<CacheKey> = state
            .map
            .keys()
            .filter(|(id, _)| *id == cache_id)
            .copied()
            .collect();
        for key in keys {
            state.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{Block, BlockBuilder};

    fn block() -> Arc<Block> {
        let mut builder = BlockBuilder::default();
        Arc::new(Block::decode(&builder.finish(), true).unwrap())
    }

    #[test]
    fn lookup_counts_hits_and_misses() {
        let cache = BlockCache::new(100);
        assert!(cache.lookup((1, 0)).is_none());
        cache.insert((1, 0), block(), 10);
        assert!(cache.lookup((1, 0)).is_some());
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.usage(), 10);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = BlockCache::new(30);
        cache.insert((1, 0), block(), 10);
        cache.insert((1, 10), block(), 10);
        cache.insert((1, 20), block(), 10);
        assert!(cache.lookup((1, 0)).is_some());

        cache.insert((2, 0), block(), 10);
        assert!(cache.lookup((1, 10)).is_none());
        assert!(cache.lookup((1, 0)).is_some());
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.usage(), 30);
    }

    #[test]
    fn oversized_blocks_are_not_cached() {
        let cache = BlockCache::new(5);
        cache.insert((1, 0), block(), 6);
        assert!(cache.is_empty());
    }

    #[test]
    fn reinsert_replaces_charge() {
        let cache = BlockCache::new(100);
        cache.insert((1, 0), block(), 40);
        cache.insert((1, 0), block(), 20);
        assert_eq!(cache.usage(), 20);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn erase_table_drops_only_that_table() {
        let cache = BlockCache::new(100);
        cache.insert((1, 0), block(), 10);
        cache.insert((1, 10), block(), 10);
        cache.insert((2, 0), block(), 10);
        cache.erase_table(1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.usage(), 10);
        assert!(cache.lookup((2, 0)).is_some());
    }

    #[test]
    fn ids_are_never_reused() {
        let cache = BlockCache::new(100);
        let first = cache.new_id();
        let second = cache.new_id();
        assert_ne!(first, second);
    }
}
