use fxhash::FxHashMap;

use super::item::CacheItem;
use super::lru::Lru;
use crate::stats::CacheStats;

/// Bounded key -> item map backed by an LRU arena.
///
/// Invariants: `byte_count == sum of bytes_accounted(item)` over all live
/// items; `item_count == table.len() == lru.len()`; after any public method
/// returns, `byte_count <= max_bytes` and `item_count <= max_items`.
pub struct MemoryCache {
    table: FxHashMap<Vec<u8>, usize>,
    lru: Lru,
    byte_count: usize,
    item_count: usize,
    max_bytes: usize,
    max_items: usize,
    next_cas: u64,
}

impl MemoryCache {
    pub fn new(max_items: usize, max_bytes: usize) -> Self {
        MemoryCache {
            table: FxHashMap::default(),
            lru: Lru::new(),
            byte_count: 0,
            item_count: 0,
            max_items,
            max_bytes,
            next_cas: 1,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn byte_count(&self) -> usize {
        self.byte_count
    }

    pub fn item_count(&self) -> usize {
        self.item_count
    }

    fn next_cas(&mut self) -> u64 {
        let cas = self.next_cas;
        self.next_cas += 1;
        cas
    }

    /// Look up `key`, lazily reclaiming it if it has expired.
    ///
    /// Returns the arena index of the live item, if any. Expiry reclamation
    /// is reported to `stats` by the caller (the facade), since only it
    /// knows whether this lookup should count as a `reclaimed` event.
    pub fn get_index(&mut self, key: &[u8], stats: &mut CacheStats) -> Option<usize> {
        let index = *self.table.get(key)?;
        if self.lru.get(index).has_expired() {
            self.remove_index(key, index);
            stats.reclaimed += 1;
            None
        } else {
            Some(index)
        }
    }

    pub fn item(&self, index: usize) -> &CacheItem {
        self.lru.get(index)
    }

    /// Touch an existing item's LRU position without changing its contents.
    pub fn touch(&mut self, index: usize) {
        self.lru.reset(index);
    }

    /// Insert a brand-new item under `key`, evicting LRU victims first if
    /// needed. The key must not already be present; callers that are
    /// replacing an existing key must `remove` it first.
    pub fn insert(
        &mut self,
        key: Vec<u8>,
        value: Vec<u8>,
        flags: u8,
        exptime: i64,
        stats: &mut CacheStats,
    ) -> usize {
        self.evict_for(value.len(), stats);

        let cas = self.next_cas();
        let item = CacheItem::new(key.clone(), value, flags, exptime, cas);
        let bytes = item.bytes_accounted();

        let index = self.lru.insert(item);
        self.table.insert(key, index);
        self.byte_count += bytes;
        self.item_count += 1;
        stats.total_items += 1;
        stats.curr_items = self.item_count;
        stats.bytes = self.byte_count;

        index
    }

    /// Remove the item stored at `key`/`index` (the caller must already
    /// know both, e.g. from a prior `get_index`).
    pub fn remove(&mut self, key: &[u8], stats: &mut CacheStats) {
        if let Some(index) = self.table.get(key).copied() {
            self.remove_index(key, index);
            stats.curr_items = self.item_count;
            stats.bytes = self.byte_count;
        }
    }

    fn remove_index(&mut self, key: &[u8], index: usize) {
        let item = self.lru.remove(index);
        self.byte_count -= item.bytes_accounted();
        self.item_count -= 1;
        self.table.remove(key);
    }

    /// Evict least-recently-used items until inserting `incoming_value_len`
    /// more bytes (and one more item) would fit.
    ///
    /// Only the incoming *value's* length is checked against `max_bytes`
    /// here, not the full key+value+flags footprint that `byte_count`
    /// otherwise tracks.
    fn evict_for(&mut self, incoming_value_len: usize, stats: &mut CacheStats) {
        while self.byte_count + incoming_value_len > self.max_bytes
            || self.item_count + 1 > self.max_items
        {
            let Some(victim) = self.lru.least() else {
                break;
            };
            let key = self.lru.get(victim).key.clone();
            self.remove_index(&key, victim);
            stats.evictions += 1;
        }
        stats.curr_items = self.item_count;
        stats.bytes = self.byte_count;
    }

    /// Set every currently stored item's `exptime` to `now + delay`. Items
    /// are not removed eagerly; they expire lazily on next lookup.
    pub fn flush(&mut self, delay: i64) {
        let target = super::item::now() + delay;
        for index in self.table.values() {
            self.lru.get_mut(*index).exptime = target;
        }
    }
}
