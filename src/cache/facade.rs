use super::memory_cache::MemoryCache;
use crate::stats::Stats;

/// Outcome of a `set`/`add`/`replace`/`cas`/`append`/`prepend`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreResult {
    Stored,
    NotStored,
    Exists,
    NotFound,
}

/// Outcome of `incr`/`decr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CounterResult {
    Stored(u64),
    NotFound,
    NotNumeric,
}

/// Outcome of `delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteResult {
    Deleted,
    NotFound,
}

pub struct GetEntry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub flags: u8,
    pub cas: u64,
}

/// memcached command semantics layered over `MemoryCache`. Every method
/// here is synchronous and O(1) except `get`/`gets` (O(number of requested
/// keys)) and `flush` (O(item_count)).
pub struct CacheFacade {
    cache: MemoryCache,
}

impl CacheFacade {
    pub fn new(max_items: usize, max_bytes: usize) -> Self {
        CacheFacade {
            cache: MemoryCache::new(max_items, max_bytes),
        }
    }

    pub fn set(&mut self, key: &[u8], flags: u8, exptime: i64, value: Vec<u8>, stats: &mut Stats) {
        if let Some(index) = self.cache.get_index(key, &mut stats.cache) {
            self.replace_at(key, index, flags, exptime, value, &mut stats.cache);
        } else {
            self.cache
                .insert(key.to_vec(), value, flags, exptime, &mut stats.cache);
        }
        stats.protocol.cmd_set += 1;
    }

    pub fn add(
        &mut self,
        key: &[u8],
        flags: u8,
        exptime: i64,
        value: Vec<u8>,
        stats: &mut Stats,
    ) -> StoreResult {
        if let Some(index) = self.cache.get_index(key, &mut stats.cache) {
            // Contended add: touch the existing item's LRU position even
            // though the store itself is rejected.
            self.cache.touch(index);
            StoreResult::NotStored
        } else {
            self.cache
                .insert(key.to_vec(), value, flags, exptime, &mut stats.cache);
            StoreResult::Stored
        }
    }

    pub fn replace(
        &mut self,
        key: &[u8],
        flags: u8,
        exptime: i64,
        value: Vec<u8>,
        stats: &mut Stats,
    ) -> StoreResult {
        if let Some(index) = self.cache.get_index(key, &mut stats.cache) {
            self.replace_at(key, index, flags, exptime, value, &mut stats.cache);
            StoreResult::Stored
        } else {
            StoreResult::NotStored
        }
    }

    pub fn cas(
        &mut self,
        key: &[u8],
        flags: u8,
        exptime: i64,
        casunique: u64,
        value: Vec<u8>,
        stats: &mut Stats,
    ) -> StoreResult {
        match self.cache.get_index(key, &mut stats.cache) {
            None => {
                self.cache
                    .insert(key.to_vec(), value, flags, exptime, &mut stats.cache);
                stats.protocol.cas_misses += 1;
                StoreResult::NotFound
            }
            Some(index) if self.cache.item(index).cas == casunique => {
                self.replace_at(key, index, flags, exptime, value, &mut stats.cache);
                stats.protocol.cas_hits += 1;
                StoreResult::Stored
            }
            Some(_) => {
                stats.protocol.cas_badvals += 1;
                StoreResult::Exists
            }
        }
    }

    pub fn prepend(
        &mut self,
        key: &[u8],
        flags: u8,
        exptime: i64,
        value: Vec<u8>,
        stats: &mut Stats,
    ) -> StoreResult {
        self.concat(key, flags, exptime, value, true, stats)
    }

    pub fn append(
        &mut self,
        key: &[u8],
        flags: u8,
        exptime: i64,
        value: Vec<u8>,
        stats: &mut Stats,
    ) -> StoreResult {
        self.concat(key, flags, exptime, value, false, stats)
    }

    fn concat(
        &mut self,
        key: &[u8],
        flags: u8,
        exptime: i64,
        value: Vec<u8>,
        prepend: bool,
        stats: &mut Stats,
    ) -> StoreResult {
        let Some(index) = self.cache.get_index(key, &mut stats.cache) else {
            return StoreResult::NotStored;
        };

        let mut combined = Vec::with_capacity(self.cache.item(index).value.len() + value.len());
        if prepend {
            combined.extend_from_slice(&value);
            combined.extend_from_slice(&self.cache.item(index).value);
        } else {
            combined.extend_from_slice(&self.cache.item(index).value);
            combined.extend_from_slice(&value);
        }

        self.replace_at(key, index, flags, exptime, combined, &mut stats.cache);
        StoreResult::Stored
    }

    pub fn incr(&mut self, key: &[u8], delta: u64, stats: &mut Stats) -> CounterResult {
        self.counter(key, delta, true, stats)
    }

    pub fn decr(&mut self, key: &[u8], delta: u64, stats: &mut Stats) -> CounterResult {
        self.counter(key, delta, false, stats)
    }

    fn counter(&mut self, key: &[u8], delta: u64, increment: bool, stats: &mut Stats) -> CounterResult {
        let Some(index) = self.cache.get_index(key, &mut stats.cache) else {
            if increment {
                stats.protocol.incr_misses += 1;
            } else {
                stats.protocol.decr_misses += 1;
            }
            return CounterResult::NotFound;
        };

        let current = match parse_counter_value(&self.cache.item(index).value) {
            Some(v) => v,
            None => return CounterResult::NotNumeric,
        };

        // Clamp at the u64 boundary instead of wrapping: decr below zero
        // saturates to 0, incr past u64::MAX saturates to u64::MAX.
        let updated = if increment {
            current.saturating_add(delta)
        } else {
            current.saturating_sub(delta)
        };

        let flags = self.cache.item(index).flags;
        let exptime = self.cache.item(index).exptime;
        self.replace_at(
            key,
            index,
            flags,
            exptime,
            updated.to_string().into_bytes(),
            &mut stats.cache,
        );

        if increment {
            stats.protocol.incr_hits += 1;
        } else {
            stats.protocol.decr_hits += 1;
        }
        CounterResult::Stored(updated)
    }

    pub fn get(&mut self, keys: &[Vec<u8>], stats: &mut Stats) -> Vec<GetEntry> {
        let entries = self.lookup_many(keys, stats);
        stats.protocol.cmd_get += 1;
        if entries.is_empty() {
            stats.protocol.get_misses += 1;
        } else {
            stats.protocol.get_hits += 1;
        }
        entries
    }

    pub fn gets(&mut self, keys: &[Vec<u8>], stats: &mut Stats) -> Vec<GetEntry> {
        // `gets` shares the same hit/miss accounting as `get` in the
        // original implementation; the wire difference is purely in the
        // reply formatting (executor adds the `casunique` field).
        self.get(keys, stats)
    }

    fn lookup_many(&mut self, keys: &[Vec<u8>], stats: &mut Stats) -> Vec<GetEntry> {
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(index) = self.cache.get_index(key, &mut stats.cache) {
                let item = self.cache.item(index);
                entries.push(GetEntry {
                    key: key.clone(),
                    value: item.value.clone(),
                    flags: item.flags,
                    cas: item.cas,
                });
            }
        }
        entries
    }

    pub fn delete(&mut self, key: &[u8], stats: &mut Stats) -> DeleteResult {
        if self.cache.get_index(key, &mut stats.cache).is_some() {
            self.cache.remove(key, &mut stats.cache);
            stats.protocol.delete_hits += 1;
            DeleteResult::Deleted
        } else {
            stats.protocol.delete_misses += 1;
            DeleteResult::NotFound
        }
    }

    pub fn flush(&mut self, delay: i64) {
        self.cache.flush(delay);
    }

    /// Replace the item at `index` with fresh content, freeing and
    /// re-inserting so it gets a new `casunique`: any store that changes
    /// a key's value gives it a new identity.
    fn replace_at(
        &mut self,
        key: &[u8],
        index: usize,
        flags: u8,
        exptime: i64,
        value: Vec<u8>,
        cache_stats: &mut crate::stats::CacheStats,
    ) {
        let _ = index;
        self.cache.remove(key, cache_stats);
        self.cache.insert(key.to_vec(), value, flags, exptime, cache_stats);
    }
}

fn parse_counter_value(value: &[u8]) -> Option<u64> {
    if value.is_empty() || !value.iter().all(|b| b.is_ascii_digit()) {
        return None;
    }
    std::str::from_utf8(value).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> Stats {
        Stats::new(1000, 1_000_000)
    }

    #[test]
    fn set_then_get() {
        let mut cache = CacheFacade::new(1000, 1_000_000);
        let mut s = stats();
        cache.set(b"k", 0, 0, b"v".to_vec(), &mut s);

        let got = cache.get(&[b"k".to_vec()], &mut s);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].value, b"v");
    }

    #[test]
    fn set_then_delete_then_miss() {
        let mut cache = CacheFacade::new(1000, 1_000_000);
        let mut s = stats();
        cache.set(b"k", 0, 0, b"v".to_vec(), &mut s);
        assert_eq!(cache.delete(b"k", &mut s), DeleteResult::Deleted);
        assert!(cache.get(&[b"k".to_vec()], &mut s).is_empty());
    }

    #[test]
    fn add_twice_keeps_first_value() {
        let mut cache = CacheFacade::new(1000, 1_000_000);
        let mut s = stats();
        assert_eq!(
            cache.add(b"k", 0, 0, b"v1".to_vec(), &mut s),
            StoreResult::Stored
        );
        assert_eq!(
            cache.add(b"k", 0, 0, b"v2".to_vec(), &mut s),
            StoreResult::NotStored
        );

        let got = cache.get(&[b"k".to_vec()], &mut s);
        assert_eq!(got[0].value, b"v1");
    }

    #[test]
    fn replace_requires_existing_key() {
        let mut cache = CacheFacade::new(1000, 1_000_000);
        let mut s = stats();
        assert_eq!(
            cache.replace(b"k", 0, 0, b"v".to_vec(), &mut s),
            StoreResult::NotStored
        );
        cache.set(b"k", 0, 0, b"v1".to_vec(), &mut s);
        assert_eq!(
            cache.replace(b"k", 0, 0, b"v2".to_vec(), &mut s),
            StoreResult::Stored
        );
    }

    #[test]
    fn prepend_and_append_concatenate_in_order() {
        let mut cache = CacheFacade::new(1000, 1_000_000);
        let mut s = stats();
        cache.set(b"k", 0, 0, b"middle".to_vec(), &mut s);
        cache.prepend(b"k", 0, 0, b"before-".to_vec(), &mut s);
        cache.append(b"k", 0, 0, b"-after".to_vec(), &mut s);

        let got = cache.get(&[b"k".to_vec()], &mut s);
        assert_eq!(got[0].value, b"before-middle-after");
    }

    #[test]
    fn incr_and_decr_compose() {
        let mut cache = CacheFacade::new(1000, 1_000_000);
        let mut s = stats();
        cache.set(b"k", 0, 0, b"10".to_vec(), &mut s);
        assert_eq!(cache.incr(b"k", 5, &mut s), CounterResult::Stored(15));
        assert_eq!(cache.decr(b"k", 2, &mut s), CounterResult::Stored(13));
    }

    #[test]
    fn decr_clamps_at_zero() {
        let mut cache = CacheFacade::new(1000, 1_000_000);
        let mut s = stats();
        cache.set(b"k", 0, 0, b"1".to_vec(), &mut s);
        assert_eq!(cache.decr(b"k", 5, &mut s), CounterResult::Stored(0));
    }

    #[test]
    fn incr_on_non_numeric_value_fails() {
        let mut cache = CacheFacade::new(1000, 1_000_000);
        let mut s = stats();
        cache.set(b"k", 0, 0, b"aaaaa".to_vec(), &mut s);
        assert_eq!(cache.incr(b"k", 1, &mut s), CounterResult::NotNumeric);
    }

    #[test]
    fn cas_after_gets_with_matching_unique_stores() {
        let mut cache = CacheFacade::new(1000, 1_000_000);
        let mut s = stats();
        cache.set(b"k", 0, 0, b"v1".to_vec(), &mut s);
        let cas = cache.gets(&[b"k".to_vec()], &mut s)[0].cas;

        assert_eq!(
            cache.cas(b"k", 0, 0, cas, b"v2".to_vec(), &mut s),
            StoreResult::Stored
        );
    }

    #[test]
    fn cas_after_intervening_store_returns_exists() {
        let mut cache = CacheFacade::new(1000, 1_000_000);
        let mut s = stats();
        cache.set(b"k", 0, 0, b"v1".to_vec(), &mut s);
        let cas = cache.gets(&[b"k".to_vec()], &mut s)[0].cas;

        cache.set(b"k", 0, 0, b"v2".to_vec(), &mut s);
        assert_eq!(
            cache.cas(b"k", 0, 0, cas, b"v3".to_vec(), &mut s),
            StoreResult::Exists
        );
    }

    #[test]
    fn flush_with_zero_delay_misses_everything() {
        let mut cache = CacheFacade::new(1000, 1_000_000);
        let mut s = stats();
        cache.set(b"a", 0, 0, b"1".to_vec(), &mut s);
        cache.set(b"b", 0, 0, b"2".to_vec(), &mut s);

        cache.flush(0);
        assert!(cache.get(&[b"a".to_vec(), b"b".to_vec()], &mut s).is_empty());
    }

    #[test]
    fn casunique_changes_across_a_replacing_store() {
        let mut cache = CacheFacade::new(1000, 1_000_000);
        let mut s = stats();
        cache.set(b"k", 0, 0, b"v1".to_vec(), &mut s);
        let first = cache.gets(&[b"k".to_vec()], &mut s)[0].cas;

        cache.set(b"k", 0, 0, b"v2".to_vec(), &mut s);
        let second = cache.gets(&[b"k".to_vec()], &mut s)[0].cas;

        assert_ne!(first, second);
    }

    #[test]
    fn casunique_stable_across_repeated_reads() {
        let mut cache = CacheFacade::new(1000, 1_000_000);
        let mut s = stats();
        cache.set(b"k", 0, 0, b"v1".to_vec(), &mut s);

        let a = cache.gets(&[b"k".to_vec()], &mut s)[0].cas;
        let b = cache.gets(&[b"k".to_vec()], &mut s)[0].cas;
        assert_eq!(a, b);
    }
}
