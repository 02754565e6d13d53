use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use lru::LruCache;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::trace;

use crate::query::{QueryKey, ScoredResult};

/// Default number of cached queries.
pub const DEFAULT_CACHE_CAPACITY: usize = 200;

#[derive(Debug)]
struct CacheEntry {
    generation: u64,
    results: Arc<[ScoredResult]>,
}

/// Hit and miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub capacity: usize,
}

/// LRU cache of query results tagged with the index generation they were
/// computed against.
///
/// An entry is served only while its generation equals the index's current
/// generation; stale entries are dropped on first access.
#[derive(Debug)]
pub struct QueryCache {
    entries: Mutex<LruCache<QueryKey, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl QueryCache {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Look up a query computed at `generation`.
    pub fn get(
        &self,
        key: &QueryKey,
        generation: u64,
    ) -> Option<Arc<[ScoredResult]>> {
        let mut entries = self.entries.lock();
        let cached = entries
            .get(key)
            .map(|entry| (entry.generation, Arc::clone(&entry.results)));
        let found = match cached {
            Some((cached, results)) if cached == generation => Some(results),
            Some((cached, _)) => {
                trace!(
                    cached,
                    current = generation,
                    "evicting stale cache entry"
                );
                entries.pop(key);
                None
            }
            None => None,
        };
        drop(entries);

        let counter = if found.is_some() {
            &self.hits
        } else {
            &self.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    pub fn put(
        &self,
        key: QueryKey,
        generation: u64,
        results: Arc<[ScoredResult]>,
    ) {
        self.entries.lock().put(
            key,
            CacheEntry {
                generation,
                results,
            },
        );
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: entries.len(),
            capacity: entries.cap().get(),
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Query;

    fn results() -> Arc<[ScoredResult]> {
        Arc::from(Vec::new())
    }

    #[test]
    fn hit_at_same_generation() {
        let cache = QueryCache::new(4);
        let key = Query::new("rust").key();
        cache.put(key.clone(), 3, results());

        assert!(cache.get(&key, 3).is_some());
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 0);
    }

    #[test]
    fn stale_generation_misses_and_evicts() {
        let cache = QueryCache::new(4);
        let key = Query::new("rust").key();
        cache.put(key.clone(), 3, results());

        assert!(cache.get(&key, 4).is_none());
        assert_eq!(cache.stats().entries, 0);
        assert!(cache.get(&key, 3).is_none());
        assert_eq!(cache.stats().misses, 2);
    }

    #[test]
    fn least_recently_used_is_evicted() {
        let cache = QueryCache::new(2);
        let a = Query::new("a1").key();
        let b = Query::new("b1").key();
        let c = Query::new("c1").key();
        cache.put(a.clone(), 0, results());
        cache.put(b.clone(), 0, results());
        assert!(cache.get(&a, 0).is_some());
        cache.put(c.clone(), 0, results());

        assert!(cache.get(&a, 0).is_some());
        assert!(cache.get(&b, 0).is_none());
        assert!(cache.get(&c, 0).is_some());
    }

    #[test]
    fn zero_capacity_still_works() {
        let cache = QueryCache::new(0);
        assert_eq!(cache.stats().capacity, 1);
    }

    #[test]
    fn equivalent_queries_share_an_entry() {
        let cache = QueryCache::default();
        cache.put(Query::new("Hello World").key(), 1, results());
        assert!(cache.get(&Query::new("hello   world").key(), 1).is_some());
    }
}
