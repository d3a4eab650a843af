//! Cached database with hot swap support.
//!
//! Wraps any [`GeoIpDatabase`] with:
//! - a result cache keyed by IPv4 address
//! - atomic replacement of the underlying database, so a rebuilt snapshot
//!   can be installed while lookups continue on the old one

use arc_swap::ArcSwap;
use quick_cache::sync::Cache;
use std::net::IpAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::GeoIpDatabase;
use crate::{Entry, Result};

/// Caching front of a geo database.
///
/// # Example
///
/// ```ignore
/// use gipstore::{CachedDatabase, MemDatabase};
///
/// let db = CachedDatabase::new(MemDatabase::new(), 10_000);
/// let entry = db.find("91.64.54.207".parse()?)?;
///
/// // install a rebuilt database
/// db.replace(rebuilt);
/// ```
pub struct CachedDatabase<D> {
    inner: ArcSwap<D>,
    /// Lookup results, misses included. Errors are never stored.
    cache: Option<Cache<u32, Option<Arc<Entry>>>>,
    capacity: usize,
    generation: AtomicU64,
}

impl<D: GeoIpDatabase> CachedDatabase<D> {
    /// Wrap a database. A capacity of 0 disables caching.
    pub fn new(db: D, capacity: usize) -> Self {
        Self::from_arc(Arc::new(db), capacity)
    }

    pub fn from_arc(db: Arc<D>, capacity: usize) -> Self {
        let cache = if capacity > 0 {
            Some(Cache::new(capacity))
        } else {
            None
        };
        Self {
            inner: ArcSwap::new(db),
            cache,
            capacity,
            generation: AtomicU64::new(0),
        }
    }

    /// Atomically install a new database and drop cached results.
    ///
    /// Lookups already running finish against the previous database.
    pub fn replace(&self, db: D) {
        self.replace_arc(Arc::new(db));
    }

    pub fn replace_arc(&self, db: Arc<D>) {
        self.inner.store(db);
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.clear_cache();
        log::info!("Replaced geo database");
    }

    /// Current database.
    ///
    /// The returned handle may be stale after a [`replace`](Self::replace).
    pub fn current(&self) -> Arc<D> {
        self.inner.load_full()
    }

    pub fn clear_cache(&self) {
        if let Some(ref cache) = self.cache {
            cache.clear();
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        match self.cache {
            Some(ref cache) => CacheStats {
                capacity: self.capacity,
                len: cache.len(),
                enabled: true,
            },
            None => CacheStats {
                capacity: 0,
                len: 0,
                enabled: false,
            },
        }
    }

    /// Number of replacements so far.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

impl<D: GeoIpDatabase> GeoIpDatabase for CachedDatabase<D> {
    fn find(&self, addr: IpAddr) -> Result<Option<Arc<Entry>>> {
        let key = match addr {
            IpAddr::V4(v4) => u32::from(v4),
            IpAddr::V6(_) => return self.inner.load().find(addr),
        };

        if let Some(ref cache) = self.cache {
            if let Some(result) = cache.get(&key) {
                return Ok(result);
            }
        }

        let generation = self.generation();
        let result = self.inner.load().find(addr)?;
        self.store_result(key, &result, generation);
        Ok(result)
    }
}

impl<D> CachedDatabase<D> {
    /// Cache a result computed against the database of `generation`.
    ///
    /// A replacement bumps the generation before clearing the cache, so a
    /// result that lands after the clear is taken back out.
    fn store_result(&self, key: u32, result: &Option<Arc<Entry>>, generation: u64) {
        let Some(ref cache) = self.cache else {
            return;
        };
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        cache.insert(key, result.clone());
        if self.generation.load(Ordering::SeqCst) != generation {
            cache.remove(&key);
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    /// Configured capacity
    pub capacity: usize,
    /// Current number of cached results
    pub len: usize,
    /// Whether caching is enabled
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Range;
    use crate::MemDatabase;
    use std::net::Ipv4Addr;

    fn db(cc: &str) -> MemDatabase {
        MemDatabase::from_entries([Entry::new(
            Range::from_addrs(Ipv4Addr::new(91, 64, 54, 0), Ipv4Addr::new(91, 64, 54, 255)),
            cc,
        )])
    }

    #[test]
    fn test_cached_lookup() {
        let cached = CachedDatabase::new(db("DE"), 100);
        let addr: IpAddr = "91.64.54.207".parse().unwrap();

        assert_eq!(cached.find(addr).unwrap().unwrap().country_code, "DE");
        assert_eq!(cached.find(addr).unwrap().unwrap().country_code, "DE");
        assert!(cached.find("1.1.1.1".parse().unwrap()).unwrap().is_none());

        let stats = cached.cache_stats();
        assert!(stats.enabled);
        assert_eq!(stats.len, 2);
    }

    #[test]
    fn test_replace_clears_cache() {
        let cached = CachedDatabase::new(db("DE"), 100);
        let addr: IpAddr = "91.64.54.1".parse().unwrap();
        assert_eq!(cached.find(addr).unwrap().unwrap().country_code, "DE");

        cached.replace(db("AT"));
        assert_eq!(cached.generation(), 1);
        assert_eq!(cached.find(addr).unwrap().unwrap().country_code, "AT");
    }

    #[test]
    fn test_result_from_replaced_database_not_cached() {
        let cached = CachedDatabase::new(db("DE"), 100);
        let addr: IpAddr = "91.64.54.1".parse().unwrap();
        let key = u32::from(Ipv4Addr::new(91, 64, 54, 1));

        // lookup started before the replacement and finishes after it
        let generation = cached.generation();
        let stale = cached.current().find(addr).unwrap();
        cached.replace(db("AT"));
        cached.store_result(key, &stale, generation);

        assert_eq!(cached.cache_stats().len, 0);
        assert_eq!(cached.find(addr).unwrap().unwrap().country_code, "AT");
        assert_eq!(cached.cache_stats().len, 1);
    }

    #[test]
    fn test_no_cache() {
        let cached = CachedDatabase::new(db("DE"), 0);
        assert!(cached.find("91.64.54.1".parse().unwrap()).unwrap().is_some());
        assert!(!cached.cache_stats().enabled);
        assert!(cached.find("::1".parse().unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_old_snapshot_survives_replace() {
        let cached = CachedDatabase::new(db("DE"), 0);
        let old = cached.current();
        cached.replace(MemDatabase::new());
        assert_eq!(old.len(), 1);
        assert!(cached.current().is_empty());
    }
}
