//! TTL-bounded in-memory cache for fetched payloads.
//!
//! TTLs are per entry, supplied at insert time, so real-time quotes and
//! slow-moving profile data can carry independent freshness windows. Expiry is
//! lazy: entries are judged on read and dropped once seen expired; there is no
//! background sweep. The store is unbounded, with growth observable through
//! [`TtlCache::stats`].

use std::collections::HashMap;
use std::mem;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::debug;

/// Outcome of a cache read. A missing key and an expired key are reported
/// distinctly so the executor can choose its refetch policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<T> {
    Fresh(T),
    Expired(T),
    Miss,
}

impl<T> CacheLookup<T> {
    pub const fn is_fresh(&self) -> bool {
        matches!(self, Self::Fresh(_))
    }

    /// The stored value, fresh or stale.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Fresh(value) | Self::Expired(value) => Some(value),
            Self::Miss => None,
        }
    }
}

/// Point-in-time view of cache contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub keys: Vec<String>,
    /// Rough footprint: key bytes plus the in-memory size of each entry.
    /// An estimate, not an allocation count.
    pub approx_bytes: usize,
}

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    stored_at: Instant,
    ttl: Duration,
}

impl<T> Entry<T> {
    fn is_fresh(&self, now: Instant) -> bool {
        now.duration_since(self.stored_at) < self.ttl
    }
}

/// Thread-safe key/value store with per-entry expiry.
///
/// Cloning is cheap and shares the underlying store, so one cache instance
/// can back several executors.
pub struct TtlCache<T> {
    inner: Arc<RwLock<HashMap<String, Entry<T>>>>,
}

impl<T> Clone for TtlCache<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Default for TtlCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> TtlCache<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Look up a key. Never fails; expired entries are removed on sight and
    /// reported as [`CacheLookup::Expired`].
    pub async fn get(&self, key: &str) -> CacheLookup<T> {
        {
            let map = self.inner.read().await;
            match map.get(key) {
                None => return CacheLookup::Miss,
                Some(entry) if entry.is_fresh(Instant::now()) => {
                    debug!(key, "cache hit");
                    return CacheLookup::Fresh(entry.value.clone());
                }
                Some(_) => {}
            }
        }

        let mut map = self.inner.write().await;
        match map.remove(key) {
            Some(entry) if entry.is_fresh(Instant::now()) => {
                // A concurrent insert refreshed the entry between locks.
                let value = entry.value.clone();
                map.insert(key.to_string(), entry);
                CacheLookup::Fresh(value)
            }
            Some(entry) => {
                debug!(key, "cache expired");
                CacheLookup::Expired(entry.value)
            }
            None => CacheLookup::Miss,
        }
    }

    /// Store a value under `key` with its own time-to-live, overwriting any
    /// previous entry.
    pub async fn insert(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let key = key.into();
        debug!(key = key.as_str(), ttl_ms = ttl.as_millis() as u64, "cache store");
        let mut map = self.inner.write().await;
        map.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
                ttl,
            },
        );
    }

    /// Remove a single key. Returns whether an entry existed.
    pub async fn invalidate(&self, key: &str) -> bool {
        let mut map = self.inner.write().await;
        map.remove(key).is_some()
    }

    /// Remove every key containing `pattern`. Returns the number removed.
    pub async fn invalidate_matching(&self, pattern: &str) -> usize {
        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|key, _| !key.contains(pattern));
        before - map.len()
    }

    /// Drop all entries.
    pub async fn clear(&self) {
        let mut map = self.inner.write().await;
        map.clear();
    }

    /// Drop entries whose TTL has elapsed.
    pub async fn purge_expired(&self) {
        let now = Instant::now();
        let mut map = self.inner.write().await;
        map.retain(|_, entry| entry.is_fresh(now));
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn stats(&self) -> CacheStats {
        let map = self.inner.read().await;
        let mut keys: Vec<String> = map.keys().cloned().collect();
        keys.sort_unstable();
        let approx_bytes = map
            .keys()
            .map(|key| key.len() + mem::size_of::<Entry<T>>())
            .sum();
        CacheStats {
            size: map.len(),
            keys,
            approx_bytes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn basic_insert_get_and_overwrite() {
        let cache = TtlCache::new();

        assert_eq!(cache.get("stock_AAPL").await, CacheLookup::<String>::Miss);

        cache
            .insert("stock_AAPL", String::from("v1"), Duration::from_secs(60))
            .await;
        assert_eq!(
            cache.get("stock_AAPL").await,
            CacheLookup::Fresh(String::from("v1"))
        );

        cache
            .insert("stock_AAPL", String::from("v2"), Duration::from_secs(60))
            .await;
        assert_eq!(
            cache.get("stock_AAPL").await,
            CacheLookup::Fresh(String::from("v2"))
        );
    }

    #[tokio::test]
    async fn expired_entries_are_reported_distinctly_from_misses() {
        let cache = TtlCache::new();
        cache
            .insert("stock_AAPL", 42_u32, Duration::from_millis(40))
            .await;

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(cache.get("stock_AAPL").await, CacheLookup::Expired(42));
        // The expired entry was dropped on read; a second look is a miss.
        assert_eq!(cache.get("stock_AAPL").await, CacheLookup::Miss);
    }

    #[tokio::test]
    async fn ttl_is_per_entry() {
        let cache = TtlCache::new();
        cache
            .insert("quote_AAPL", 1_u32, Duration::from_millis(40))
            .await;
        cache
            .insert("profile_AAPL", 2_u32, Duration::from_secs(60))
            .await;

        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!cache.get("quote_AAPL").await.is_fresh());
        assert!(cache.get("profile_AAPL").await.is_fresh());
    }

    #[tokio::test]
    async fn invalidate_matching_removes_only_matching_keys() {
        let cache = TtlCache::new();
        cache.insert("stock_AAPL", 1_u32, Duration::from_secs(60)).await;
        cache.insert("stock_MSFT", 2_u32, Duration::from_secs(60)).await;
        cache.insert("social_AAPL", 3_u32, Duration::from_secs(60)).await;

        let removed = cache.invalidate_matching("stock_").await;
        assert_eq!(removed, 2);
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("social_AAPL").await.is_fresh());
    }

    #[tokio::test]
    async fn clear_and_purge_expired() {
        let cache = TtlCache::new();
        cache.insert("a", 1_u32, Duration::from_millis(40)).await;
        cache.insert("b", 2_u32, Duration::from_secs(60)).await;

        tokio::time::sleep(Duration::from_millis(60)).await;
        cache.purge_expired().await;
        assert_eq!(cache.len().await, 1);

        cache.clear().await;
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn stats_reports_size_and_sorted_keys() {
        let cache = TtlCache::new();
        cache.insert("b_key", 1_u32, Duration::from_secs(60)).await;
        cache.insert("a_key", 2_u32, Duration::from_secs(60)).await;

        let stats = cache.stats().await;
        assert_eq!(stats.size, 2);
        assert_eq!(stats.keys, vec!["a_key", "b_key"]);
        assert!(stats.approx_bytes >= 10);
    }
}
