//! In-memory cache with TTL-based expiration and a cache-aside helper.

use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default entry lifetime: 30 seconds.
pub const DEFAULT_TTL_SECS: i64 = 30;

/// A cached value with expiry.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: DateTime<Utc>,
}

/// Concurrent TTL cache. Expired entries are ignored on read and dropped by
/// [`TtlCache::evict_expired`].
#[derive(Debug)]
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create a cache whose entries live for `ttl_secs` seconds by default.
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            entries: DashMap::new(),
            ttl: Duration::seconds(ttl_secs),
        }
    }

    /// Get a cached value if it exists and has not expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries.get(key).and_then(|entry| {
            if Utc::now() < entry.expires_at {
                Some(entry.value.clone())
            } else {
                None
            }
        })
    }

    /// Insert or update a value with the default TTL.
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.ttl);
    }

    /// Insert or update a value with an explicit TTL.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let expires_at = Utc::now() + ttl;
        self.entries.insert(key, CacheEntry { value, expires_at });
    }

    /// Remove a specific entry.
    pub fn invalidate(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Drop expired entries, returning how many were removed.
    pub fn evict_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        before - self.entries.len()
    }

    /// Cache-aside lookup: return the live cached value for `key`, or run
    /// `fetch`, store its result for `ttl` and return it.
    ///
    /// Errors from `fetch` are returned as-is and nothing is cached. Two
    /// concurrent misses for the same key may both fetch.
    pub async fn get_or_fetch<F, Fut, E>(&self, key: K, ttl: Duration, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(hit) = self.get(&key) {
            return Ok(hit);
        }
        let value = fetch().await?;
        self.set_with_ttl(key, value.clone(), ttl);
        Ok(value)
    }
}

/// Spawn a periodic sweep of expired entries until `ct` is cancelled.
pub fn spawn_eviction_task<K, V>(
    cache: Arc<TtlCache<K, V>>,
    every: std::time::Duration,
    ct: CancellationToken,
) -> tokio::task::JoinHandle<()>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            tokio::select! {
                _ = ct.cancelled() => break,
                _ = interval.tick() => {
                    let removed = cache.evict_expired();
                    if removed > 0 {
                        debug!(removed, "evicted expired cache entries");
                    }
                }
            }
        }
    })
}

impl<K, V> Default for TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECS)
    }
}
