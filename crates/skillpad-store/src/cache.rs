//! Read-through TTL cache using [`moka`].
//!
//! Entries older than the configured time-to-live read as absent; expiry is
//! handled by moka on access, with no background eviction task of our own.
//! The caches are process-lifetime and never persisted.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use tracing::debug;

/// Default time-to-live for resolved sources and fetched documentation.
pub const DEFAULT_TTL: Duration = Duration::from_secs(30 * 60);

/// Compose the `(source, skill)` cache key.
pub fn source_key(source: &str, skill: Option<&str>) -> String {
    match skill {
        Some(skill) => format!("{source}::{skill}"),
        None => format!("{source}::"),
    }
}

// ── cache stats ──────────────────────────────────────────────────────

/// Counters tracking cache effectiveness.
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hits={} misses={}", self.hits(), self.misses())
    }
}

// ── ttl cache ────────────────────────────────────────────────────────

/// A named, async-aware cache with a fixed time-to-live.
///
/// Concurrent loads of the same key are not coalesced: both loaders run and
/// the later insert wins.  Values for one key are expected to be equivalent.
pub struct TtlCache<V> {
    name: &'static str,
    inner: Cache<String, V>,
    stats: Arc<CacheStats>,
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inner: self.inner.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Start building a cache.
    pub fn builder(name: &'static str) -> TtlCacheBuilder<V> {
        TtlCacheBuilder {
            name,
            ttl: DEFAULT_TTL,
            _marker: std::marker::PhantomData,
        }
    }

    /// Look up a live entry.
    pub async fn get(&self, key: &str) -> Option<V> {
        match self.inner.get(key).await {
            Some(value) => {
                self.stats.record_hit();
                debug!(cache = self.name, key, "cache hit");
                Some(value)
            }
            None => {
                self.stats.record_miss();
                debug!(cache = self.name, key, "cache miss");
                None
            }
        }
    }

    pub async fn insert(&self, key: &str, value: V) {
        self.inner.insert(key.to_owned(), value).await;
        debug!(cache = self.name, key, "cache insert");
    }

    #[cfg(test)]
    pub async fn invalidate(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    #[cfg(test)]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
        debug!(cache = self.name, "cache cleared");
    }

    #[cfg(test)]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Serve `key` from the cache, or run `loader` and cache its success.
    /// Errors are returned to the caller and never cached.
    pub async fn get_or_try_insert_with<F, Fut, E>(&self, key: &str, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(cached) = self.get(key).await {
            return Ok(cached);
        }
        let value = loader().await?;
        self.insert(key, value.clone()).await;
        Ok(value)
    }
}

// ── builder ──────────────────────────────────────────────────────────

/// Builder for [`TtlCache`].
pub struct TtlCacheBuilder<V> {
    name: &'static str,
    ttl: Duration,
    _marker: std::marker::PhantomData<V>,
}

impl<V> TtlCacheBuilder<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// Time-to-live for each entry, measured from insertion.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn build(self) -> TtlCache<V> {
        debug!(
            name = self.name,
            ttl_secs = self.ttl.as_secs(),
            "ttl cache created"
        );

        TtlCache {
            name: self.name,
            inner: Cache::builder().time_to_live(self.ttl).build(),
            stats: Arc::new(CacheStats::default()),
        }
    }
}

// ── tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn make_cache() -> TtlCache<String> {
        TtlCache::builder("test").build()
    }

    #[test]
    fn keys_distinguish_missing_skill() {
        assert_eq!(source_key("vercel/skills", Some("react")), "vercel/skills::react");
        assert_eq!(source_key("vercel/skills", None), "vercel/skills::");
        assert_ne!(
            source_key("a", Some("b")),
            source_key("a::b", None),
        );
    }

    #[tokio::test]
    async fn insert_and_get() {
        let cache = make_cache();
        cache.insert("k", "v".to_string()).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
        assert!(cache.get("other").await.is_none());
        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
    }

    #[tokio::test]
    async fn loader_runs_once_within_ttl() {
        let cache = make_cache();
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let v: Result<String, ()> = cache
                .get_or_try_insert_with("k", || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok("loaded".to_string())
                })
                .await;
            assert_eq!(v.unwrap(), "loaded");
        }
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_is_not_cached() {
        let cache = make_cache();
        let first: Result<String, &str> = cache
            .get_or_try_insert_with("k", || async { Err("offline") })
            .await;
        assert_eq!(first.unwrap_err(), "offline");
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache: TtlCache<String> = TtlCache::builder("short")
            .ttl(Duration::from_millis(50))
            .build();
        cache.insert("k", "v".into()).await;
        assert!(cache.get("k").await.is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(cache.get("k").await.is_none());
    }

    #[tokio::test]
    async fn invalidate_removes_entry() {
        let cache = make_cache();
        cache.insert("a", "1".into()).await;
        cache.insert("b", "2".into()).await;
        cache.invalidate("a").await;
        assert!(cache.get("a").await.is_none());
        cache.invalidate_all();
        assert!(cache.get("b").await.is_none());
    }

    #[test]
    fn stats_display() {
        let stats = CacheStats::default();
        stats.record_hit();
        stats.record_miss();
        stats.record_miss();
        assert_eq!(stats.to_string(), "hits=1 misses=2");
    }
}
