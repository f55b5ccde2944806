//! Tagged cache for active-secret lookups.
//!
//! Entries are addressed by a tag set (`[owner_type, owner_id]`) plus a key
//! (the secret type key), so every entry of one owner can be swept at once.
//! The store is pluggable; [`MemoryTaggedCache`] is the in-process default.

use std::collections::HashMap;
use std::future::Future;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::errors::Result;
use crate::observability::MetricsRecorder;

#[async_trait]
pub trait TaggedCache<V>: Send + Sync
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, tags: &[String], key: &str) -> Option<V>;

    async fn put(&self, tags: &[String], key: &str, value: V, ttl: Duration);

    /// Evict one entry; returns whether anything was evicted.
    async fn forget(&self, tags: &[String], key: &str) -> bool;

    /// Evict every entry carrying all of `tags`; returns the number evicted.
    async fn flush(&self, tags: &[String]) -> usize;

    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// A freshly loaded value and how long it may be cached.
///
/// `ttl` of `None` (or zero) means the value is returned but not stored.
#[derive(Debug, Clone)]
pub struct Loaded<V> {
    pub value: V,
    pub ttl: Option<Duration>,
}

impl<V> Loaded<V> {
    pub fn uncached(value: V) -> Self {
        Self { value, ttl: None }
    }

    pub fn cached_for(value: V, ttl: Duration) -> Self {
        Self { value, ttl: Some(ttl) }
    }
}

/// Serve `key` from the cache, falling through to `loader` on a miss.
///
/// With `rehydrate` the entry is evicted first and always reloaded. Loader
/// errors propagate and leave the cache untouched.
pub async fn remember<V, C, F, Fut>(
    cache: &C,
    tags: &[String],
    key: &str,
    rehydrate: bool,
    loader: F,
) -> Result<V>
where
    V: Clone + Send + Sync + 'static,
    C: TaggedCache<V> + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Loaded<V>>>,
{
    let metrics = MetricsRecorder::new();

    if rehydrate {
        cache.forget(tags, key).await;
    } else if let Some(hit) = cache.get(tags, key).await {
        metrics.record_cache_lookup(true);
        return Ok(hit);
    }
    metrics.record_cache_lookup(false);

    let loaded = loader().await?;
    if let Some(ttl) = loaded.ttl.filter(|ttl| !ttl.is_zero()) {
        cache.put(tags, key, loaded.value.clone(), ttl).await;
        metrics.update_cache_entries(cache.len().await);
    }

    Ok(loaded.value)
}

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    tags: Vec<String>,
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Thread-safe in-memory tagged cache with per-entry TTL.
pub struct MemoryTaggedCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    max_entries: usize,
}

impl<V> MemoryTaggedCache<V> {
    pub fn new(max_entries: usize) -> Self {
        Self { entries: RwLock::new(HashMap::new()), max_entries: max_entries.max(1) }
    }

    fn entry_key(tags: &[String], key: &str) -> String {
        format!("{}|{}", tags.join(":"), key)
    }

    fn evict_expired(entries: &mut HashMap<String, CacheEntry<V>>) {
        entries.retain(|_, entry| !entry.is_expired());
    }
}

#[async_trait]
impl<V> TaggedCache<V> for MemoryTaggedCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn get(&self, tags: &[String], key: &str) -> Option<V> {
        let entries = self.entries.read().ok()?;
        let entry = entries.get(&Self::entry_key(tags, key))?;

        if entry.is_expired() {
            None
        } else {
            Some(entry.value.clone())
        }
    }

    async fn put(&self, tags: &[String], key: &str, value: V, ttl: Duration) {
        if let Ok(mut entries) = self.entries.write() {
            if entries.len() >= self.max_entries {
                Self::evict_expired(&mut entries);
            }

            // Still full: drop whichever entry expires soonest
            if entries.len() >= self.max_entries {
                if let Some(oldest_key) =
                    entries.iter().min_by_key(|(_, v)| v.expires_at).map(|(k, _)| k.clone())
                {
                    entries.remove(&oldest_key);
                }
            }

            entries.insert(
                Self::entry_key(tags, key),
                CacheEntry { tags: tags.to_vec(), value, expires_at: Instant::now() + ttl },
            );
        }
    }

    async fn forget(&self, tags: &[String], key: &str) -> bool {
        match self.entries.write() {
            Ok(mut entries) => entries
                .remove(&Self::entry_key(tags, key))
                .is_some_and(|entry| !entry.is_expired()),
            Err(_) => false,
        }
    }

    async fn flush(&self, tags: &[String]) -> usize {
        match self.entries.write() {
            Ok(mut entries) => {
                let before = entries.len();
                entries.retain(|_, entry| !tags.iter().all(|tag| entry.tags.contains(tag)));
                before - entries.len()
            }
            Err(_) => 0,
        }
    }

    async fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::VigilError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn tags(owner_id: &str) -> Vec<String> {
        vec!["users".to_string(), owner_id.to_string()]
    }

    #[tokio::test]
    async fn test_put_get_forget() {
        let cache = MemoryTaggedCache::new(10);
        cache.put(&tags("1"), "password", 7u32, Duration::from_secs(60)).await;

        assert_eq!(cache.get(&tags("1"), "password").await, Some(7));
        assert_eq!(cache.get(&tags("2"), "password").await, None);

        assert!(cache.forget(&tags("1"), "password").await);
        assert!(!cache.forget(&tags("1"), "password").await);
    }

    #[tokio::test]
    async fn test_expired_entries_are_misses() {
        let cache = MemoryTaggedCache::new(10);
        cache.put(&tags("1"), "pin", 1u32, Duration::from_millis(20)).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(cache.get(&tags("1"), "pin").await, None);
    }

    #[tokio::test]
    async fn test_flush_sweeps_one_owner() {
        let cache = MemoryTaggedCache::new(10);
        cache.put(&tags("1"), "password", 1u32, Duration::from_secs(60)).await;
        cache.put(&tags("1"), "pin", 2u32, Duration::from_secs(60)).await;
        cache.put(&tags("2"), "pin", 3u32, Duration::from_secs(60)).await;

        assert_eq!(cache.flush(&tags("1")).await, 2);
        assert_eq!(cache.get(&tags("2"), "pin").await, Some(3));
    }

    #[tokio::test]
    async fn test_capacity_evicts_soonest_expiry() {
        let cache = MemoryTaggedCache::new(2);
        cache.put(&tags("1"), "a", 1u32, Duration::from_secs(5)).await;
        cache.put(&tags("1"), "b", 2u32, Duration::from_secs(60)).await;
        cache.put(&tags("1"), "c", 3u32, Duration::from_secs(60)).await;

        assert_eq!(cache.len().await, 2);
        assert_eq!(cache.get(&tags("1"), "a").await, None);
    }

    #[tokio::test]
    async fn test_remember_honours_ttl_and_rehydrate() {
        let cache = MemoryTaggedCache::new(10);
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        let load = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Loaded::cached_for(5u32, Duration::from_secs(60)))
        };
        assert_eq!(remember(&cache, &tags("1"), "k", false, load).await.unwrap(), 5);
        assert_eq!(remember(&cache, &tags("1"), "k", false, load).await.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        assert_eq!(remember(&cache, &tags("1"), "k", true, load).await.unwrap(), 5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remember_skips_uncached_and_errors() {
        let cache = MemoryTaggedCache::<u32>::new(10);

        let value = remember(&cache, &tags("1"), "k", false, || async { Ok(Loaded::uncached(1)) })
            .await
            .unwrap();
        assert_eq!(value, 1);
        assert_eq!(cache.len().await, 0);

        let result = remember(&cache, &tags("1"), "k", false, || async {
            Err::<Loaded<u32>, _>(VigilError::internal("boom"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(cache.len().await, 0);
    }
}
