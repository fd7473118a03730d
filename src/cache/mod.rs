//! Prefixed Cache (C2) — a TTL-scoped, namespaced key/value layer in front of
//! the external managers. Modeled as a single shared map keyed by
//! `"{namespace}:{key}"`, the same way a plain TTL cache works elsewhere in
//! the pack (see DESIGN.md) — there is no per-namespace lock striping, just
//! one `RwLock` around the whole map, since reads vastly outnumber writes and
//! writes are already serialized per-adapter by the per-title mutex upstream.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;

const DEFAULT_TTL: Duration = Duration::from_secs(60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(600);

#[derive(Clone)]
struct CacheEntry {
    value: Arc<dyn std::any::Any + Send + Sync>,
    expires_at: Instant,
}

/// A shared, namespaced, TTL cache. Cheap to clone — internally an `Arc`.
#[derive(Clone)]
pub struct PrefixedCache {
    inner: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl Default for PrefixedCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PrefixedCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Spawns the background sweeper that purges expired entries every ten
    /// minutes (§4.2). Returns the join handle so callers can abort it on
    /// shutdown if they want to.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                interval.tick().await;
                cache.cleanup_expired().await;
            }
        })
    }

    fn full_key(namespace: &str, key: &str) -> String {
        format!("{namespace}:{key}")
    }

    pub async fn get<T: Clone + Send + Sync + 'static>(&self, namespace: &str, key: &str) -> Option<T> {
        let map = self.inner.read().await;
        let entry = map.get(&Self::full_key(namespace, key))?;
        if entry.expires_at < Instant::now() {
            return None;
        }
        entry.value.downcast_ref::<T>().cloned()
    }

    pub async fn set<T: Send + Sync + 'static>(
        &self,
        namespace: &str,
        key: &str,
        value: T,
        ttl: Option<Duration>,
    ) {
        let mut map = self.inner.write().await;
        map.insert(
            Self::full_key(namespace, key),
            CacheEntry {
                value: Arc::new(value),
                expires_at: Instant::now() + ttl.unwrap_or(DEFAULT_TTL),
            },
        );
    }

    /// Bulk delete every entry whose key starts with `"{namespace}:"`.
    pub async fn clear(&self, namespace: &str) {
        let prefix = format!("{namespace}:");
        let mut map = self.inner.write().await;
        map.retain(|k, _| !k.starts_with(&prefix));
    }

    pub async fn clear_all(&self) {
        let mut map = self.inner.write().await;
        map.clear();
    }

    pub async fn cleanup_expired(&self) {
        let now = Instant::now();
        let mut map = self.inner.write().await;
        let before = map.len();
        map.retain(|_, entry| entry.expires_at >= now);
        let purged = before - map.len();
        if purged > 0 {
            log::debug!("cache sweeper purged {purged} expired entries");
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_and_get() {
        let cache = PrefixedCache::new();
        cache.set("tv", "items", vec![1u64, 2, 3], None).await;
        let got: Option<Vec<u64>> = cache.get("tv", "items").await;
        assert_eq!(got, Some(vec![1, 2, 3]));
    }

    #[tokio::test]
    async fn test_namespace_isolation() {
        let cache = PrefixedCache::new();
        cache.set("tv", "items", 1u64, None).await;
        cache.set("movie", "items", 2u64, None).await;
        assert_eq!(cache.get::<u64>("tv", "items").await, Some(1));
        assert_eq!(cache.get::<u64>("movie", "items").await, Some(2));
    }

    #[tokio::test]
    async fn test_clear_namespace_only_affects_that_namespace() {
        let cache = PrefixedCache::new();
        cache.set("tv", "items", 1u64, None).await;
        cache.set("tv", "tags", 2u64, None).await;
        cache.set("movie", "items", 3u64, None).await;

        cache.clear("tv").await;

        assert_eq!(cache.get::<u64>("tv", "items").await, None);
        assert_eq!(cache.get::<u64>("tv", "tags").await, None);
        assert_eq!(cache.get::<u64>("movie", "items").await, Some(3));
    }

    #[tokio::test]
    async fn test_expired_entry_is_not_returned() {
        let cache = PrefixedCache::new();
        cache
            .set("tv", "items", 1u64, Some(Duration::from_millis(1)))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get::<u64>("tv", "items").await, None);
    }

    #[tokio::test]
    async fn test_cleanup_expired_purges_map() {
        let cache = PrefixedCache::new();
        cache
            .set("tv", "items", 1u64, Some(Duration::from_millis(1)))
            .await;
        cache.set("tv", "tags", 2u64, None).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.cleanup_expired().await;
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let cache = PrefixedCache::new();
        cache.set("tv", "items", 1u64, None).await;
        cache.set("movie", "items", 2u64, None).await;
        cache.clear_all().await;
        assert_eq!(cache.len().await, 0);
    }
}
