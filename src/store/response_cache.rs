use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Who a cached response was computed for
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// Shared by every caller regardless of identity
    Anonymous,
    User(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: String,
    pub scope: CacheScope,
}

impl CacheKey {
    pub fn anonymous(path: &str) -> Self {
        Self {
            path: path.to_string(),
            scope: CacheScope::Anonymous,
        }
    }

    pub fn for_user(path: &str, user_id: &str) -> Self {
        Self {
            path: path.to_string(),
            scope: CacheScope::User(user_id.to_string()),
        }
    }
}

/// Store for short-lived response bodies, invalidated explicitly by writes
#[async_trait::async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<Value>;
    async fn put(&self, key: CacheKey, value: Value, ttl: Duration);
    async fn invalidate(&self, key: &CacheKey);
    /// Drop the entries of every scope cached for `path`
    async fn invalidate_path(&self, path: &str);
    async fn clear(&self);
}

/// Body produced on a cache miss
#[derive(Debug, Clone, PartialEq)]
pub enum Computed {
    /// Stored under the key for the entry's TTL
    Cacheable(Value),
    /// Returned to the caller but never stored
    Uncacheable(Value),
}

/// Return the cached body for `key`, or run `compute` and cache its result for `ttl`.
/// `compute` runs only after the miss, so everything it reads postdates any invalidation
/// that emptied the entry. Failed computations are not cached.
pub async fn get_or_compute<F, Fut, E>(
    cache: &dyn ResponseCache,
    key: CacheKey,
    ttl: Duration,
    compute: F,
) -> Result<Value, E>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Computed, E>>,
{
    if let Some(value) = cache.get(&key).await {
        log::debug!("response cache hit for {}", key.path);
        return Ok(value);
    }

    log::debug!("response cache miss for {}", key.path);
    match compute().await? {
        Computed::Cacheable(value) => {
            cache.put(key, value.clone(), ttl).await;
            Ok(value)
        }
        Computed::Uncacheable(value) => Ok(value),
    }
}

#[derive(Clone, Debug)]
struct CacheEntry {
    value: Value,
    expires_at: Instant,
}

/// In-process response cache with per-entry expiry
#[derive(Debug, Default)]
pub struct InMemoryResponseCache {
    entries: Arc<RwLock<HashMap<CacheKey, CacheEntry>>>,
}

impl InMemoryResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait::async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn get(&self, key: &CacheKey) -> Option<Value> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Expired: evict under the write lock, re-checking in case a fresh value raced in
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.get(key) {
            if entry.expires_at > Instant::now() {
                return Some(entry.value.clone());
            }
            entries.remove(key);
        }
        None
    }

    async fn put(&self, key: CacheKey, value: Value, ttl: Duration) {
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            log::warn!("ttl {:?} for {} is out of range, response not cached", ttl, key.path);
            return;
        };
        let mut entries = self.entries.write().await;
        entries.insert(key, CacheEntry { value, expires_at });
    }

    async fn invalidate(&self, key: &CacheKey) {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            log::info!("invalidated cached response for {}", key.path);
        }
    }

    async fn invalidate_path(&self, path: &str) {
        let mut entries = self.entries.write().await;
        entries.retain(|key, _| key.path != path);
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
