use std::future::Future;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::debug;

use crate::error::AppResult;

/// Id-to-detail map kept for the lifetime of a session.
///
/// Entries never expire by time; writes to a resource evict its entry and
/// logout clears everything. Capacity only bounds memory (least recently
/// used goes first). Concurrent fetches of the same key are not coalesced:
/// both hit the network and the last writer wins.
pub struct DetailCache<K: Hash + Eq, V> {
    name: &'static str,
    entries: Mutex<LruCache<K, V>>,
}

impl<K, V> DetailCache<K, V>
where
    K: Hash + Eq + Clone + std::fmt::Display,
    V: Clone,
{
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            name,
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.lock().get(key).cloned()
    }

    pub fn insert(&self, key: K, value: V) {
        self.lock().put(key, value);
    }

    pub fn invalidate(&self, key: &K) {
        if self.lock().pop(key).is_some() {
            debug!(cache = self.name, key = %key, "cache entry evicted");
        }
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Returns the cached value unless `force_refresh` is set, otherwise runs
    /// `fetch` and stores its result. Failures are not cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: K, force_refresh: bool, fetch: F) -> AppResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = AppResult<V>>,
    {
        if !force_refresh {
            if let Some(hit) = self.get(&key) {
                debug!(cache = self.name, key = %key, "cache hit");
                return Ok(hit);
            }
        }

        let value = fetch().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<K, V>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Lets the client clear every cache on logout without knowing their types.
pub trait ClearCache: Send + Sync {
    fn clear_all(&self);
}

impl<K, V> ClearCache for DetailCache<K, V>
where
    K: Hash + Eq + Clone + std::fmt::Display + Send,
    V: Clone + Send,
{
    fn clear_all(&self) {
        self.clear();
    }
}
