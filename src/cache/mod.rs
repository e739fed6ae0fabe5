//! In-memory response cache with per-entry expiry.
//!
//! The rewrite pipeline is deterministic, so a rewritten page can be cached
//! under its absolute URL. Non-idempotent requests and form replays never get
//! a [`CacheKey`]. Expired entries are dropped lazily on read and in bulk by
//! the background sweeper started with [`ResponseCache::spawn_sweeper`].

mod sweeper;

pub use sweeper::SweeperHandle;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Interval between sweeps of expired entries.
pub const DEFAULT_SWEEP_PERIOD: Duration = Duration::from_secs(120);

/// Key of a cached response.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key of a rendered page.
    pub fn page(url: &str) -> Self {
        CacheKey(format!("page:{url}"))
    }

    /// Key for a request, or `None` when its response must not be cached:
    /// anything but `GET`/`HEAD`, and every form replay.
    pub fn for_request(method: &str, url: &str, is_form_replay: bool) -> Option<Self> {
        let idempotent = method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("HEAD");
        (idempotent && !is_form_replay).then(|| Self::page(url))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Counters reported by [`ResponseCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub keys: usize,
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<CacheKey, Entry>,
    hits: u64,
    misses: u64,
}

/// Shared TTL cache of rendered responses. Cloning yields another handle to
/// the same entries.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    inner: Arc<Mutex<Inner>>,
    default_ttl: Duration,
}

impl ResponseCache {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            default_ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Cached value for `key` if present and not expired.
    pub fn get(&self, key: &CacheKey) -> Option<String> {
        let mut inner = self.lock();
        let now = Instant::now();
        let value = match inner.entries.get(key) {
            Some(entry) if entry.expires_at > now => Some(entry.value.clone()),
            Some(_) => {
                inner.entries.remove(key);
                None
            }
            None => None,
        };
        match value {
            Some(_) => inner.hits += 1,
            None => inner.misses += 1,
        }
        value
    }

    /// Insert with the default time to live.
    pub fn set(&self, key: CacheKey, value: impl Into<String>) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    pub fn set_with_ttl(&self, key: CacheKey, value: impl Into<String>, ttl: Duration) {
        let entry = Entry {
            value: value.into(),
            expires_at: Instant::now() + ttl,
        };
        self.lock().entries.insert(key, entry);
    }

    /// Remove an entry. Returns whether it was present.
    pub fn remove(&self, key: &CacheKey) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Drop every expired entry and return how many were removed.
    pub fn evict_expired(&self) -> usize {
        let mut inner = self.lock();
        let now = Instant::now();
        let before = inner.entries.len();
        inner.entries.retain(|_, entry| entry.expires_at > now);
        before - inner.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            keys: inner.entries.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Start a background task that evicts expired entries every `period`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn_sweeper(&self, period: Duration) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
        let task = tokio::spawn(sweeper::run(self.clone(), shutdown_rx, period));
        SweeperHandle::new(shutdown_tx, task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_for_cacheable_requests_only() {
        assert_eq!(
            CacheKey::for_request("GET", "https://x.com/", false).map(|k| k.as_str().to_string()),
            Some("page:https://x.com/".to_string())
        );
        assert!(CacheKey::for_request("head", "https://x.com/", false).is_some());
        assert!(CacheKey::for_request("POST", "https://x.com/", false).is_none());
        assert!(CacheKey::for_request("GET", "https://x.com/", true).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire() {
        let cache = ResponseCache::new(Duration::from_secs(10));
        let key = CacheKey::page("https://x.com/");
        cache.set(key.clone(), "<p>x</p>");
        assert_eq!(cache.get(&key).as_deref(), Some("<p>x</p>"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get(&key), None);
        assert!(cache.is_empty());
        assert_eq!(cache.stats(), CacheStats { hits: 1, misses: 1, keys: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn per_entry_ttl_and_bulk_eviction() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.set_with_ttl(CacheKey::page("a"), "a", Duration::from_secs(5));
        cache.set(CacheKey::page("b"), "b");

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.evict_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&CacheKey::page("b")).is_some());
    }

    #[test]
    fn remove_and_clear() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        cache.set(CacheKey::page("a"), "a");
        cache.set(CacheKey::page("b"), "b");
        assert!(cache.remove(&CacheKey::page("a")));
        assert!(!cache.remove(&CacheKey::page("a")));
        cache.clear();
        assert_eq!(cache.stats().keys, 0);
    }

    #[test]
    fn clones_share_entries() {
        let cache = ResponseCache::new(Duration::from_secs(60));
        let other = cache.clone();
        other.set(CacheKey::page("a"), "a");
        assert_eq!(cache.get(&CacheKey::page("a")).as_deref(), Some("a"));
    }
}
