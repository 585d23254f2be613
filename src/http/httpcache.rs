//! Response cache.
//!
//! Cache-aside storage for GET response bodies. The cache is keyed by a
//! canonical request signature and stores the raw bytes of the last
//! successful response. Eviction belongs to the store, not to this layer.
//!
//! - [`CacheKey`]: method + URL (without fragment) + form-encoded params
//!   sorted by key
//! - [`CacheStore`]: pluggable key/value store
//! - [`MemoryStore`]: DashMap-backed default store with optional limits
//! - [`ResponseCache`]: GET-only read/write path used by request workers

use crate::base::neterror::CacheError;
use crate::http::params::Params;
use crate::http::serializer;
use bytes::Bytes;
use dashmap::DashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use url::Url;

/// Canonical request signature.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(method: &str, url: &Url, params: &Params) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);

        let mut key = format!("{} {}", method.to_uppercase(), url);
        if !params.is_empty() {
            // Encoded the same way as on the wire so `&` and `=` inside a key or
            // value cannot alias another param set.
            let sorted: Params = params
                .sorted()
                .into_iter()
                .map(|(k, v)| (k, v.clone()))
                .collect();
            let canonical = serializer::encode_params(&sorted);
            key.push(if url.query().is_some() { '&' } else { '?' });
            key.push_str(&canonical);
        }
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A key/value store for cached response bodies.
///
/// Implementations must tolerate concurrent `get`/`set` and must never expose
/// a partially written value.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError>;
    fn set(&self, key: CacheKey, value: Bytes) -> Result<(), CacheError>;
    fn remove(&self, key: &CacheKey) -> Result<(), CacheError>;
    fn clear(&self) -> Result<(), CacheError>;
}

impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError> {
        (**self).get(key)
    }

    fn set(&self, key: CacheKey, value: Bytes) -> Result<(), CacheError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        (**self).remove(key)
    }

    fn clear(&self) -> Result<(), CacheError> {
        (**self).clear()
    }
}

/// In-memory store.
///
/// Thread-safe using DashMap. Enforces optional entry and byte limits by
/// evicting arbitrary entries when full.
pub struct MemoryStore {
    entries: DashMap<CacheKey, Bytes>,
    max_entries: usize,
    current_size: AtomicUsize,
    max_size_bytes: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.len())
            .field("max_entries", &self.max_entries)
            .field("size_bytes", &self.size_bytes())
            .field("max_size_bytes", &self.max_size_bytes)
            .finish()
    }
}

impl MemoryStore {
    /// Create a store with default limits (1000 entries, 50MB).
    pub fn new() -> Self {
        Self::with_limits(1000, 50 * 1024 * 1024)
    }

    /// Create a store with custom limits.
    pub fn with_limits(max_entries: usize, max_size_bytes: usize) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            current_size: AtomicUsize::new(0),
            max_size_bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current cached body size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.current_size.load(Ordering::Relaxed)
    }

    fn maybe_evict(&self, key: &CacheKey, new_entry_size: usize) {
        while self.entries.len() >= self.max_entries && !self.entries.is_empty() {
            if !self.evict_one(key) {
                break;
            }
        }

        while self.current_size.load(Ordering::Relaxed) + new_entry_size > self.max_size_bytes
            && !self.entries.is_empty()
        {
            if !self.evict_one(key) {
                break;
            }
        }
    }

    /// Evict one entry other than `keep`.
    fn evict_one(&self, keep: &CacheKey) -> bool {
        let victim = self
            .entries
            .iter()
            .map(|entry| entry.key().clone())
            .find(|k| k != keep);
        match victim {
            Some(key) => {
                self.remove_by_key(&key);
                true
            }
            None => false,
        }
    }

    fn remove_by_key(&self, key: &CacheKey) {
        if let Some((_, body)) = self.entries.remove(key) {
            self.current_size.fetch_sub(body.len(), Ordering::Relaxed);
        }
    }
}

impl CacheStore for MemoryStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Bytes>, CacheError> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    fn set(&self, key: CacheKey, value: Bytes) -> Result<(), CacheError> {
        if value.len() > self.max_size_bytes {
            return Err(CacheError::TooLarge {
                size: value.len(),
                limit: self.max_size_bytes,
            });
        }

        // Drop the old value's size first so replacement doesn't trigger eviction.
        self.remove_by_key(&key);
        self.maybe_evict(&key, value.len());

        self.current_size.fetch_add(value.len(), Ordering::Relaxed);
        if let Some(previous) = self.entries.insert(key, value) {
            // A concurrent writer raced us; account for its value too.
            self.current_size
                .fetch_sub(previous.len(), Ordering::Relaxed);
        }
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.remove_by_key(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), CacheError> {
        self.entries.clear();
        self.current_size.store(0, Ordering::Relaxed);
        Ok(())
    }
}

/// Cache-aside front used by request workers.
///
/// Only GET is ever read or written. Store failures are logged and treated
/// as misses; they never reach request callbacks.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}

impl fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseCache").finish_non_exhaustive()
    }
}

impl ResponseCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self { store }
    }

    /// Look up a cached body. Returns `None` on miss or store failure.
    pub fn lookup(&self, key: &CacheKey) -> Option<Bytes> {
        match self.store.get(key) {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cache read failed, treating as miss");
                None
            }
        }
    }

    /// Store a body, replacing any previous entry. Failures are logged only.
    pub fn store(&self, key: CacheKey, body: Bytes) {
        let key_str = key.to_string();
        if let Err(e) = self.store.set(key, body) {
            tracing::warn!(key = %key_str, error = %e, "cache write failed");
        }
    }

    /// Remove one entry.
    pub fn remove(&self, key: &CacheKey) {
        if let Err(e) = self.store.remove(key) {
            tracing::warn!(key = %key, error = %e, "cache remove failed");
        }
    }

    /// Remove every entry.
    pub fn clear(&self) {
        if let Err(e) = self.store.clear() {
            tracing::warn!(error = %e, "cache clear failed");
        }
    }
}
