//! In-memory thumbnail cache bounded by entry count and total bytes.
//!
//! Recency tracking and O(1) eviction come from [`lru::LruCache`] in its
//! unbounded mode; both limits are enforced here so the byte total can be
//! kept exact. One `RwLock` guards the map, the recency list and the byte
//! counter together. `get` takes the write side because a hit reorders the
//! recency list; `len` and `size` only read.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use lru::LruCache;

#[derive(Debug)]
struct Inner {
    entries: LruCache<String, Vec<u8>>,
    bytes: u64,
}

impl Inner {
    fn evict_oldest(&mut self) -> bool {
        match self.entries.pop_lru() {
            Some((key, data)) => {
                self.bytes -= data.len() as u64;
                tracing::trace!(key = %key, bytes = data.len(), "evicted thumbnail from cache");
                true
            }
            None => false,
        }
    }
}

#[derive(Debug)]
pub struct ThumbnailCache {
    capacity: usize,
    max_bytes: u64,
    inner: RwLock<Inner>,
}

impl ThumbnailCache {
    /// A cache holding at most `capacity` entries and `max_bytes` bytes of payload.
    /// A capacity of zero disables caching.
    pub fn new(capacity: usize, max_bytes: u64) -> Self {
        Self {
            capacity,
            max_bytes,
            inner: RwLock::new(Inner {
                entries: LruCache::unbounded(),
                bytes: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    // A panic while holding the lock can only leave a half-applied eviction
    // behind; the cache is never a source of truth, so keep serving from it.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up `key`, marking it most recently used on a hit.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.write().entries.get(key).cloned()
    }

    /// Insert or replace `key`.
    ///
    /// A payload larger than the byte budget on its own is dropped without
    /// touching the cache. Otherwise least recently used entries are evicted
    /// until both limits hold with the new entry in place.
    pub fn set(&self, key: &str, data: Vec<u8>) {
        let size = data.len() as u64;
        if self.capacity == 0 || size > self.max_bytes {
            return;
        }

        let mut inner = self.write();

        if let Some(existing) = inner.entries.get_mut(key) {
            let old = std::mem::replace(existing, data);
            inner.bytes = inner.bytes - old.len() as u64 + size;
            // The replaced key is now the most recent entry, so it is the
            // last candidate for eviction and fits the budget alone.
            while inner.bytes > self.max_bytes && inner.evict_oldest() {}
            return;
        }

        while inner.entries.len() >= self.capacity
            || (inner.bytes + size > self.max_bytes && !inner.entries.is_empty())
        {
            if !inner.evict_oldest() {
                break;
            }
        }

        inner.entries.put(key.to_string(), data);
        inner.bytes += size;
    }

    pub fn delete(&self, key: &str) {
        let mut inner = self.write();
        if let Some(data) = inner.entries.pop(key) {
            inner.bytes -= data.len() as u64;
        }
    }

    pub fn clear(&self) {
        let mut inner = self.write();
        inner.entries.clear();
        inner.bytes = 0;
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total payload bytes currently cached.
    pub fn size(&self) -> u64 {
        self.read().bytes
    }
}
