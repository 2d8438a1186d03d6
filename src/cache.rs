//! Bounded TTL cache for telemetry lookup results
//!
//! Capacity- and time-bounded key/value store shared by the single- and
//! multi-cluster lookup paths. Eviction is insertion-ordered (oldest entry
//! first) so it stays O(1); expiry is lazy on access. A zero capacity or
//! zero TTL turns the cache into an always-miss pass-through, which is how
//! `cache.enabled = false` is implemented.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use crate::config::CacheConfig;

/// Thread-safe bounded cache with TTL expiry
pub struct TtlCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
    ttl: Duration,
    stats: CacheStats,
}

struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Keys in insertion order; the front is the eviction candidate.
    /// Overwrites keep their original position, so eviction order is
    /// first-insertion order rather than strict LRU.
    order: VecDeque<K>,
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

impl<V> Entry<V> {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.inserted_at.elapsed() > ttl
    }
}

/// Cache statistics tracked atomically
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Snapshot of cache statistics
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CacheStatsSnapshot {
    /// Total cache hits
    pub hits: u64,
    /// Total cache misses
    pub misses: u64,
    /// Total evictions (capacity and expiry)
    pub evictions: u64,
    /// Current number of entries
    pub size: usize,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    V: Clone,
{
    /// Create a cache with the given capacity and TTL.
    ///
    /// A capacity or TTL of zero yields a disabled cache: every `put` is
    /// dropped and every `get` misses.
    #[must_use]
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
            }),
            capacity,
            ttl,
            stats: CacheStats::default(),
        }
    }

    /// Create a cache from configuration; `enabled = false` maps to the
    /// zero-capacity disabled mode.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        if config.enabled {
            Self::new(config.max_entries, config.ttl)
        } else {
            Self::new(0, Duration::ZERO)
        }
    }

    /// Whether writes are dropped and reads always miss
    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.capacity == 0 || self.ttl.is_zero()
    }

    /// Get a cloned value if present and not expired
    pub fn get(&self, key: &K) -> Option<V> {
        if self.is_disabled() {
            self.stats.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let mut inner = self.inner.lock();
        self.expire_front(&mut inner);

        match inner.entries.get(key) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            Some(_) => {
                // Expired but not yet at the queue front; drop it eagerly
                inner.entries.remove(key);
                inner.order.retain(|k| k != key);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!(?key, "Cache entry expired");
                None
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store or overwrite a value, evicting the oldest entry at capacity
    pub fn put(&self, key: K, value: V) {
        if self.is_disabled() {
            return;
        }

        let mut inner = self.inner.lock();
        self.expire_front(&mut inner);

        let entry = Entry {
            value,
            inserted_at: Instant::now(),
        };

        if inner.entries.insert(key.clone(), entry).is_some() {
            // Overwrite: the key keeps its place in the order queue
            return;
        }

        inner.order.push_back(key);
        while inner.entries.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(key = ?oldest, "Cache entry evicted at capacity");
            } else {
                break;
            }
        }
    }

    /// Current number of live (unexpired) entries
    pub fn len(&self) -> usize {
        let mut inner = self.inner.lock();
        self.expire_front(&mut inner);
        inner.entries.len()
    }

    /// Whether the cache currently holds no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStatsSnapshot {
        CacheStatsSnapshot {
            hits: self.stats.hits.load(Ordering::Relaxed),
            misses: self.stats.misses.load(Ordering::Relaxed),
            evictions: self.stats.evictions.load(Ordering::Relaxed),
            size: self.inner.lock().entries.len(),
        }
    }

    /// Remove expired entries from the front of the age queue. Entries age
    /// in insertion order, so stopping at the first live entry is enough.
    fn expire_front(&self, inner: &mut Inner<K, V>) {
        while let Some(front) = inner.order.front() {
            let expired = inner
                .entries
                .get(front)
                .is_none_or(|entry| entry.is_expired(self.ttl));
            if !expired {
                break;
            }
            if let Some(key) = inner.order.pop_front() {
                if inner.entries.remove(&key).is_some() {
                    self.stats.evictions.fetch_add(1, Ordering::Relaxed);
                    debug!(?key, "Cache entry expired");
                }
            }
        }
    }
}
