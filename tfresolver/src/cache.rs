//! In-memory TTL cache with a FIFO size bound
//!
//! Every entry carries its own expiry instant. Inserting past the bound
//! evicts the oldest insertion; putting an existing key again counts as a
//! fresh insertion and moves it to the back of the eviction order.
//!
//! Time comes from [`tokio::time::Instant`], so tests can drive expiry with
//! a paused clock.

use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

/// Counters since creation (or the last [`Cache::clear`])
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub expirations: u64,
    /// Entries currently held, fresh or not yet purged
    pub entries: usize,
}

impl CacheStats {
    pub fn hit_ratio(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

struct Slot<V> {
    value: V,
    expires_at: Instant,
    generation: u64,
}

impl<V> Slot<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

struct Inner<K, V> {
    entries: HashMap<K, Slot<V>>,
    /// Insertion order; entries whose generation no longer matches are stale
    order: VecDeque<(K, u64)>,
    next_generation: u64,
    stats: CacheStats,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    /// Returns the live slot for `key`, dropping it first if it has expired
    fn live(&mut self, key: &K, now: Instant) -> Option<&Slot<V>> {
        let expired = self.entries.get(key)?.is_expired(now);
        if expired {
            self.entries.remove(key);
            self.stats.expirations += 1;
            return None;
        }
        self.entries.get(key)
    }

    fn evict_overflow(&mut self, max_entries: usize) {
        while self.entries.len() > max_entries {
            let Some((key, generation)) = self.order.pop_front() else {
                break;
            };
            if self.entries.get(&key).is_some_and(|s| s.generation == generation) {
                self.entries.remove(&key);
                self.stats.evictions += 1;
            }
        }

        // re-puts and invalidations leave stale markers behind
        if self.order.len() > max_entries.saturating_mul(2) + 16 {
            let entries = &self.entries;
            self.order
                .retain(|(key, generation)| entries.get(key).is_some_and(|s| s.generation == *generation));
        }
    }
}

/// Thread-safe cache; methods take `&self` and never block across `.await`
pub struct Cache<K, V> {
    inner: Mutex<Inner<K, V>>,
    default_ttl: Duration,
    max_entries: usize,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// `max_entries` is raised to at least 1
    pub fn new(default_ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                next_generation: 0,
                stats: CacheStats::default(),
            }),
            default_ttl,
            max_entries: max_entries.max(1),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Fresh value for `key`; an expired entry is removed and reported as a miss
    pub fn get(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let value = inner.live(key, Instant::now()).map(|slot| slot.value.clone());
        match value {
            Some(_) => inner.stats.hits += 1,
            None => inner.stats.misses += 1,
        }
        value
    }

    pub fn put(&self, key: K, value: V) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    pub fn put_with_ttl(&self, key: K, value: V, ttl: Duration) {
        let mut inner = self.inner.lock();
        let generation = inner.next_generation;
        inner.next_generation += 1;

        inner.order.push_back((key.clone(), generation));
        inner.entries.insert(
            key,
            Slot {
                value,
                expires_at: Instant::now() + ttl,
                generation,
            },
        );
        inner.stats.insertions += 1;
        inner.evict_overflow(self.max_entries);
    }

    /// Removes `key`, returning the value if it was still fresh
    pub fn invalidate(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let slot = inner.entries.remove(key)?;
        (!slot.is_expired(Instant::now())).then_some(slot.value)
    }

    /// Whether a fresh value is held; does not touch hit/miss counters
    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().live(key, Instant::now()).is_some()
    }

    /// Time left before `key` expires
    pub fn time_to_live(&self, key: &K) -> Option<Duration> {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner.live(key, now).map(|slot| slot.expires_at - now)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|_, slot| !slot.is_expired(now));
        let removed = before - inner.entries.len();
        inner.stats.expirations += removed as u64;
        removed
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
        inner.stats = CacheStats::default();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.entries.len(),
            ..inner.stats
        }
    }
}
