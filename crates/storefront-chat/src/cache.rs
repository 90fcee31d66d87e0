//! In-memory TTL caches for pages, harvested sets, and chat responses.
//!
//! ## Expiry
//!
//! Entries are never swept in the background. Freshness is checked on read:
//! an entry is valid while `now - inserted_at <= ttl`, and a stale entry is
//! evicted by the read that finds it. The clock is injectable so TTL
//! boundaries can be tested without sleeping.
//!
//! ## Size cap
//!
//! A cache built with [`TtlCache::with_max_entries`] makes room on insert:
//! stale entries go first, then the oldest write.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(|e| e.into_inner());
        self.origin + offset
    }
}

/// Cache entry with its write time.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    inserted_at: Instant,
    value: V,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant, ttl: Duration) -> bool {
        now.saturating_duration_since(self.inserted_at) > ttl
    }
}

/// Keyed cache with lazy TTL expiry.
pub struct TtlCache<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
    max_entries: Option<usize>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache on the system clock.
    pub fn new(default_ttl: Duration) -> Self {
        Self::with_clock(default_ttl, Arc::new(SystemClock))
    }

    /// Create a cache on a caller-supplied clock.
    pub fn with_clock(default_ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl,
            max_entries: None,
            clock,
        }
    }

    /// Bound the number of stored entries.
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries.max(1));
        self
    }

    /// Look up a fresh entry using the cache's default TTL.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_within(key, self.default_ttl)
    }

    /// Look up a fresh entry, judging freshness against `ttl`.
    ///
    /// The TTL is applied at read time to the entry's original write time,
    /// so two readers with different TTLs can disagree about one entry.
    pub fn get_within(&self, key: &str, ttl: Duration) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if !entry.is_expired(now, ttl) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    /// Store a value, replacing any previous entry for the key.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let now = self.clock.now();
        let key = key.into();
        let mut entries = self.lock();

        if let Some(max) = self.max_entries {
            if !entries.contains_key(&key) && entries.len() >= max {
                let ttl = self.default_ttl;
                entries.retain(|_, e| !e.is_expired(now, ttl));
            }
            while !entries.contains_key(&key) && entries.len() >= max {
                let oldest = entries
                    .iter()
                    .min_by_key(|(_, e)| e.inserted_at)
                    .map(|(k, _)| k.clone());
                match oldest {
                    Some(k) => entries.remove(&k),
                    None => break,
                };
            }
        }

        entries.insert(
            key,
            CacheEntry {
                inserted_at: now,
                value,
            },
        );
    }

    /// Remove one entry.
    pub fn invalidate(&self, key: &str) {
        self.lock().remove(key);
    }

    /// Remove everything.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries (including ones not yet found stale).
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}
