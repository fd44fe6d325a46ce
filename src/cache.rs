//! Time-bounded memoization table
//!
//! Entries expire `ttl` after insertion. Expired entries are invisible to
//! readers and are replaced by the next writer. Writers also sweep the whole
//! table at most once per TTL period, so abandoned keys do not accumulate.
//! A zero TTL disables the cache.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
struct Table<K, V> {
    entries: HashMap<K, CacheEntry<V>>,
    /// Next time a writer sweeps expired entries
    sweep_at: Option<Instant>,
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash,
{
    fn sweep(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }
}

/// Thread-safe cache with a fixed time-to-live
#[derive(Debug)]
pub struct TtlCache<K, V> {
    table: RwLock<Table<K, V>>,
    ttl: Duration,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            table: RwLock::new(Table {
                entries: HashMap::new(),
                sweep_at: None,
            }),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn is_enabled(&self) -> bool {
        !self.ttl.is_zero()
    }

    /// Live value for `key`, if any
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let now = Instant::now();
        self.read()
            .entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| entry.value.clone())
    }

    /// Store `value` unless a live entry already exists
    ///
    /// Returns the value now cached under `key`: the existing one when another
    /// writer got there first, otherwise `value`.
    pub fn insert_if_absent(&self, key: K, value: V) -> V {
        if !self.is_enabled() {
            return value;
        }

        let now = Instant::now();
        let mut table = self.write();

        let due = table.sweep_at;
        match due {
            Some(due) if now >= due => {
                let removed = table.sweep(now);
                if removed > 0 {
                    tracing::debug!(removed, "swept expired cache entries");
                }
                table.sweep_at = Some(now + self.ttl);
            }
            None => table.sweep_at = Some(now + self.ttl),
            Some(_) => {}
        }

        if let Some(existing) = table.entries.get(&key) {
            if !existing.is_expired(now) {
                return existing.value.clone();
            }
        }

        table.entries.insert(
            key,
            CacheEntry {
                value: value.clone(),
                expires_at: now + self.ttl,
            },
        );
        value
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.write().sweep(Instant::now())
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.write().entries.clear();
    }

    fn read(&self) -> RwLockReadGuard<'_, Table<K, V>> {
        self.table.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Table<K, V>> {
        self.table.write().unwrap_or_else(|p| p.into_inner())
    }
}
