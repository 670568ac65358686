//! In-process store provider
//!
//! DashMap-backed store with per-entry expiry instants. Unlike a plain
//! memoization cache, this provider implements the full store contract the
//! engine relies on - TTL introspection and glob pattern enumeration - so
//! development and test environments exercise the same code paths as Redis.
//!
//! **Important**: this store is NOT distributed. Each process holds its own
//! state, so invalidations issued by another process are never observed.

use crate::errors::CacheResult;
use crate::store::traits::KeyValueStore;
use crate::store::{TTL_MISSING, TTL_NO_EXPIRY};
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        matches!(self.expires_at, Some(deadline) if deadline <= now)
    }
}

/// In-process key-value store with real TTL and pattern semantics
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, MemoryEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Number of live (non-expired) entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries eagerly.
    ///
    /// Expiry is otherwise lazy (checked on access); long-lived processes
    /// with churny keys can call this from a maintenance tick.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                debug!(key = key, "Store HIT (memory)");
                return Ok(Some(entry.value.clone()));
            }
        }

        // Expired entries are removed on first observation
        self.entries
            .remove_if(key, |_, entry| entry.is_expired(now));
        debug!(key = key, "Store MISS (memory)");
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let ttl = ttl.max(Duration::from_secs(1));
        self.entries.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );

        debug!(key = key, ttl_seconds = ttl.as_secs(), "Store SET (memory)");
        Ok(())
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        let now = Instant::now();
        let removed = match self.entries.remove(key) {
            Some((_, entry)) => !entry.is_expired(now),
            None => false,
        };
        debug!(key = key, removed = removed, "Store DEL (memory)");
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        let now = Instant::now();
        Ok(self
            .entries
            .get(key)
            .map(|entry| !entry.is_expired(now))
            .unwrap_or(false))
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        let now = Instant::now();

        match self.entries.get(key) {
            Some(entry) if !entry.is_expired(now) => match entry.expires_at {
                // Round up so a freshly written 1s entry reports 1, not 0
                Some(deadline) => Ok((deadline - now).as_secs_f64().ceil() as i64),
                None => Ok(TTL_NO_EXPIRY),
            },
            _ => Ok(TTL_MISSING),
        }
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        let now = Instant::now();
        Ok(self
            .entries
            .iter()
            .filter(|entry| !entry.value().is_expired(now))
            .filter(|entry| glob_match(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        let matching = self.keys(pattern).await?;
        let mut deleted: u64 = 0;

        for key in &matching {
            if self.entries.remove(key).is_some() {
                deleted += 1;
            }
        }

        debug!(pattern = pattern, deleted = deleted, "Store pattern DEL (memory)");
        Ok(deleted)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "memory"
    }

    fn is_distributed(&self) -> bool {
        false
    }
}

/// Match a key against a Redis-style glob pattern (`*` and `?`).
///
/// Iterative two-pointer matcher with backtracking on the most recent `*`;
/// mirrors the MATCH subset the engine actually emits.
fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();

    let (mut p, mut k) = (0usize, 0usize);
    let mut star: Option<usize> = None;
    let mut star_k = 0usize;

    while k < key.len() {
        if p < pattern.len() && (pattern[p] == '?' || pattern[p] == key[k]) {
            p += 1;
            k += 1;
        } else if p < pattern.len() && pattern[p] == '*' {
            star = Some(p);
            star_k = k;
            p += 1;
        } else if let Some(star_p) = star {
            p = star_p + 1;
            star_k += 1;
            k = star_k;
        } else {
            return false;
        }
    }

    while p < pattern.len() && pattern[p] == '*' {
        p += 1;
    }

    p == pattern.len()
}
