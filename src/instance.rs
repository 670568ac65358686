//! Cache instance
//!
//! One named cache bound to a key prefix and a default TTL. Owns key
//! derivation, value serialization, the tag reverse index, and hit/miss
//! accounting. Every operation soft-fails: a store fault degrades the cache
//! to a miss or a `false` return and lands in the logs, never in the caller.

use crate::errors::CacheError;
use crate::keys::derive_key;
use crate::store::StoreProvider;
use crate::strategy::CacheStrategy;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Reverse-index entries live under this prefix: `tag:{name} -> [key, ...]`
const TAG_INDEX_PREFIX: &str = "tag:";

/// Grace period added to the tag index TTL so the index never expires
/// before its longest-lived member under normal conditions
const TAG_INDEX_GRACE: Duration = Duration::from_secs(300);

/// Per-call options for cache operations
#[derive(Debug, Clone, Default)]
pub struct CacheOptions {
    /// TTL override; strategy default when absent
    pub ttl: Option<Duration>,
    /// Extra tags recorded for this entry (merged with strategy tags)
    pub tags: Vec<String>,
    /// Tenant scope, inserted as a visible key segment
    /// (`prefix:scope:hash`) so scoped pattern invalidation can target it
    pub scope: Option<String>,
    /// Bypass the store entirely - short-circuits before key derivation
    pub skip_cache: bool,
}

impl CacheOptions {
    pub fn ttl(ttl: Duration) -> Self {
        Self {
            ttl: Some(ttl),
            ..Default::default()
        }
    }

    pub fn tagged(tags: Vec<String>) -> Self {
        Self {
            tags,
            ..Default::default()
        }
    }

    pub fn scoped(tenant: impl Into<String>) -> Self {
        Self {
            scope: Some(tenant.into()),
            ..Default::default()
        }
    }

    pub fn skip() -> Self {
        Self {
            skip_cache: true,
            ..Default::default()
        }
    }

    /// Attach a tenant scope to existing options
    pub fn with_scope(mut self, tenant: impl Into<String>) -> Self {
        self.scope = Some(tenant.into());
        self
    }
}

/// Entry for bulk warming: a precomputed value under a fixed logical key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmEntry {
    pub query_name: String,
    pub params: Value,
    pub value: Value,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Point-in-time statistics snapshot
///
/// `sets` and `deletes` count attempts (a down store still advances them);
/// `hits`/`misses` count read outcomes. `hit_rate` is a percentage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct AtomicCacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
}

impl AtomicCacheStats {
    fn snapshot(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let reads = hits + misses;
        let hit_rate = if reads > 0 {
            hits as f64 / reads as f64 * 100.0
        } else {
            0.0
        };

        CacheStats {
            hits,
            misses,
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            hit_rate,
        }
    }
}

/// One named cache over the shared store
pub struct CacheInstance {
    name: String,
    prefix: String,
    default_ttl: Duration,
    strategy_tags: Vec<String>,
    store: Arc<StoreProvider>,
    stats: AtomicCacheStats,
}

impl std::fmt::Debug for CacheInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheInstance")
            .field("name", &self.name)
            .field("prefix", &self.prefix)
            .field("default_ttl", &self.default_ttl)
            .finish()
    }
}

impl CacheInstance {
    /// Create an instance for a registered strategy
    pub fn from_strategy(strategy: &CacheStrategy, store: Arc<StoreProvider>) -> Self {
        Self {
            name: strategy.name.clone(),
            prefix: strategy.name.clone(),
            default_ttl: strategy.ttl(),
            strategy_tags: strategy.tags.clone(),
            store,
            stats: AtomicCacheStats::default(),
        }
    }

    /// Create a standalone instance (no registered strategy)
    pub fn new(name: impl Into<String>, default_ttl: Duration, store: Arc<StoreProvider>) -> Self {
        let name = name.into();
        Self {
            prefix: name.clone(),
            name,
            default_ttl: default_ttl.max(Duration::from_secs(1)),
            strategy_tags: Vec::new(),
            store,
            stats: AtomicCacheStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Derived key for a logical query (exposed for diagnostics)
    pub fn key_for(&self, query_name: &str, params: &Value, opts: &CacheOptions) -> String {
        derive_key(&self.effective_prefix(opts), query_name, params)
    }

    /// Key prefix with the tenant scope segment applied when present
    fn effective_prefix(&self, opts: &CacheOptions) -> String {
        match &opts.scope {
            Some(scope) => format!("{}:{}", self.prefix, scope),
            None => self.prefix.clone(),
        }
    }

    /// Get a cached value, or `None` on miss
    ///
    /// A store fault is a miss with a warning in the logs; a value that no
    /// longer deserializes is a miss with an error (that one is a caller bug).
    pub async fn get<T: DeserializeOwned>(
        &self,
        query_name: &str,
        params: &Value,
        opts: &CacheOptions,
    ) -> Option<T> {
        if opts.skip_cache {
            debug!(cache = %self.name, query = query_name, "Cache bypassed (skip_cache)");
            return None;
        }

        let key = derive_key(&self.effective_prefix(opts), query_name, params);

        match self.store.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
                Ok(value) => {
                    self.stats.hits.fetch_add(1, Ordering::Relaxed);
                    debug!(cache = %self.name, key = %key, "Cache HIT");
                    Some(value)
                }
                Err(e) => {
                    self.stats.misses.fetch_add(1, Ordering::Relaxed);
                    error!(
                        cache = %self.name,
                        key = %key,
                        error = %CacheError::SerializationError(e.to_string()),
                        "Cached value failed to deserialize, treating as miss"
                    );
                    None
                }
            },
            Ok(None) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                debug!(cache = %self.name, key = %key, "Cache MISS");
                None
            }
            Err(e) => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                warn!(
                    cache = %self.name,
                    key = %key,
                    error = %e,
                    "Store read failed, treating as miss"
                );
                None
            }
        }
    }

    /// Write a value; returns whether the store accepted it
    pub async fn set<T: Serialize>(
        &self,
        query_name: &str,
        params: &Value,
        value: &T,
        opts: &CacheOptions,
    ) -> bool {
        if opts.skip_cache {
            debug!(cache = %self.name, query = query_name, "Cache bypassed (skip_cache)");
            return false;
        }

        self.stats.sets.fetch_add(1, Ordering::Relaxed);

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                error!(
                    cache = %self.name,
                    query = query_name,
                    error = %CacheError::SerializationError(e.to_string()),
                    "Value failed to serialize, skipping cache write"
                );
                return false;
            }
        };

        let ttl = opts
            .ttl
            .unwrap_or(self.default_ttl)
            .max(Duration::from_secs(1));
        let key = derive_key(&self.effective_prefix(opts), query_name, params);

        if let Err(e) = self.store.set(&key, &raw, ttl).await {
            warn!(cache = %self.name, key = %key, error = %e, "Store write failed");
            return false;
        }

        let tags = self.merged_tags(&opts.tags);
        if !tags.is_empty() {
            self.index_tags(&key, &tags, ttl).await;
        }

        debug!(cache = %self.name, key = %key, ttl_seconds = ttl.as_secs(), "Cache SET");
        true
    }

    /// Remove a single entry; returns whether a key was removed
    pub async fn delete(&self, query_name: &str, params: &Value, opts: &CacheOptions) -> bool {
        if opts.skip_cache {
            return false;
        }

        self.stats.deletes.fetch_add(1, Ordering::Relaxed);
        let key = derive_key(&self.effective_prefix(opts), query_name, params);

        match self.store.delete(&key).await {
            Ok(removed) => {
                debug!(cache = %self.name, key = %key, removed = removed, "Cache DEL");
                removed
            }
            Err(e) => {
                warn!(cache = %self.name, key = %key, error = %e, "Store delete failed");
                false
            }
        }
    }

    /// Check whether an entry currently exists
    pub async fn exists(&self, query_name: &str, params: &Value, opts: &CacheOptions) -> bool {
        if opts.skip_cache {
            return false;
        }

        let key = derive_key(&self.effective_prefix(opts), query_name, params);
        match self.store.exists(&key).await {
            Ok(present) => present,
            Err(e) => {
                warn!(cache = %self.name, key = %key, error = %e, "Store exists failed");
                false
            }
        }
    }

    /// Seconds to expiry with the store's sentinel semantics
    /// (`-1` no expiry, `-2` missing)
    pub async fn ttl(&self, query_name: &str, params: &Value, opts: &CacheOptions) -> i64 {
        if opts.skip_cache {
            return crate::store::TTL_MISSING;
        }

        let key = derive_key(&self.effective_prefix(opts), query_name, params);
        match self.store.ttl(&key).await {
            Ok(remaining) => remaining,
            Err(e) => {
                warn!(cache = %self.name, key = %key, error = %e, "Store ttl failed");
                crate::store::TTL_MISSING
            }
        }
    }

    /// Delete every key recorded under each tag, then the tag index entries
    /// themselves; returns the number of member keys deleted
    ///
    /// A key listed under several tags is removed by whichever tag flush
    /// reaches it first - over-deletion is the accepted direction.
    pub async fn invalidate_by_tags(&self, tags: &[String]) -> u64 {
        let mut deleted: u64 = 0;

        for tag in tags {
            let index_key = format!("{}{}", TAG_INDEX_PREFIX, tag);

            let members = match self.store.get(&index_key).await {
                Ok(Some(raw)) => match serde_json::from_str::<Vec<String>>(&raw) {
                    Ok(members) => members,
                    Err(e) => {
                        error!(tag = %tag, error = %e, "Tag index entry is corrupt, dropping it");
                        let _ = self.store.delete(&index_key).await;
                        continue;
                    }
                },
                Ok(None) => continue, // Unknown tag: no-op
                Err(e) => {
                    warn!(tag = %tag, error = %e, "Tag index read failed");
                    continue;
                }
            };

            for member in &members {
                match self.store.delete(member).await {
                    Ok(true) => deleted += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(key = %member, error = %e, "Tagged key delete failed");
                    }
                }
            }

            if let Err(e) = self.store.delete(&index_key).await {
                warn!(tag = %tag, error = %e, "Tag index delete failed");
            }

            debug!(tag = %tag, members = members.len(), "Tag invalidated");
        }

        deleted
    }

    /// Delete every key matching a glob pattern; returns the count deleted
    pub async fn invalidate_by_pattern(&self, pattern: &str) -> u64 {
        match self.store.delete_pattern(pattern).await {
            Ok(count) => {
                debug!(cache = %self.name, pattern = pattern, deleted = count, "Pattern invalidated");
                count
            }
            Err(e) => {
                warn!(cache = %self.name, pattern = pattern, error = %e, "Pattern delete failed");
                0
            }
        }
    }

    /// Bulk-write precomputed entries; returns the count accepted by the store
    pub async fn warm(&self, entries: &[WarmEntry]) -> u64 {
        let mut written: u64 = 0;

        for entry in entries {
            let opts = CacheOptions::tagged(entry.tags.clone());
            if self
                .set(&entry.query_name, &entry.params, &entry.value, &opts)
                .await
            {
                written += 1;
            }
        }

        debug!(cache = %self.name, requested = entries.len(), written = written, "Cache warmed");
        written
    }

    /// Current statistics snapshot
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    fn merged_tags(&self, extra: &[String]) -> Vec<String> {
        let mut tags = self.strategy_tags.clone();
        for tag in extra {
            if !tags.contains(tag) {
                tags.push(tag.clone());
            }
        }
        tags
    }

    /// Append a key into each tag's reverse index
    ///
    /// Read-modify-write without a conditional swap: two concurrent writers
    /// tagging the same tag can race and one membership update can be lost.
    /// Accepted - a key that escapes the index still dies by TTL, and the
    /// store-native set-union alternative is not portable across backends.
    async fn index_tags(&self, key: &str, tags: &[String], entry_ttl: Duration) {
        let index_ttl = entry_ttl + TAG_INDEX_GRACE;

        for tag in tags {
            let index_key = format!("{}{}", TAG_INDEX_PREFIX, tag);

            let mut members = match self.store.get(&index_key).await {
                Ok(Some(raw)) => serde_json::from_str::<Vec<String>>(&raw).unwrap_or_default(),
                Ok(None) => Vec::new(),
                Err(e) => {
                    warn!(tag = %tag, error = %e, "Tag index read failed, skipping tag");
                    continue;
                }
            };

            if !members.iter().any(|m| m == key) {
                members.push(key.to_string());
            }

            let raw = match serde_json::to_string(&members) {
                Ok(raw) => raw,
                Err(e) => {
                    error!(tag = %tag, error = %e, "Tag index failed to serialize");
                    continue;
                }
            };

            if let Err(e) = self.store.set(&index_key, &raw, index_ttl).await {
                warn!(tag = %tag, error = %e, "Tag index write failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct DashboardSummary {
        open_jobs: u32,
        active_candidates: u32,
    }

    fn memory_instance(name: &str, ttl: Duration) -> CacheInstance {
        CacheInstance::new(name, ttl, Arc::new(StoreProvider::memory()))
    }

    #[tokio::test]
    async fn test_round_trip() {
        let cache = memory_instance("dashboard", Duration::from_secs(60));
        let summary = DashboardSummary {
            open_jobs: 12,
            active_candidates: 340,
        };

        let params = json!({"company_id": "acme"});
        assert!(
            cache
                .set("summary", &params, &summary, &CacheOptions::default())
                .await
        );

        let cached: Option<DashboardSummary> = cache
            .get("summary", &params, &CacheOptions::default())
            .await;
        assert_eq!(cached, Some(summary));
    }

    #[tokio::test]
    async fn test_miss_on_absent_entry() {
        let cache = memory_instance("dashboard", Duration::from_secs(60));
        let result: Option<DashboardSummary> = cache
            .get("summary", &json!({}), &CacheOptions::default())
            .await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_skip_cache_short_circuits() {
        let cache = memory_instance("dashboard", Duration::from_secs(60));
        let params = json!({"company_id": "acme"});

        cache
            .set("summary", &params, &json!({"v": 1}), &CacheOptions::default())
            .await;

        // Read bypass misses even though the entry exists, and records nothing
        let before = cache.stats();
        let result: Option<Value> = cache.get("summary", &params, &CacheOptions::skip()).await;
        assert!(result.is_none());
        assert_eq!(cache.stats().misses, before.misses);

        // Write bypass writes nothing
        assert!(
            !cache
                .set("other", &params, &json!({"v": 2}), &CacheOptions::skip())
                .await
        );
        let skipped: Option<Value> = cache.get("other", &params, &CacheOptions::default()).await;
        assert!(skipped.is_none());
    }

    #[tokio::test]
    async fn test_ttl_override_and_clamp() {
        let cache = memory_instance("dashboard", Duration::from_secs(300));
        let params = json!({});

        cache
            .set(
                "short_lived",
                &params,
                &json!(1),
                &CacheOptions::ttl(Duration::ZERO),
            )
            .await;

        // Zero TTL clamps to one second, not an unexpiring entry
        let remaining = cache.ttl("short_lived", &params, &CacheOptions::default()).await;
        assert_eq!(remaining, 1);
    }

    #[tokio::test]
    async fn test_delete_and_exists() {
        let cache = memory_instance("jobs", Duration::from_secs(60));
        let params = json!({"page": 1});

        cache
            .set("list", &params, &json!(["job1"]), &CacheOptions::default())
            .await;
        assert!(cache.exists("list", &params, &CacheOptions::default()).await);

        assert!(cache.delete("list", &params, &CacheOptions::default()).await);
        assert!(!cache.exists("list", &params, &CacheOptions::default()).await);
        assert!(!cache.delete("list", &params, &CacheOptions::default()).await);
    }

    #[tokio::test]
    async fn test_tag_invalidation_removes_all_members() {
        let cache = memory_instance("dashboard", Duration::from_secs(60));
        let tag_opts = CacheOptions::tagged(vec!["acme".to_string()]);

        cache.set("q1", &json!({}), &json!(1), &tag_opts).await;
        cache.set("q2", &json!({}), &json!(2), &tag_opts).await;

        let deleted = cache.invalidate_by_tags(&["acme".to_string()]).await;
        assert_eq!(deleted, 2);

        let r1: Option<Value> = cache.get("q1", &json!({}), &CacheOptions::default()).await;
        let r2: Option<Value> = cache.get("q2", &json!({}), &CacheOptions::default()).await;
        assert!(r1.is_none() && r2.is_none());

        // Second flush finds no index entry
        assert_eq!(cache.invalidate_by_tags(&["acme".to_string()]).await, 0);
    }

    #[tokio::test]
    async fn test_unknown_tag_is_noop() {
        let cache = memory_instance("dashboard", Duration::from_secs(60));
        assert_eq!(cache.invalidate_by_tags(&["ghost".to_string()]).await, 0);
    }

    #[tokio::test]
    async fn test_pattern_invalidation_scoped_to_prefix() {
        let store = Arc::new(StoreProvider::memory());
        let dashboard = CacheInstance::new("dashboard", Duration::from_secs(60), store.clone());
        let jobs = CacheInstance::new("jobs", Duration::from_secs(60), store);

        dashboard
            .set("q", &json!({"n": 1}), &json!(1), &CacheOptions::default())
            .await;
        dashboard
            .set("q", &json!({"n": 2}), &json!(2), &CacheOptions::default())
            .await;
        jobs.set("q", &json!({"n": 1}), &json!(3), &CacheOptions::default())
            .await;

        assert_eq!(dashboard.invalidate_by_pattern("dashboard:*").await, 2);

        // Sibling prefix untouched
        let survivor: Option<Value> = jobs.get("q", &json!({"n": 1}), &CacheOptions::default()).await;
        assert_eq!(survivor, Some(json!(3)));
    }

    #[tokio::test]
    async fn test_hit_rate_accounting() {
        let cache = memory_instance("dashboard", Duration::from_secs(60));
        let params = json!({});

        cache
            .set("q", &params, &json!(1), &CacheOptions::default())
            .await;

        for _ in 0..3 {
            let _: Option<Value> = cache.get("q", &params, &CacheOptions::default()).await;
        }
        let _: Option<Value> = cache.get("absent", &params, &CacheOptions::default()).await;

        let stats = cache.stats();
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert!((stats.hit_rate - 75.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_soft_failure_when_store_unreachable() {
        let cache = CacheInstance::new(
            "dashboard",
            Duration::from_secs(60),
            Arc::new(StoreProvider::failing()),
        );
        let params = json!({});

        let result: Option<Value> = cache.get("q", &params, &CacheOptions::default()).await;
        assert!(result.is_none());
        assert!(!cache.set("q", &params, &json!(1), &CacheOptions::default()).await);
        assert!(!cache.delete("q", &params, &CacheOptions::default()).await);
        assert_eq!(cache.invalidate_by_pattern("dashboard:*").await, 0);
        assert_eq!(cache.invalidate_by_tags(&["t".to_string()]).await, 0);

        // Attempt counters still advance
        let stats = cache.stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.sets, 1);
        assert_eq!(stats.deletes, 1);
    }

    #[tokio::test]
    async fn test_undeserializable_entry_is_a_miss() {
        let cache = memory_instance("dashboard", Duration::from_secs(60));
        let params = json!({});

        cache
            .set("q", &params, &json!({"open_jobs": "not-a-number"}), &CacheOptions::default())
            .await;

        let result: Option<DashboardSummary> =
            cache.get("q", &params, &CacheOptions::default()).await;
        assert!(result.is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn test_warm_bulk_writes() {
        let cache = memory_instance("dashboard", Duration::from_secs(60));

        let entries = vec![
            WarmEntry {
                query_name: "summary".to_string(),
                params: json!({"company_id": "acme"}),
                value: json!({"open_jobs": 4}),
                tags: vec!["acme".to_string()],
            },
            WarmEntry {
                query_name: "recent_activity".to_string(),
                params: json!({"company_id": "acme"}),
                value: json!([]),
                tags: vec![],
            },
        ];

        assert_eq!(cache.warm(&entries).await, 2);

        let warmed: Option<Value> = cache
            .get("summary", &json!({"company_id": "acme"}), &CacheOptions::default())
            .await;
        assert_eq!(warmed, Some(json!({"open_jobs": 4})));
    }

    #[tokio::test]
    async fn test_scoped_writes_land_under_tenant_segment() {
        let cache = memory_instance("dashboard", Duration::from_secs(60));
        let params = json!({});
        let scoped = CacheOptions::scoped("acme");

        let key = cache.key_for("summary", &params, &scoped);
        assert!(key.starts_with("dashboard:acme:"));

        cache.set("summary", &params, &json!(1), &scoped).await;

        // Scoped and unscoped reads are different entries
        let unscoped: Option<Value> = cache
            .get("summary", &params, &CacheOptions::default())
            .await;
        assert!(unscoped.is_none());

        let scoped_read: Option<Value> = cache.get("summary", &params, &scoped).await;
        assert_eq!(scoped_read, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_strategy_tags_applied_on_set() {
        let strategy = crate::strategy::CacheStrategy::new("dashboard", 300)
            .with_tags(vec!["dashboard".to_string()]);
        let cache =
            CacheInstance::from_strategy(&strategy, Arc::new(StoreProvider::memory()));

        cache
            .set("q", &json!({}), &json!(1), &CacheOptions::default())
            .await;

        // The strategy-level tag indexes the entry without per-call tags
        assert_eq!(cache.invalidate_by_tags(&["dashboard".to_string()]).await, 1);
    }
}
