//! Cache registry
//!
//! Owns the set of named strategies and one live `CacheInstance` per
//! strategy - the two maps are always updated together, so a registered
//! strategy can never be missing its instance. The registry is constructed
//! explicitly and passed to callers (application context / dependency
//! injection); there is no lazily-initialized global.
//!
//! Cross-entity invalidation helpers live here: mutating an application,
//! job, candidate, or company flushes the entity's own keys plus every
//! aggregate view that might embed it. Over-invalidation is the deliberate
//! default - a stale dashboard costs more than a recomputed one.

use crate::config::CacheEngineConfig;
use crate::instance::{CacheInstance, CacheStats};
use crate::store::StoreProvider;
use crate::strategy::{default_strategies, CacheStrategy};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Liveness/readiness report for operational dashboards
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryHealth {
    /// Whether the backing store answered its health probe
    pub store_reachable: bool,
    /// Active store provider name ("redis", "memory", "noop", ...)
    pub provider: String,
    /// Registered strategy names
    pub strategies: Vec<String>,
    /// Per-strategy statistics
    pub stats: HashMap<String, CacheStats>,
}

/// Process-wide registry of strategies and their cache instances
pub struct CacheRegistry {
    store: Arc<StoreProvider>,
    strategies: DashMap<String, CacheStrategy>,
    instances: DashMap<String, Arc<CacheInstance>>,
    background_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("provider", &self.store.provider_name())
            .field("strategies", &self.strategies.len())
            .finish()
    }
}

impl CacheRegistry {
    /// Initialize the registry from configuration
    ///
    /// Builds the store provider (gracefully degrading to NoOp on failure)
    /// and registers the default strategy table, honoring per-strategy TTL
    /// overrides from configuration.
    pub async fn init(config: &CacheEngineConfig) -> Self {
        let store = Arc::new(StoreProvider::from_config_graceful(config).await);
        let registry = Self::with_store(store);

        for mut strategy in default_strategies() {
            strategy.ttl_seconds = config.ttl_for_strategy(&strategy.name, strategy.ttl_seconds);
            registry.set_strategy(strategy);
        }

        info!(
            provider = registry.store.provider_name(),
            strategies = registry.strategies.len(),
            "Cache registry initialized"
        );

        registry
    }

    /// Create an empty registry over an existing store provider
    pub fn with_store(store: Arc<StoreProvider>) -> Self {
        Self {
            store,
            strategies: DashMap::new(),
            instances: DashMap::new(),
            background_tasks: Mutex::new(Vec::new()),
        }
    }

    /// The shared store provider
    pub fn store(&self) -> &Arc<StoreProvider> {
        &self.store
    }

    /// Register or replace a strategy
    ///
    /// Upserts both maps together. Replacing an existing strategy swaps in a
    /// fresh instance, so accumulated statistics reset - accepted trade-off
    /// for keeping instance state immutable.
    pub fn set_strategy(&self, strategy: CacheStrategy) {
        let name = strategy.name.clone();
        let instance = Arc::new(CacheInstance::from_strategy(&strategy, self.store.clone()));

        let replaced = self.strategies.insert(name.clone(), strategy).is_some();
        self.instances.insert(name.clone(), instance);

        if replaced {
            debug!(strategy = %name, "Strategy replaced, statistics reset");
        } else {
            debug!(strategy = %name, "Strategy registered");
        }
    }

    /// Look up a registered strategy
    pub fn get_strategy(&self, name: &str) -> Option<CacheStrategy> {
        self.strategies.get(name).map(|s| s.value().clone())
    }

    /// Cache instance for a registered strategy; `None` if unknown
    ///
    /// Never constructs on the fly - an unknown name here is a configuration
    /// error the caller should surface, not paper over.
    pub fn get_cache(&self, name: &str) -> Option<Arc<CacheInstance>> {
        self.instances.get(name).map(|i| i.value().clone())
    }

    /// Cache instance for a name, constructing one with the given default
    /// TTL when no strategy is registered
    pub fn get_or_create_cache(&self, name: &str, default_ttl: Duration) -> Arc<CacheInstance> {
        if let Some(instance) = self.get_cache(name) {
            return instance;
        }

        let strategy = CacheStrategy::new(name, default_ttl.as_secs());
        self.strategies
            .entry(name.to_string())
            .or_insert_with(|| strategy.clone());
        self.instances
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!(strategy = %name, "Cache instance created on demand");
                Arc::new(CacheInstance::from_strategy(&strategy, self.store.clone()))
            })
            .clone()
    }

    /// Registered strategy names
    pub fn strategy_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.strategies.iter().map(|s| s.key().clone()).collect();
        names.sort_unstable();
        names
    }

    /// Flush everything a strategy owns, using its registered key pattern;
    /// returns the number of keys deleted
    pub async fn invalidate_strategy(&self, name: &str) -> u64 {
        let Some(strategy) = self.get_strategy(name) else {
            warn!(strategy = name, "Unknown strategy on invalidate_strategy");
            return 0;
        };

        match self.store.delete_pattern(&strategy.key_pattern).await {
            Ok(count) => {
                debug!(strategy = name, pattern = %strategy.key_pattern, deleted = count, "Strategy flushed");
                count
            }
            Err(e) => {
                warn!(strategy = name, pattern = %strategy.key_pattern, error = %e, "Strategy flush failed");
                0
            }
        }
    }

    /// Flush everything affected by an application change
    pub async fn invalidate_application_cache(&self, id: &str) {
        self.invalidate_entity("application", &[
            format!("*applications*{}*", id),
            "dashboard:*".to_string(),
            "analytics:*".to_string(),
        ])
        .await;
    }

    /// Flush everything affected by a job change
    pub async fn invalidate_job_cache(&self, id: &str) {
        self.invalidate_entity("job", &[
            format!("*jobs*{}*", id),
            "jobs:*".to_string(),
            "dashboard:*".to_string(),
            "analytics:*".to_string(),
        ])
        .await;
    }

    /// Flush everything affected by a candidate change
    pub async fn invalidate_candidate_cache(&self, id: &str) {
        self.invalidate_entity("candidate", &[
            format!("*candidates*{}*", id),
            "dashboard:*".to_string(),
            "analytics:*".to_string(),
        ])
        .await;
    }

    /// Flush everything affected by a company change
    pub async fn invalidate_company_cache(&self, id: &str) {
        self.invalidate_entity("company", &[
            format!("*companies*{}*", id),
            "dashboard:*".to_string(),
            "analytics:*".to_string(),
            "reports:*".to_string(),
        ])
        .await;
    }

    async fn invalidate_entity(&self, entity: &str, patterns: &[String]) {
        let mut total: u64 = 0;

        for pattern in patterns {
            match self.store.delete_pattern(pattern).await {
                Ok(count) => total += count,
                Err(e) => {
                    warn!(entity = entity, pattern = %pattern, error = %e, "Entity invalidation pattern failed");
                }
            }
        }

        debug!(entity = entity, deleted = total, "Entity caches invalidated");
    }

    /// Statistics for every instance, keyed by strategy name
    pub fn all_stats(&self) -> HashMap<String, CacheStats> {
        self.instances
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().stats()))
            .collect()
    }

    /// Liveness/readiness contract exposed to the surrounding service
    pub async fn health_check(&self) -> RegistryHealth {
        let store_reachable = match self.store.health_check().await {
            Ok(healthy) => healthy,
            Err(e) => {
                warn!(error = %e, "Store health check failed");
                false
            }
        };

        RegistryHealth {
            store_reachable,
            provider: self.store.provider_name().to_string(),
            strategies: self.strategy_names(),
            stats: self.all_stats(),
        }
    }

    /// Attach a background task (periodic warmer, maintenance tick) to this
    /// registry's lifecycle
    pub fn attach_background_task(&self, handle: JoinHandle<()>) {
        self.background_tasks.lock().push(handle);
    }

    /// Stop background tasks; the registry itself holds no store-side state
    pub fn shutdown(&self) {
        let mut tasks = self.background_tasks.lock();
        for handle in tasks.drain(..) {
            handle.abort();
        }
        info!("Cache registry shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::CacheOptions;
    use serde_json::{json, Value};

    fn memory_registry() -> CacheRegistry {
        let registry = CacheRegistry::with_store(Arc::new(StoreProvider::memory()));
        for strategy in default_strategies() {
            registry.set_strategy(strategy);
        }
        registry
    }

    #[tokio::test]
    async fn test_init_registers_default_strategies() {
        let registry = CacheRegistry::init(&CacheEngineConfig::for_test()).await;
        assert!(registry.get_cache("dashboard").is_some());
        assert!(registry.get_cache("jobs").is_some());
        assert!(registry.get_cache("nonexistent").is_none());
    }

    #[tokio::test]
    async fn test_init_applies_ttl_overrides() {
        let mut config = CacheEngineConfig::for_test();
        config
            .strategy_ttl_overrides
            .insert("dashboard".to_string(), 42);

        let registry = CacheRegistry::init(&config).await;
        assert_eq!(
            registry.get_strategy("dashboard").unwrap().ttl_seconds,
            42
        );
        // Untouched strategies keep their table TTL
        assert_eq!(registry.get_strategy("jobs").unwrap().ttl_seconds, 1800);
    }

    #[tokio::test]
    async fn test_set_strategy_replaces_instance_and_resets_stats() {
        let registry = memory_registry();

        let cache = registry.get_cache("dashboard").unwrap();
        cache
            .set("q", &json!({}), &json!(1), &CacheOptions::default())
            .await;
        assert_eq!(cache.stats().sets, 1);

        registry.set_strategy(CacheStrategy::new("dashboard", 120));

        let replacement = registry.get_cache("dashboard").unwrap();
        assert_eq!(replacement.stats().sets, 0);
        assert_eq!(replacement.default_ttl(), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn test_get_or_create_cache() {
        let registry = memory_registry();
        assert!(registry.get_cache("interviews").is_none());

        let created = registry.get_or_create_cache("interviews", Duration::from_secs(90));
        assert_eq!(created.default_ttl(), Duration::from_secs(90));

        // Subsequent lookups return the same instance
        let again = registry.get_or_create_cache("interviews", Duration::from_secs(5));
        assert!(Arc::ptr_eq(&created, &again));
        assert!(registry.get_cache("interviews").is_some());
    }

    #[tokio::test]
    async fn test_entity_invalidation_flushes_aggregates() {
        let registry = memory_registry();

        let jobs = registry.get_cache("jobs").unwrap();
        let dashboard = registry.get_cache("dashboard").unwrap();
        let candidates = registry.get_cache("candidates").unwrap();

        jobs.set("list", &json!({"page": 1}), &json!(["job1"]), &CacheOptions::default())
            .await;
        dashboard
            .set("summary", &json!({}), &json!({"open": 3}), &CacheOptions::default())
            .await;
        candidates
            .set("list", &json!({}), &json!([]), &CacheOptions::default())
            .await;

        registry.invalidate_job_cache("job1").await;

        let job_list: Option<Value> = jobs
            .get("list", &json!({"page": 1}), &CacheOptions::default())
            .await;
        let summary: Option<Value> = dashboard
            .get("summary", &json!({}), &CacheOptions::default())
            .await;
        assert!(job_list.is_none());
        assert!(summary.is_none());

        // Candidate listings are not part of the job blast radius
        let candidate_list: Option<Value> = candidates
            .get("list", &json!({}), &CacheOptions::default())
            .await;
        assert!(candidate_list.is_some());
    }

    #[tokio::test]
    async fn test_invalidate_strategy_uses_registered_pattern() {
        let registry = memory_registry();
        let dashboard = registry.get_cache("dashboard").unwrap();
        let jobs = registry.get_cache("jobs").unwrap();

        dashboard
            .set("a", &json!({}), &json!(1), &CacheOptions::default())
            .await;
        dashboard
            .set("b", &json!({}), &json!(2), &CacheOptions::default())
            .await;
        jobs.set("list", &json!({}), &json!([]), &CacheOptions::default())
            .await;

        assert_eq!(registry.invalidate_strategy("dashboard").await, 2);
        assert_eq!(registry.invalidate_strategy("dashboard").await, 0);
        assert_eq!(registry.invalidate_strategy("nonexistent").await, 0);

        let survivor: Option<Value> = jobs.get("list", &json!({}), &CacheOptions::default()).await;
        assert!(survivor.is_some());
    }

    #[tokio::test]
    async fn test_all_stats_keyed_by_strategy() {
        let registry = memory_registry();

        let cache = registry.get_cache("analytics").unwrap();
        let _: Option<Value> = cache.get("q", &json!({}), &CacheOptions::default()).await;

        let stats = registry.all_stats();
        assert_eq!(stats.get("analytics").unwrap().misses, 1);
        assert_eq!(stats.get("jobs").unwrap().misses, 0);
    }

    #[tokio::test]
    async fn test_health_check_reports_store_and_strategies() {
        let registry = memory_registry();
        let health = registry.health_check().await;

        assert!(health.store_reachable);
        assert_eq!(health.provider, "memory");
        assert!(health.strategies.contains(&"dashboard".to_string()));
        assert_eq!(health.stats.len(), health.strategies.len());
    }

    #[tokio::test]
    async fn test_health_check_unreachable_store() {
        let registry = CacheRegistry::with_store(Arc::new(StoreProvider::failing()));
        let health = registry.health_check().await;
        assert!(!health.store_reachable);
    }

    #[tokio::test]
    async fn test_shutdown_aborts_background_tasks() {
        let registry = memory_registry();

        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        registry.attach_background_task(handle);

        registry.shutdown();
        // Drained on shutdown; nothing left to abort twice
        assert!(registry.background_tasks.lock().is_empty());
    }
}
