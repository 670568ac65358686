//! Domain-aware invalidation layer
//!
//! Maps business trigger events ("application_created", "job_updated", ...)
//! to invalidation rules. Each rule resolves to a key pattern, optionally
//! narrowed to one tenant, that is deleted from the store when the trigger
//! fires. The layer also fronts the registry with a get/set facade that
//! records per-strategy response times, and drives cache warming.
//!
//! Rules are data: adding a trigger is a table entry, and the whole layer
//! can be switched off for environments where store-side key enumeration is
//! not safe (constrained hosting).

use crate::instance::CacheOptions;
use crate::registry::CacheRegistry;
use crate::warming::CacheWarmer;
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One invalidation rule: a key pattern deleted when any of its triggers fire
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationRule {
    /// Glob deleted when the rule fires
    pub pattern: String,
    /// Trigger event names this rule responds to
    pub triggers: Vec<String>,
    /// Whether a supplied tenant id narrows the pattern to that tenant
    pub tenant_scoped: bool,
}

impl InvalidationRule {
    pub fn new(pattern: impl Into<String>, triggers: &[&str], tenant_scoped: bool) -> Self {
        Self {
            pattern: pattern.into(),
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            tenant_scoped,
        }
    }

    fn matches(&self, trigger: &str) -> bool {
        self.triggers.iter().any(|t| t == trigger)
    }

    /// Pattern to delete for this firing
    ///
    /// `dashboard:*` narrowed by tenant `acme` becomes `dashboard:acme:*`;
    /// without a tenant (or for unscoped rules) the broad pattern is used
    /// as-is, a full-strategy flush.
    fn resolve_pattern(&self, tenant: Option<&str>) -> String {
        match tenant {
            Some(tenant) if self.tenant_scoped => {
                let stem = self.pattern.strip_suffix('*').unwrap_or(&self.pattern);
                format!("{}{}:*", stem, tenant)
            }
            _ => self.pattern.clone(),
        }
    }
}

/// Default trigger table for the recruiting domain
///
/// Dashboards and entity listings are tenant data, so their rules narrow
/// when a tenant id is supplied. Analytics rollups span tenants and always
/// flush broad.
pub fn default_rules() -> Vec<InvalidationRule> {
    let application_triggers = [
        "application_created",
        "application_updated",
        "application_deleted",
        "application_stage_changed",
    ];
    let job_triggers = ["job_created", "job_updated", "job_deleted", "job_status_changed"];
    let candidate_triggers = ["candidate_created", "candidate_updated", "candidate_deleted"];

    vec![
        InvalidationRule::new("applications:*", &application_triggers, true),
        InvalidationRule::new("jobs:*", &job_triggers, true),
        InvalidationRule::new("candidates:*", &candidate_triggers, true),
        InvalidationRule::new(
            "dashboard:*",
            &[
                "application_created",
                "application_updated",
                "application_deleted",
                "application_stage_changed",
                "job_created",
                "job_updated",
                "job_deleted",
                "job_status_changed",
                "candidate_created",
                "candidate_updated",
                "candidate_deleted",
                "interview_scheduled",
                "interview_completed",
            ],
            true,
        ),
        InvalidationRule::new(
            "analytics:*",
            &[
                "application_created",
                "application_updated",
                "application_deleted",
                "job_created",
                "job_updated",
                "job_deleted",
            ],
            false,
        ),
        InvalidationRule::new("companies:*", &["company_updated"], false),
        InvalidationRule::new("reports:*", &["company_updated", "report_source_changed"], true),
    ]
}

/// Per-strategy response time accumulator
#[derive(Debug, Default)]
struct StrategyTiming {
    calls: AtomicU64,
    total_nanos: AtomicU64,
}

/// Response time snapshot for one strategy
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseTimeStats {
    pub calls: u64,
    pub average_ms: f64,
}

/// Domain-aware facade over the cache registry
pub struct DomainCacheLayer {
    registry: Arc<CacheRegistry>,
    warmer: Arc<CacheWarmer>,
    rules: Vec<InvalidationRule>,
    invalidation_enabled: bool,
    timings: DashMap<String, StrategyTiming>,
}

impl std::fmt::Debug for DomainCacheLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainCacheLayer")
            .field("rules", &self.rules.len())
            .field("invalidation_enabled", &self.invalidation_enabled)
            .finish()
    }
}

impl DomainCacheLayer {
    /// Create the layer with the default rule table
    pub fn new(registry: Arc<CacheRegistry>, invalidation_enabled: bool) -> Self {
        Self::with_rules(registry, invalidation_enabled, default_rules())
    }

    /// Create the layer with a custom rule table
    pub fn with_rules(
        registry: Arc<CacheRegistry>,
        invalidation_enabled: bool,
        rules: Vec<InvalidationRule>,
    ) -> Self {
        let warmer = Arc::new(CacheWarmer::new(registry.clone()));
        Self {
            registry,
            warmer,
            rules,
            invalidation_enabled,
            timings: DashMap::new(),
        }
    }

    /// The underlying registry
    pub fn registry(&self) -> &Arc<CacheRegistry> {
        &self.registry
    }

    /// The cache warmer driven by this layer
    pub fn warmer(&self) -> &Arc<CacheWarmer> {
        &self.warmer
    }

    /// Start the periodic warmer for a fixed tenant list, honoring the
    /// warmup configuration; the task is attached to the registry lifecycle
    pub fn start_periodic_warming(&self, config: &crate::config::CacheEngineConfig, tenants: Vec<String>) {
        if !config.warmup_enabled {
            debug!("Warmup disabled, periodic warmer not started");
            return;
        }

        let handle =
            CacheWarmer::spawn_periodic(self.warmer.clone(), tenants, config.warmup_interval());
        self.registry.attach_background_task(handle);
    }

    /// Fire a business trigger; returns the number of keys deleted
    ///
    /// Tenant-scoped rules with a supplied tenant delete only that tenant's
    /// keys. When invalidation is globally disabled this is a no-op.
    pub async fn invalidate(&self, trigger: &str, tenant: Option<&str>) -> u64 {
        if !self.invalidation_enabled {
            debug!(trigger = trigger, "Invalidation disabled, skipping");
            return 0;
        }

        let mut deleted: u64 = 0;
        let mut fired = 0usize;

        for rule in self.rules.iter().filter(|r| r.matches(trigger)) {
            let pattern = rule.resolve_pattern(tenant);
            fired += 1;

            match self.registry.store().delete_pattern(&pattern).await {
                Ok(count) => deleted += count,
                Err(e) => {
                    warn!(trigger = trigger, pattern = %pattern, error = %e, "Invalidation pattern failed");
                }
            }
        }

        if fired == 0 {
            debug!(trigger = trigger, "No invalidation rules for trigger");
        } else {
            debug!(
                trigger = trigger,
                tenant = tenant.unwrap_or("-"),
                rules = fired,
                deleted = deleted,
                "Trigger invalidation complete"
            );
        }

        deleted
    }

    /// Get through a named strategy, recording response time
    ///
    /// An unknown strategy is a configuration error reported as a logged
    /// miss, mirroring the engine-wide soft-failure policy.
    pub async fn get<T: DeserializeOwned>(
        &self,
        strategy: &str,
        query_name: &str,
        params: &Value,
        opts: &CacheOptions,
    ) -> Option<T> {
        let Some(cache) = self.registry.get_cache(strategy) else {
            warn!(strategy = strategy, "Unknown cache strategy on get");
            return None;
        };

        let start = Instant::now();
        let result = cache.get(query_name, params, opts).await;
        self.record_timing(strategy, start.elapsed());
        result
    }

    /// Set through a named strategy, recording response time
    pub async fn set<T: Serialize>(
        &self,
        strategy: &str,
        query_name: &str,
        params: &Value,
        value: &T,
        opts: &CacheOptions,
    ) -> bool {
        let Some(cache) = self.registry.get_cache(strategy) else {
            warn!(strategy = strategy, "Unknown cache strategy on set");
            return false;
        };

        let start = Instant::now();
        let result = cache.set(query_name, params, value, opts).await;
        self.record_timing(strategy, start.elapsed());
        result
    }

    /// Run every registered warmup source for a tenant; returns entries written
    pub async fn warm_cache(&self, tenant: &str) -> u64 {
        self.warmer.warm_tenant(tenant).await
    }

    /// Per-strategy running response-time averages
    pub fn response_time_stats(&self) -> std::collections::HashMap<String, ResponseTimeStats> {
        self.timings
            .iter()
            .map(|entry| {
                let calls = entry.calls.load(Ordering::Relaxed);
                let total_nanos = entry.total_nanos.load(Ordering::Relaxed);
                let average_ms = if calls > 0 {
                    total_nanos as f64 / calls as f64 / 1_000_000.0
                } else {
                    0.0
                };
                (
                    entry.key().clone(),
                    ResponseTimeStats { calls, average_ms },
                )
            })
            .collect()
    }

    fn record_timing(&self, strategy: &str, elapsed: Duration) {
        let timing = self
            .timings
            .entry(strategy.to_string())
            .or_default();
        timing.calls.fetch_add(1, Ordering::Relaxed);
        timing
            .total_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }
}
