//! Cache warming
//!
//! Proactively populates cache entries before they are requested, avoiding
//! the first-access latency spike after a deploy or an invalidation storm.
//! The engine does not know how to compute dashboard metrics or chart
//! series - callers register [`WarmupSource`] implementations (key metrics,
//! recent-activity lists, chart series) and the warmer writes whatever they
//! produce through the normal `set` contract, tenant-scoped and tagged.

use crate::errors::CacheResult;
use crate::instance::{CacheOptions, WarmEntry};
use crate::registry::CacheRegistry;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One named warm step producing precomputed entries for a strategy
///
/// Implementations live in the business layer; they typically run the
/// expensive query this cache exists to avoid and hand back the result.
#[async_trait]
pub trait WarmupSource: Send + Sync {
    /// Step name for logs ("key_metrics", "recent_activity", ...)
    fn name(&self) -> &str;

    /// Strategy whose cache this step populates
    fn strategy(&self) -> &str;

    /// Compute the entries to write for one tenant
    async fn entries(&self, tenant: &str) -> CacheResult<Vec<WarmEntry>>;
}

/// Drives registered warmup sources against the registry
pub struct CacheWarmer {
    registry: Arc<CacheRegistry>,
    sources: RwLock<Vec<Arc<dyn WarmupSource>>>,
}

impl std::fmt::Debug for CacheWarmer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheWarmer")
            .field("sources", &self.sources.read().len())
            .finish()
    }
}

impl CacheWarmer {
    pub fn new(registry: Arc<CacheRegistry>) -> Self {
        Self {
            registry,
            sources: RwLock::new(Vec::new()),
        }
    }

    /// Register a warm step
    pub fn register_source(&self, source: Arc<dyn WarmupSource>) {
        debug!(source = source.name(), strategy = source.strategy(), "Warmup source registered");
        self.sources.write().push(source);
    }

    /// Number of registered warm steps
    pub fn source_count(&self) -> usize {
        self.sources.read().len()
    }

    /// Run every warm step for one tenant; returns entries written
    ///
    /// A failing step is logged and skipped - warming is best effort and
    /// never blocks the steps after it.
    pub async fn warm_tenant(&self, tenant: &str) -> u64 {
        let sources: Vec<Arc<dyn WarmupSource>> = self.sources.read().clone();
        let mut written: u64 = 0;

        for source in sources {
            let Some(cache) = self.registry.get_cache(source.strategy()) else {
                warn!(
                    source = source.name(),
                    strategy = source.strategy(),
                    "Warmup source targets an unregistered strategy, skipping"
                );
                continue;
            };

            let entries = match source.entries(tenant).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(source = source.name(), tenant = tenant, error = %e, "Warmup source failed, skipping");
                    continue;
                }
            };

            for entry in &entries {
                let opts = CacheOptions::tagged(entry.tags.clone()).with_scope(tenant);
                if cache
                    .set(&entry.query_name, &entry.params, &entry.value, &opts)
                    .await
                {
                    written += 1;
                }
            }

            debug!(
                source = source.name(),
                tenant = tenant,
                entries = entries.len(),
                "Warm step complete"
            );
        }

        info!(tenant = tenant, written = written, "Cache warm pass complete");
        written
    }

    /// Spawn a periodic warm pass over a fixed tenant list
    ///
    /// Returns the task handle; attach it to the registry so `shutdown()`
    /// stops it.
    pub fn spawn_periodic(
        warmer: Arc<CacheWarmer>,
        tenants: Vec<String>,
        interval: Duration,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The immediate first tick would race application startup
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                for tenant in &tenants {
                    warmer.warm_tenant(tenant).await;
                }
            }
        })
    }
}
