//! Store provider with integrated circuit breaker
//!
//! Uses enum dispatch for zero-cost abstraction. Circuit breaker protection
//! and per-call deadlines are internal implementation details - consumers
//! simply use `StoreProvider` and get automatic resilience for distributed
//! backends.
//!
//! ## Open circuit behavior
//!
//! - `get()` returns `Ok(None)` - miss
//! - `set()` / `delete()` / `delete_pattern()` return no-op results
//! - `health_check()` returns `Ok(false)` - unhealthy

use crate::config::CacheEngineConfig;
use crate::errors::{CacheError, CacheResult};
use crate::resilience::{CircuitBreaker, CircuitState};
use crate::store::providers::{FailingStore, MemoryStore, NoOpStore};
use crate::store::traits::KeyValueStore;
use crate::store::TTL_MISSING;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[cfg(feature = "store-redis")]
use crate::store::providers::RedisStore;

/// Internal store backend enum for zero-cost dispatch
#[derive(Debug, Clone)]
enum StoreBackend {
    /// Redis store (boxed to reduce enum size)
    #[cfg(feature = "store-redis")]
    Redis(Box<RedisStore>),

    /// In-process store for development and tests (shared via Arc)
    Memory(Arc<MemoryStore>),

    /// No-op store (always miss, always succeed)
    NoOp(NoOpStore),

    /// Always-failing store (fault injection)
    Failing(FailingStore),
}

impl StoreBackend {
    fn is_distributed(&self) -> bool {
        match self {
            #[cfg(feature = "store-redis")]
            Self::Redis(s) => s.is_distributed(),
            Self::Memory(s) => s.is_distributed(),
            Self::NoOp(s) => s.is_distributed(),
            Self::Failing(s) => s.is_distributed(),
        }
    }

    fn provider_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "store-redis")]
            Self::Redis(s) => s.provider_name(),
            Self::Memory(s) => s.provider_name(),
            Self::NoOp(s) => s.provider_name(),
            Self::Failing(s) => s.provider_name(),
        }
    }

    fn is_enabled(&self) -> bool {
        !matches!(self, Self::NoOp(_))
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        match self {
            #[cfg(feature = "store-redis")]
            Self::Redis(s) => s.get(key).await,
            Self::Memory(s) => s.get(key).await,
            Self::NoOp(s) => s.get(key).await,
            Self::Failing(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        match self {
            #[cfg(feature = "store-redis")]
            Self::Redis(s) => s.set(key, value, ttl).await,
            Self::Memory(s) => s.set(key, value, ttl).await,
            Self::NoOp(s) => s.set(key, value, ttl).await,
            Self::Failing(s) => s.set(key, value, ttl).await,
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<bool> {
        match self {
            #[cfg(feature = "store-redis")]
            Self::Redis(s) => s.delete(key).await,
            Self::Memory(s) => s.delete(key).await,
            Self::NoOp(s) => s.delete(key).await,
            Self::Failing(s) => s.delete(key).await,
        }
    }

    async fn exists(&self, key: &str) -> CacheResult<bool> {
        match self {
            #[cfg(feature = "store-redis")]
            Self::Redis(s) => s.exists(key).await,
            Self::Memory(s) => s.exists(key).await,
            Self::NoOp(s) => s.exists(key).await,
            Self::Failing(s) => s.exists(key).await,
        }
    }

    async fn ttl(&self, key: &str) -> CacheResult<i64> {
        match self {
            #[cfg(feature = "store-redis")]
            Self::Redis(s) => s.ttl(key).await,
            Self::Memory(s) => s.ttl(key).await,
            Self::NoOp(s) => s.ttl(key).await,
            Self::Failing(s) => s.ttl(key).await,
        }
    }

    async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        match self {
            #[cfg(feature = "store-redis")]
            Self::Redis(s) => s.keys(pattern).await,
            Self::Memory(s) => s.keys(pattern).await,
            Self::NoOp(s) => s.keys(pattern).await,
            Self::Failing(s) => s.keys(pattern).await,
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        match self {
            #[cfg(feature = "store-redis")]
            Self::Redis(s) => s.delete_pattern(pattern).await,
            Self::Memory(s) => s.delete_pattern(pattern).await,
            Self::NoOp(s) => s.delete_pattern(pattern).await,
            Self::Failing(s) => s.delete_pattern(pattern).await,
        }
    }

    async fn health_check(&self) -> CacheResult<bool> {
        match self {
            #[cfg(feature = "store-redis")]
            Self::Redis(s) => s.health_check().await,
            Self::Memory(s) => s.health_check().await,
            Self::NoOp(s) => s.health_check().await,
            Self::Failing(s) => s.health_check().await,
        }
    }
}

/// Store provider with deadline and circuit breaker protection
///
/// Built from configuration with graceful degradation: a misconfigured or
/// unreachable backend falls back to NoOp with a warning, so the surrounding
/// service never fails to start because of its cache.
#[derive(Clone)]
pub struct StoreProvider {
    backend: StoreBackend,
    circuit_breaker: Option<Arc<CircuitBreaker>>,
    operation_timeout: Duration,
}

impl std::fmt::Debug for StoreProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreProvider")
            .field("backend", &self.backend.provider_name())
            .field(
                "circuit_breaker",
                &self.circuit_breaker.as_ref().map(|cb| cb.state()),
            )
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(2);

impl StoreProvider {
    /// Create a store provider from configuration with graceful degradation
    ///
    /// If Redis is configured but fails to connect, logs a warning and
    /// returns a NoOp provider instead. The system never fails to start
    /// because of store issues.
    pub async fn from_config_graceful(config: &CacheEngineConfig) -> Self {
        let backend = Self::create_backend(config).await;

        // Only protect distributed, enabled backends; in-process stores have
        // no network calls worth breaking on
        let circuit_breaker = if backend.is_distributed() && backend.is_enabled() {
            config.circuit_breaker.as_ref().map(|cb_config| {
                Arc::new(CircuitBreaker::new("store".to_string(), cb_config.clone()))
            })
        } else {
            None
        };

        Self {
            backend,
            circuit_breaker,
            operation_timeout: config.operation_timeout(),
        }
    }

    async fn create_backend(config: &CacheEngineConfig) -> StoreBackend {
        if !config.enabled {
            info!("Caching disabled by configuration");
            return StoreBackend::NoOp(NoOpStore::new());
        }

        match config.backend.as_str() {
            "redis" => Self::create_redis_backend(config).await,
            "memory" | "in-memory" => {
                info!("In-process store provider initialized");
                StoreBackend::Memory(Arc::new(MemoryStore::new()))
            }
            "noop" => StoreBackend::NoOp(NoOpStore::new()),
            other => {
                warn!(backend = other, "Unknown store backend, falling back to NoOp");
                StoreBackend::NoOp(NoOpStore::new())
            }
        }
    }

    #[cfg(feature = "store-redis")]
    async fn create_redis_backend(config: &CacheEngineConfig) -> StoreBackend {
        let redis_config = match &config.redis {
            Some(rc) => rc,
            None => {
                warn!("Redis backend enabled but no [redis] config found, falling back to NoOp");
                return StoreBackend::NoOp(NoOpStore::new());
            }
        };

        match RedisStore::from_config(redis_config).await {
            Ok(store) => {
                info!(backend = "redis", "Store provider initialized successfully");
                StoreBackend::Redis(Box::new(store))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Failed to connect to Redis, falling back to NoOp store (graceful degradation)"
                );
                StoreBackend::NoOp(NoOpStore::new())
            }
        }
    }

    #[cfg(not(feature = "store-redis"))]
    async fn create_redis_backend(_config: &CacheEngineConfig) -> StoreBackend {
        warn!("Redis backend requested but 'store-redis' feature not enabled, using NoOp");
        StoreBackend::NoOp(NoOpStore::new())
    }

    /// Create an in-process provider (for development and tests)
    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory(Arc::new(MemoryStore::new())),
            circuit_breaker: None,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Create a NoOp provider (for explicit opt-out)
    pub fn noop() -> Self {
        Self {
            backend: StoreBackend::NoOp(NoOpStore::new()),
            circuit_breaker: None,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Create an always-failing provider (fault injection for tests)
    pub fn failing() -> Self {
        Self {
            backend: StoreBackend::Failing(FailingStore::new()),
            circuit_breaker: None,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Attach a circuit breaker (builder-style, mainly for tests)
    pub fn with_circuit_breaker(mut self, circuit_breaker: Arc<CircuitBreaker>) -> Self {
        self.circuit_breaker = Some(circuit_breaker);
        self
    }

    /// Check if caching is actually enabled (not NoOp)
    pub fn is_enabled(&self) -> bool {
        self.backend.is_enabled()
    }

    /// Check if this provider shares state across processes
    pub fn is_distributed(&self) -> bool {
        self.backend.is_distributed()
    }

    /// Get the provider name
    pub fn provider_name(&self) -> &'static str {
        self.backend.provider_name()
    }

    /// Current circuit breaker state, `None` if no breaker is configured
    pub fn circuit_state(&self) -> Option<CircuitState> {
        self.circuit_breaker.as_ref().map(|cb| cb.state())
    }

    fn should_use_circuit_breaker(&self) -> bool {
        self.circuit_breaker.is_some() && self.backend.is_distributed() && self.backend.is_enabled()
    }

    /// Bound a store call with the configured deadline
    async fn bounded<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = CacheResult<T>>,
    ) -> CacheResult<T> {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(CacheError::Timeout(format!(
                "{} exceeded {}ms deadline",
                operation,
                self.operation_timeout.as_millis()
            ))),
        }
    }

    /// Run a store call with deadline + circuit breaker protection
    ///
    /// When the circuit is open the call is skipped entirely and
    /// `open_fallback` is returned, which gives every operation its
    /// miss/no-op behavior without a network round trip.
    async fn protected<T>(
        &self,
        operation: &'static str,
        open_fallback: T,
        fut: impl Future<Output = CacheResult<T>>,
    ) -> CacheResult<T> {
        if !self.should_use_circuit_breaker() {
            return self.bounded(operation, fut).await;
        }

        let cb = self
            .circuit_breaker
            .as_ref()
            .expect("checked in should_use");

        if !cb.should_allow() {
            debug!(operation = operation, "Store circuit open, skipping call");
            return Ok(open_fallback);
        }

        let start = Instant::now();
        let result = self.bounded(operation, fut).await;
        let duration = start.elapsed();

        match &result {
            Ok(_) => cb.record_success(duration),
            Err(_) => cb.record_failure(duration),
        }

        result
    }

    /// Get a value; `Ok(None)` when the circuit is open.
    pub async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.protected("GET", None, self.backend.get(key)).await
    }

    /// Set a value with TTL; no-op when the circuit is open.
    pub async fn set(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        self.protected("SET", (), self.backend.set(key, value, ttl))
            .await
    }

    /// Delete a key; `Ok(false)` when the circuit is open.
    pub async fn delete(&self, key: &str) -> CacheResult<bool> {
        self.protected("DEL", false, self.backend.delete(key)).await
    }

    /// Check existence; `Ok(false)` when the circuit is open.
    pub async fn exists(&self, key: &str) -> CacheResult<bool> {
        self.protected("EXISTS", false, self.backend.exists(key))
            .await
    }

    /// Seconds to expiry (Redis sentinels); "missing" when the circuit is open.
    pub async fn ttl(&self, key: &str) -> CacheResult<i64> {
        self.protected("TTL", TTL_MISSING, self.backend.ttl(key))
            .await
    }

    /// Enumerate keys by pattern; empty when the circuit is open.
    pub async fn keys(&self, pattern: &str) -> CacheResult<Vec<String>> {
        self.protected("SCAN", Vec::new(), self.backend.keys(pattern))
            .await
    }

    /// Delete keys by pattern; `Ok(0)` when the circuit is open.
    pub async fn delete_pattern(&self, pattern: &str) -> CacheResult<u64> {
        self.protected("SCAN-DEL", 0, self.backend.delete_pattern(pattern))
            .await
    }

    /// Health check; unhealthy when the circuit is open.
    ///
    /// An `Ok(false)` result counts as a failure for the circuit breaker
    /// just like an error does.
    pub async fn health_check(&self) -> CacheResult<bool> {
        if !self.should_use_circuit_breaker() {
            return self.bounded("PING", self.backend.health_check()).await;
        }

        let cb = self
            .circuit_breaker
            .as_ref()
            .expect("checked in should_use");

        if !cb.should_allow() {
            debug!("Store circuit open, reporting unhealthy");
            return Ok(false);
        }

        let start = Instant::now();
        let result = self.bounded("PING", self.backend.health_check()).await;
        let duration = start.elapsed();

        match &result {
            Ok(true) => cb.record_success(duration),
            Ok(false) | Err(_) => cb.record_failure(duration),
        }

        result
    }
}
