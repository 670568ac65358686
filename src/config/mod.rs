//! Cache Engine Configuration Management
//!
//! Environment-aware configuration for the caching engine. Defaults are
//! production values; `for_test()` and `for_development()` provide presets
//! with shorter TTLs, and `from_environment()` applies `TALENTLINE_CACHE_*`
//! environment variable overrides on top of the detected environment.

use crate::resilience::CircuitBreakerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use tracing::{info, warn};

/// Top-level configuration for the caching engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEngineConfig {
    /// Master switch; disabled means every instance runs over the NoOp store
    pub enabled: bool,
    /// Store backend: "redis", "memory", or "noop"
    pub backend: String,
    /// Default TTL for strategies created without an explicit TTL
    pub default_ttl_seconds: u64,
    /// Deadline applied to every store call
    pub operation_timeout_ms: u64,
    /// Global switch for trigger-based invalidation (§ constrained hosting:
    /// some environments cannot enumerate keys by pattern safely)
    pub invalidation_enabled: bool,
    /// Global switch for proactive cache warming
    pub warmup_enabled: bool,
    /// Interval between periodic warm passes
    pub warmup_interval_seconds: u64,
    /// Per-strategy TTL overrides, keyed by strategy name
    pub strategy_ttl_overrides: HashMap<String, u64>,
    /// Redis connection settings; required when backend = "redis"
    pub redis: Option<RedisConfig>,
    /// Circuit breaker settings for distributed backends; None disables it
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

/// Redis connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_seconds: u64,
    pub database: u32,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            max_connections: 10,
            connection_timeout_seconds: 5,
            database: 0,
        }
    }
}

impl Default for CacheEngineConfig {
    /// Default configuration suitable for production
    fn default() -> Self {
        Self {
            enabled: true,
            backend: "redis".to_string(),
            default_ttl_seconds: 300,
            operation_timeout_ms: 2000,
            invalidation_enabled: true,
            warmup_enabled: true,
            warmup_interval_seconds: 900,
            strategy_ttl_overrides: HashMap::new(),
            redis: Some(RedisConfig::default()),
            circuit_breaker: Some(CircuitBreakerConfig::for_store()),
        }
    }
}

impl CacheEngineConfig {
    /// Test-optimized configuration: in-process store, rapid expiry
    pub fn for_test() -> Self {
        Self {
            enabled: true,
            backend: "memory".to_string(),
            default_ttl_seconds: 5,
            operation_timeout_ms: 500,
            invalidation_enabled: true,
            warmup_enabled: false,
            warmup_interval_seconds: 10,
            strategy_ttl_overrides: HashMap::new(),
            redis: None,
            circuit_breaker: None,
        }
    }

    /// Development configuration: in-process store, moderate TTLs
    pub fn for_development() -> Self {
        Self {
            enabled: true,
            backend: "memory".to_string(),
            default_ttl_seconds: 60,
            operation_timeout_ms: 1000,
            invalidation_enabled: true,
            warmup_enabled: false,
            warmup_interval_seconds: 300,
            strategy_ttl_overrides: HashMap::new(),
            redis: None,
            circuit_breaker: None,
        }
    }

    /// Load configuration from environment or use defaults
    pub fn from_environment() -> Self {
        let environment = env::var("TALENTLINE_ENV")
            .or_else(|_| env::var("APP_ENV"))
            .or_else(|_| env::var("RUST_ENV"))
            .unwrap_or_else(|_| "production".to_string());

        let config = match environment.as_str() {
            "test" => {
                info!("Loading test cache configuration (rapid expiry, memory store)");
                Self::for_test()
            }
            "development" => {
                info!("Loading development cache configuration");
                Self::for_development()
            }
            _ => {
                info!("Loading production cache configuration");
                Self::default()
            }
        };

        config.with_env_overrides()
    }

    /// Apply environment variable overrides to configuration
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(enabled) = env::var("TALENTLINE_CACHE_ENABLED") {
            self.enabled = enabled.parse().unwrap_or(self.enabled);
            info!("Cache enabled override: {}", self.enabled);
        }

        if let Ok(backend) = env::var("TALENTLINE_CACHE_BACKEND") {
            info!("Cache backend override: {}", backend);
            self.backend = backend;
        }

        if let Ok(ttl) = env::var("TALENTLINE_CACHE_DEFAULT_TTL_SECONDS") {
            if let Ok(seconds) = ttl.parse::<u64>() {
                self.default_ttl_seconds = seconds;
                info!("Default TTL override: {}s", seconds);
            }
        }

        if let Ok(timeout) = env::var("TALENTLINE_CACHE_OPERATION_TIMEOUT_MS") {
            if let Ok(millis) = timeout.parse::<u64>() {
                self.operation_timeout_ms = millis;
                info!("Operation timeout override: {}ms", millis);
            }
        }

        if let Ok(enabled) = env::var("TALENTLINE_CACHE_INVALIDATION_ENABLED") {
            self.invalidation_enabled = enabled.parse().unwrap_or(self.invalidation_enabled);
            info!("Invalidation enabled override: {}", self.invalidation_enabled);
        }

        if let Ok(enabled) = env::var("TALENTLINE_CACHE_WARMUP_ENABLED") {
            self.warmup_enabled = enabled.parse().unwrap_or(self.warmup_enabled);
            info!("Warmup enabled override: {}", self.warmup_enabled);
        }

        if let Ok(url) = env::var("TALENTLINE_CACHE_REDIS_URL") {
            info!("Redis URL override applied");
            self.redis.get_or_insert_with(RedisConfig::default).url = url;
        }

        self
    }

    /// Check if caching is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Default TTL as Duration
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    /// Store operation deadline as Duration
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Warm pass interval as Duration
    pub fn warmup_interval(&self) -> Duration {
        Duration::from_secs(self.warmup_interval_seconds)
    }

    /// TTL for a named strategy, honoring overrides
    pub fn ttl_for_strategy(&self, name: &str, strategy_default: u64) -> u64 {
        self.strategy_ttl_overrides
            .get(name)
            .copied()
            .unwrap_or(strategy_default)
            .max(1)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), String> {
        if self.default_ttl_seconds == 0 {
            return Err("default_ttl_seconds must be greater than 0".to_string());
        }

        if self.operation_timeout_ms == 0 {
            return Err("operation_timeout_ms must be greater than 0".to_string());
        }

        match self.backend.as_str() {
            "redis" => {
                if self.redis.is_none() {
                    return Err("backend \"redis\" requires a [redis] section".to_string());
                }
            }
            "memory" | "noop" => {}
            other => {
                warn!(backend = other, "Unknown cache backend in configuration");
            }
        }

        if let Some(cb) = &self.circuit_breaker {
            cb.validate()?;
        }

        if self.warmup_enabled && self.warmup_interval_seconds == 0 {
            return Err("warmup_interval_seconds must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Log current configuration for debugging
    pub fn log_configuration(&self) {
        info!("Cache Engine Configuration:");
        info!("  Enabled: {}", self.enabled);
        info!("  Backend: {}", self.backend);
        info!("  Default TTL: {}s", self.default_ttl_seconds);
        info!("  Operation timeout: {}ms", self.operation_timeout_ms);
        info!("  Invalidation enabled: {}", self.invalidation_enabled);
        info!(
            "  Warmup: {} (every {}s)",
            self.warmup_enabled, self.warmup_interval_seconds
        );
        for (name, ttl) in &self.strategy_ttl_overrides {
            info!("  TTL override: {} -> {}s", name, ttl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(CacheEngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_test_preset_uses_memory_backend() {
        let config = CacheEngineConfig::for_test();
        assert_eq!(config.backend, "memory");
        assert!(!config.warmup_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_redis_backend_requires_redis_config() {
        let config = CacheEngineConfig {
            backend: "redis".to_string(),
            redis: None,
            ..CacheEngineConfig::for_test()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_strategy_ttl_override() {
        let mut config = CacheEngineConfig::for_test();
        config
            .strategy_ttl_overrides
            .insert("dashboard".to_string(), 120);

        assert_eq!(config.ttl_for_strategy("dashboard", 300), 120);
        assert_eq!(config.ttl_for_strategy("analytics", 900), 900);
    }

    #[test]
    fn test_ttl_override_clamped_to_minimum() {
        let mut config = CacheEngineConfig::for_test();
        config.strategy_ttl_overrides.insert("x".to_string(), 0);
        assert_eq!(config.ttl_for_strategy("x", 300), 1);
    }

    #[test]
    fn test_zero_ttl_rejected() {
        let config = CacheEngineConfig {
            default_ttl_seconds: 0,
            ..CacheEngineConfig::for_test()
        };
        assert!(config.validate().is_err());
    }
}
