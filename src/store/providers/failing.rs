//! Always-failing store provider
//!
//! Every operation returns a connection error. Fault injection for
//! exercising the engine's soft-failure behavior in tests: callers must see
//! miss/false returns and advancing counters, never a panic or propagated
//! error.

use crate::errors::{CacheError, CacheResult};
use crate::store::traits::KeyValueStore;
use std::time::Duration;

/// Store whose every operation fails with `ConnectionError`
#[derive(Debug, Clone, Default)]
pub struct FailingStore;

impl FailingStore {
    pub fn new() -> Self {
        Self
    }

    fn unreachable_error(op: &str) -> CacheError {
        CacheError::ConnectionError(format!("{}: store unreachable (fault injection)", op))
    }
}

impl KeyValueStore for FailingStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Err(Self::unreachable_error("GET"))
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        Err(Self::unreachable_error("SET"))
    }

    async fn delete(&self, _key: &str) -> CacheResult<bool> {
        Err(Self::unreachable_error("DEL"))
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Err(Self::unreachable_error("EXISTS"))
    }

    async fn ttl(&self, _key: &str) -> CacheResult<i64> {
        Err(Self::unreachable_error("TTL"))
    }

    async fn keys(&self, _pattern: &str) -> CacheResult<Vec<String>> {
        Err(Self::unreachable_error("SCAN"))
    }

    async fn delete_pattern(&self, _pattern: &str) -> CacheResult<u64> {
        Err(Self::unreachable_error("SCAN"))
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Err(Self::unreachable_error("PING"))
    }

    fn provider_name(&self) -> &'static str {
        "failing"
    }

    fn is_distributed(&self) -> bool {
        true
    }
}
