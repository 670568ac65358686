//! No-op store provider
//!
//! Always returns miss/success. Used when caching is disabled or when the
//! configured backend is unavailable (graceful degradation).

use crate::errors::CacheResult;
use crate::store::traits::KeyValueStore;
use crate::store::TTL_MISSING;
use std::time::Duration;

/// No-op store that never persists anything
///
/// All reads miss, all writes succeed silently.
#[derive(Debug, Clone, Default)]
pub struct NoOpStore;

impl NoOpStore {
    pub fn new() -> Self {
        Self
    }
}

impl KeyValueStore for NoOpStore {
    async fn get(&self, _key: &str) -> CacheResult<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> CacheResult<()> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn exists(&self, _key: &str) -> CacheResult<bool> {
        Ok(false)
    }

    async fn ttl(&self, _key: &str) -> CacheResult<i64> {
        Ok(TTL_MISSING)
    }

    async fn keys(&self, _pattern: &str) -> CacheResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn delete_pattern(&self, _pattern: &str) -> CacheResult<u64> {
        Ok(0)
    }

    async fn health_check(&self) -> CacheResult<bool> {
        Ok(true)
    }

    fn provider_name(&self) -> &'static str {
        "noop"
    }

    fn is_distributed(&self) -> bool {
        // No state at all, so it is trivially consistent across instances
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_noop_get_returns_none() {
        let store = NoOpStore::new();
        assert_eq!(store.get("any_key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_noop_writes_succeed() {
        let store = NoOpStore::new();
        store
            .set("key", "value", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(!store.delete("key").await.unwrap());
    }

    #[tokio::test]
    async fn test_noop_introspection() {
        let store = NoOpStore::new();
        assert!(!store.exists("key").await.unwrap());
        assert_eq!(store.ttl("key").await.unwrap(), TTL_MISSING);
        assert!(store.keys("*").await.unwrap().is_empty());
        assert_eq!(store.delete_pattern("*").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_noop_health_check_returns_true() {
        let store = NoOpStore::new();
        assert!(store.health_check().await.unwrap());
        assert_eq!(store.provider_name(), "noop");
    }
}
