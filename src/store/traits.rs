//! Key-value store trait definition

use crate::errors::CacheResult;
use std::time::Duration;

/// Trait defining the store operations the engine requires
///
/// Implemented by concrete store providers (Redis, Memory, NoOp, Failing).
/// All operations are async and return `CacheResult`; any of them may fail
/// with a connection, timeout, or backend error, and the provider layer is
/// responsible for catching every such failure before it reaches callers.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key; `Ok(None)` on miss.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = CacheResult<Option<String>>> + Send;

    /// Set a value with a TTL.
    fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl std::future::Future<Output = CacheResult<()>> + Send;

    /// Delete a specific key; returns whether a key was removed.
    fn delete(&self, key: &str) -> impl std::future::Future<Output = CacheResult<bool>> + Send;

    /// Check whether a key currently exists.
    fn exists(&self, key: &str) -> impl std::future::Future<Output = CacheResult<bool>> + Send;

    /// Seconds remaining before expiry.
    ///
    /// Sentinels follow the Redis convention: `-1` when the key exists
    /// without an expiry, `-2` when the key is missing.
    fn ttl(&self, key: &str) -> impl std::future::Future<Output = CacheResult<i64>> + Send;

    /// Enumerate keys matching a glob pattern.
    fn keys(
        &self,
        pattern: &str,
    ) -> impl std::future::Future<Output = CacheResult<Vec<String>>> + Send;

    /// Delete all keys matching a glob pattern; returns the count deleted.
    fn delete_pattern(
        &self,
        pattern: &str,
    ) -> impl std::future::Future<Output = CacheResult<u64>> + Send;

    /// Check if the store is reachable and responsive.
    fn health_check(&self) -> impl std::future::Future<Output = CacheResult<bool>> + Send;

    /// Name of the store provider
    fn provider_name(&self) -> &'static str;

    /// Whether state is shared across processes (network store) rather than
    /// held in-process
    fn is_distributed(&self) -> bool;
}
