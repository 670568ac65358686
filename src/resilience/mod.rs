//! # Resilience Primitives
//!
//! Circuit breaker protection for the distributed store backend. The store
//! provider records success/failure around every network call; when the
//! backing store misbehaves the circuit opens and cache operations fail
//! fast with miss/no-op semantics instead of eating repeated timeouts.

pub mod circuit_breaker;
pub mod config;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerMetrics, CircuitState};
pub use config::CircuitBreakerConfig;
