//! Circuit breaker configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a single circuit breaker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Time to wait in open state before attempting recovery
    pub timeout: Duration,

    /// Number of successful calls in half-open state to close the circuit
    pub success_threshold: u32,
}

impl CircuitBreakerConfig {
    /// Preset for the backing key-value store
    ///
    /// Store faults surface quickly (connection refused, socket timeout), so
    /// a low threshold with a short recovery window keeps cache latency flat
    /// while the store is down.
    pub fn for_store() -> Self {
        Self {
            failure_threshold: 3,
            timeout: Duration::from_secs(15),
            success_threshold: 2,
        }
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), String> {
        if self.failure_threshold == 0 {
            return Err("failure_threshold must be greater than 0".to_string());
        }

        if self.timeout.is_zero() {
            return Err("timeout must be greater than 0".to_string());
        }

        if self.timeout > Duration::from_secs(300) {
            return Err("timeout should not exceed 300 seconds".to_string());
        }

        if self.success_threshold == 0 {
            return Err("success_threshold must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}
