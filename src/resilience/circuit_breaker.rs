//! # Circuit Breaker Implementation
//!
//! Classic three-state circuit breaker: Closed (normal operation), Open
//! (failing fast), and Half-Open (testing recovery). State and counters are
//! atomics so the hot path never takes a lock.

use crate::resilience::config::CircuitBreakerConfig;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Lock-free atomic counters for circuit breaker metrics.
#[derive(Debug)]
struct AtomicMetrics {
    total_calls: AtomicU64,
    success_count: AtomicU64,
    failure_count: AtomicU64,
    consecutive_failures: AtomicU64,
    half_open_calls: AtomicU64,
    total_duration_nanos: AtomicU64,
}

impl AtomicMetrics {
    fn new() -> Self {
        Self {
            total_calls: AtomicU64::new(0),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
            consecutive_failures: AtomicU64::new(0),
            half_open_calls: AtomicU64::new(0),
            total_duration_nanos: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record_success(&self, duration: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.success_count.fetch_add(1, Ordering::Relaxed);
        self.total_duration_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    #[inline]
    fn record_failure(&self, duration: Duration) {
        self.total_calls.fetch_add(1, Ordering::Relaxed);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
        self.total_duration_nanos
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }
}

/// Current epoch nanos from SystemTime
#[inline]
fn epoch_nanos_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_nanos() as u64
}

/// Circuit breaker states representing the current operational mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CircuitState {
    /// Normal operation - all calls are allowed through
    Closed = 0,
    /// Failure mode - all calls fail fast without executing
    Open = 1,
    /// Testing recovery - limited calls allowed to test store health
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(value: u8) -> Self {
        match value {
            0 => CircuitState::Closed,
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Open, // Default to safest state
        }
    }
}

/// Point-in-time metrics snapshot for monitoring surfaces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub consecutive_failures: u64,
    pub current_state: CircuitState,
    pub failure_rate: f64,
    pub average_duration: Duration,
}

/// Core circuit breaker with atomic state management
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Component name for logging and metrics
    name: String,

    /// Current circuit state (atomic for thread safety)
    state: AtomicU8,

    /// Configuration parameters
    config: CircuitBreakerConfig,

    /// Lock-free atomic metrics
    metrics: AtomicMetrics,

    /// Epoch nanos when circuit was opened (0 = not open).
    /// Release/Acquire ordering paired with state transitions.
    opened_at_epoch_nanos: AtomicU64,
}

impl CircuitBreaker {
    /// Create a new circuit breaker with the given name and configuration
    pub fn new(name: String, config: CircuitBreakerConfig) -> Self {
        info!(
            component = %name,
            failure_threshold = config.failure_threshold,
            timeout_seconds = config.timeout.as_secs(),
            success_threshold = config.success_threshold,
            "Circuit breaker initialized"
        );

        Self {
            name,
            state: AtomicU8::new(CircuitState::Closed as u8),
            config,
            metrics: AtomicMetrics::new(),
            opened_at_epoch_nanos: AtomicU64::new(0),
        }
    }

    /// Get current circuit state
    pub fn state(&self) -> CircuitState {
        CircuitState::from(self.state.load(Ordering::Acquire))
    }

    /// Get component name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if a call should be allowed based on current state
    ///
    /// An open circuit transitions to half-open once the recovery timeout has
    /// elapsed; half-open allows a bounded number of probe calls.
    pub fn should_allow(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let opened_nanos = self.opened_at_epoch_nanos.load(Ordering::Acquire);
                if opened_nanos == 0 {
                    warn!(component = %self.name, "Circuit open but no timestamp recorded");
                    return true;
                }

                let elapsed_nanos = epoch_nanos_now().saturating_sub(opened_nanos);
                if elapsed_nanos >= self.config.timeout.as_nanos() as u64 {
                    self.transition_to_half_open();
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                let half_open_calls = self.metrics.half_open_calls.load(Ordering::Relaxed);
                half_open_calls < self.config.success_threshold as u64
            }
        }
    }

    /// Record a successful operation (lock-free)
    pub fn record_success(&self, duration: Duration) {
        self.metrics.record_success(duration);

        match self.state() {
            CircuitState::HalfOpen => {
                let calls = self.metrics.half_open_calls.fetch_add(1, Ordering::Relaxed) + 1;
                if calls >= self.config.success_threshold as u64 {
                    self.transition_to_closed();
                }
            }
            CircuitState::Closed => {
                self.metrics.consecutive_failures.store(0, Ordering::Relaxed);
            }
            CircuitState::Open => {
                debug!(component = %self.name, "Success recorded while circuit is open");
            }
        }
    }

    /// Record a failed operation (lock-free)
    pub fn record_failure(&self, duration: Duration) {
        self.metrics.record_failure(duration);

        match self.state() {
            CircuitState::Closed => {
                let failures = self
                    .metrics
                    .consecutive_failures
                    .fetch_add(1, Ordering::Relaxed)
                    + 1;
                if failures >= self.config.failure_threshold as u64 {
                    self.transition_to_open();
                }
            }
            CircuitState::HalfOpen => {
                // Any failure in half-open state immediately re-opens
                self.transition_to_open();
            }
            CircuitState::Open => {}
        }
    }

    /// Force circuit to open state (for emergency situations)
    pub fn force_open(&self) {
        warn!(component = %self.name, "Circuit breaker forced open");
        self.transition_to_open();
    }

    /// Force circuit to closed state (for emergency recovery)
    pub fn force_closed(&self) {
        warn!(component = %self.name, "Circuit breaker forced closed");
        self.transition_to_closed();
    }

    /// Get current metrics snapshot
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        let total_calls = self.metrics.total_calls.load(Ordering::Relaxed);
        let success_count = self.metrics.success_count.load(Ordering::Relaxed);
        let failure_count = self.metrics.failure_count.load(Ordering::Relaxed);
        let total_duration_nanos = self.metrics.total_duration_nanos.load(Ordering::Relaxed);

        let (failure_rate, average_duration) = if total_calls > 0 {
            (
                failure_count as f64 / total_calls as f64,
                Duration::from_nanos(total_duration_nanos / total_calls),
            )
        } else {
            (0.0, Duration::ZERO)
        };

        CircuitBreakerMetrics {
            total_calls,
            success_count,
            failure_count,
            consecutive_failures: self.metrics.consecutive_failures.load(Ordering::Relaxed),
            current_state: self.state(),
            failure_rate,
            average_duration,
        }
    }

    fn transition_to_closed(&self) {
        self.metrics.consecutive_failures.store(0, Ordering::Relaxed);
        self.metrics.half_open_calls.store(0, Ordering::Relaxed);
        self.opened_at_epoch_nanos.store(0, Ordering::Release);
        self.state
            .store(CircuitState::Closed as u8, Ordering::Release);

        info!(component = %self.name, "Circuit breaker closed (recovered)");
    }

    fn transition_to_open(&self) {
        self.opened_at_epoch_nanos
            .store(epoch_nanos_now(), Ordering::Release);
        self.metrics.half_open_calls.store(0, Ordering::Relaxed);
        self.state.store(CircuitState::Open as u8, Ordering::Release);

        warn!(
            component = %self.name,
            consecutive_failures = self.metrics.consecutive_failures.load(Ordering::Relaxed),
            failure_threshold = self.config.failure_threshold,
            timeout_seconds = self.config.timeout.as_secs(),
            "Circuit breaker opened (failing fast)"
        );
    }

    fn transition_to_half_open(&self) {
        self.metrics.half_open_calls.store(0, Ordering::Relaxed);
        self.state
            .store(CircuitState::HalfOpen as u8, Ordering::Release);

        info!(
            component = %self.name,
            success_threshold = self.config.success_threshold,
            "Circuit breaker half-open (testing recovery)"
        );
    }
}
