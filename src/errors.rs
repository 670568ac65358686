//! Cache error types
//!
//! Every failure the engine can encounter collapses into one of four
//! categories. None of them ever propagate past the cache boundary into
//! business logic - callers see `None`/`false`/`0` returns and the error
//! lands in structured logs instead.

use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to connect to the backing store
    #[error("Store connection error: {0}")]
    ConnectionError(String),

    /// Failed to serialize or deserialize a cached value
    ///
    /// Logged at error level - this indicates a caller bug, not an
    /// infrastructure fault.
    #[error("Cache serialization error: {0}")]
    SerializationError(String),

    /// Store operation exceeded its deadline
    #[error("Cache operation timed out: {0}")]
    Timeout(String),

    /// Generic store-side failure
    #[error("Store backend error: {0}")]
    BackendError(String),
}

impl CacheError {
    /// True for faults of the store itself (connection, timeout, backend),
    /// false for serialization faults that indicate a caller bug.
    pub fn is_store_fault(&self) -> bool {
        !matches!(self, CacheError::SerializationError(_))
    }
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_fault_classification() {
        assert!(CacheError::ConnectionError("refused".into()).is_store_fault());
        assert!(CacheError::Timeout("5s".into()).is_store_fault());
        assert!(CacheError::BackendError("oops".into()).is_store_fault());
        assert!(!CacheError::SerializationError("bad json".into()).is_store_fault());
    }

    #[test]
    fn test_error_display() {
        let err = CacheError::ConnectionError("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }
}
