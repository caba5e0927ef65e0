//! Error types for metricdb
//!
//! Provides a unified error type for codec, store and engine operations.

use thiserror::Error;

/// Result type alias using MetricError
pub type Result<T> = std::result::Result<T, MetricError>;

/// Unified error type for metricdb operations
#[derive(Debug, Error)]
pub enum MetricError {
    // -------------------------------------------------------------------------
    // Metric Errors
    // -------------------------------------------------------------------------
    /// Put was called with a stamp below the dataset horizon
    #[error("Stamp {stamp} is below horizon {horizon}")]
    StampTooSmall { stamp: u32, horizon: u32 },

    /// A stored key or value does not match the expected layout
    #[error("Corrupted data: {0}")]
    Corrupted(String),

    /// A metric field cannot be represented by the configured encoding
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Key not found")]
    KeyNotFound,

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl MetricError {
    /// Check if error indicates corrupted persisted data
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            MetricError::Corrupted(_) | MetricError::WalCorruption(_)
        )
    }

    /// Check if the operation may succeed when retried by the caller
    pub fn is_retryable(&self) -> bool {
        matches!(self, MetricError::Io(_))
    }
}

impl From<bincode::Error> for MetricError {
    fn from(e: bincode::Error) -> Self {
        MetricError::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        let io = MetricError::from(std::io::Error::new(std::io::ErrorKind::Interrupted, "eintr"));

        assert!(io.is_retryable());
        assert!(!io.is_corruption());
        assert!(MetricError::Corrupted("bad key".into()).is_corruption());
        assert!(MetricError::WalCorruption("crc".into()).is_corruption());
        assert!(!MetricError::StampTooSmall { stamp: 1, horizon: 2 }.is_corruption());
        assert!(!MetricError::Config("horizon".into()).is_retryable());
    }
}
