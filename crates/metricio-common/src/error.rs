//! Error types for MetricIO
//!
//! This module defines the common error types used throughout the system.

use thiserror::Error;

/// Common result type for MetricIO operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for MetricIO
#[derive(Debug, Error)]
pub enum Error {
    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Wire-level conditions
    #[error("partial data, more bytes needed")]
    Again,

    #[error("connection closed by peer")]
    Closed,

    #[error("request timeout")]
    Timeout,

    #[error("protocol version mismatch: {local} (local) and {peer} (peer)")]
    VersionMismatch { local: u8, peer: u8 },

    #[error("frame too large: {len} bytes, max {max}")]
    TooLarge { len: usize, max: usize },

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("invalid message: {0}")]
    Invalid(String),

    // Storage errors
    #[error("timestamp precedes last record")]
    OutOfRange,

    #[error("no matching records")]
    NoResults,

    #[error("storage error: {0}")]
    Storage(String),

    // Remote errors the peer reported with a code this build does not know
    #[error("remote error code {0}")]
    Remote(u8),

    // Configuration errors
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create an invalid message error
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }

    /// Create an unsupported operation error
    pub fn unsupported(what: impl Into<String>) -> Self {
        Self::Unsupported(what.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this is the retry-later signal from a partial read
    #[must_use]
    pub fn is_again(&self) -> bool {
        matches!(self, Self::Again)
    }

    /// Check if this error ends the connection it occurred on
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Closed
                | Self::Timeout
                | Self::VersionMismatch { .. }
                | Self::TooLarge { .. }
                | Self::Unsupported(_)
                | Self::Invalid(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_again() {
        assert!(Error::Again.is_again());
        assert!(!Error::NoResults.is_again());
    }

    #[test]
    fn test_error_fatal() {
        assert!(Error::Timeout.is_fatal());
        assert!(Error::VersionMismatch { local: 1, peer: 2 }.is_fatal());
        assert!(Error::invalid("short body").is_fatal());
        assert!(!Error::OutOfRange.is_fatal());
        assert!(!Error::NoResults.is_fatal());
    }
}
