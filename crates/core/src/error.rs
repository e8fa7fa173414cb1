//! Error types for the MCP event gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur across the gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Request validation failed; surfaced to the caller, never retried
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Target or resource absent
    #[error("not found: {0}")]
    NotFound(String),

    /// Duplicate target or server id
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Forwarding engine disabled or transport down
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Retryable transport error; internal, promoted to a target failure
    /// once the retry budget is exhausted
    #[error("transient delivery error: {0}")]
    Transient(String),

    /// Attempt chain exceeded the target-configured timeout
    #[error("timed out after {timeout_ms}ms: {context}")]
    Timeout {
        /// Timeout duration in milliseconds
        timeout_ms: u64,
        /// Additional context
        context: String,
    },

    /// Every matched target failed delivery
    #[error("all {count} matched targets failed: {details}")]
    AllTargetsFailed {
        /// Number of targets that failed
        count: usize,
        /// Per-target failure details
        details: String,
    },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the retry loop should attempt delivery again.
    ///
    /// Only transient transport errors qualify. Timeouts bound the whole
    /// attempt chain, so they terminate it rather than re-enter it.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    /// Shorthand for an `InvalidArgument` error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    /// Shorthand for a `Transient` error
    pub fn transient(msg: impl Into<String>) -> Self {
        Error::Transient(msg.into())
    }

    /// Shorthand for an `Internal` error
    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_is_retryable() {
        assert!(Error::transient("connection reset").is_retryable());
        assert!(!Error::invalid_argument("event_id is empty").is_retryable());
        assert!(!Error::NotFound("t1".into()).is_retryable());
        assert!(!Error::Timeout {
            timeout_ms: 30_000,
            context: "delivery".into()
        }
        .is_retryable());
    }
}
