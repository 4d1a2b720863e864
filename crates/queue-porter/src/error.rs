//! Error types for broker and backend operations.

use std::time::Duration;
use thiserror::Error;

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

/// Top-level error type for all broker-facing operations
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("queue not declared: {queue_name}")]
    QueueNotFound { queue_name: String },

    #[error("queue {queue_name} does not exist and auto-create is disabled")]
    QueueMissing { queue_name: String },

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// Errors surfaced at the backend boundary
///
/// These wrap the queue service's own failure signals; the broker layer
/// propagates them without reinterpretation, except for `AlreadyExists`
/// which declaration swallows as a creation-race success.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("queue already exists: {queue_name}")]
    AlreadyExists { queue_name: String },

    #[error("queue does not exist: {queue_name}")]
    NotFound { queue_name: String },

    #[error("message not found or lease expired: {receipt}")]
    ReceiptNotFound { receipt: String },

    #[error("message too large: {size} bytes (max: {max_size})")]
    MessageTooLarge { size: usize, max_size: usize },

    #[error("delay {requested:?} exceeds maximum {max:?}")]
    DelayTooLong { requested: Duration, max: Duration },

    #[error("service error ({code}): {message}")]
    Service { code: String, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Check if error is transient and worth retrying by the host framework
    ///
    /// This crate never retries internally; the classification feeds the
    /// driving framework's retry middleware.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::AlreadyExists { .. } => false,
            Self::NotFound { .. } => false,
            Self::ReceiptNotFound { .. } => false,
            Self::MessageTooLarge { .. } => false,
            Self::DelayTooLong { .. } => false,
            Self::Service { .. } => true,
            Self::Network(_) => true,
            Self::Authentication(_) => false,
            Self::InvalidResponse(_) => false,
        }
    }
}

/// Errors during envelope encoding/decoding
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON serialization failed: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Validation errors
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("required field missing: {field}")]
    Required { field: String },

    #[error("invalid format for {field}: {message}")]
    InvalidFormat { field: String, message: String },

    #[error("value out of range for {field}: {message}")]
    OutOfRange { field: String, message: String },
}
