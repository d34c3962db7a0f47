//! # Hub Error Types
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Hub Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Envelope            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  SerializationFailed    │ │
//! │  │                 │  │  PublishFailed  │  │  InvalidEnvelope        │ │
//! │  │                 │  │  SubscribeFailed│  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

/// Result type alias for hub operations.
pub type HubResult<T> = Result<T, HubError>;

#[derive(Debug, Error)]
pub enum HubError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("Invalid hub configuration: {0}")]
    InvalidConfig(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Broadcast backend unreachable.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("Subscribe failed: {0}")]
    SubscribeFailed(String),

    // =========================================================================
    // Envelope Errors
    // =========================================================================
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    /// Bytes on the channel that are not a `{type, payload}` envelope.
    #[error("Invalid envelope: {0}")]
    InvalidEnvelope(String),

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    #[error("Event hub is shutting down")]
    ShuttingDown,
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::SerializationFailed(err.to_string())
    }
}

impl From<redis::RedisError> for HubError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_dropped() || err.is_connection_refusal() || err.is_io_error() {
            HubError::ConnectionFailed(err.to_string())
        } else {
            HubError::PublishFailed(err.to_string())
        }
    }
}

// =============================================================================
// Error Categorization (for retry logic)
// =============================================================================

impl HubError {
    /// Returns true if the operation can be retried.
    ///
    /// ## Retryable Errors
    /// - Connection failures
    /// - Publish/subscribe failures on a live backend
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Envelope encoding problems
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            HubError::ConnectionFailed(_)
                | HubError::PublishFailed(_)
                | HubError::SubscribeFailed(_)
        )
    }
}
