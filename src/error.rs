//! Error types for pylon-link.
//!
//! All fallible public operations return [`Result`]. Errors are split by who
//! caused them and who gets to see them:
//!
//! - [`PylonLinkError::ValidationError`]: bad arguments, raised synchronously
//!   before any network traffic.
//! - [`PylonLinkError::ConnectionError`]: the transport is gone or was never
//!   established. Outstanding one-shot requests are rejected with this;
//!   subscriptions are resumed silently after reconnect and never see it.
//! - [`PylonLinkError::ServerError`]: the gateway rejected a one-shot request.
//! - [`PylonLinkError::RequestTimeoutError`]: a one-shot request received no
//!   response within its deadline.
//!
//! Subscription rejections (bad selector, unknown channel) are not a variant
//! here: they are delivered as [`ErrorDetail`](crate::models::ErrorDetail) to
//! the affected listener's error callback and never fail other subscriptions.

use crate::models::ErrorDetail;
use thiserror::Error;

/// Result type for pylon-link operations.
pub type Result<T> = std::result::Result<T, PylonLinkError>;

/// Errors that can occur in pylon-link operations.
#[derive(Error, Debug)]
pub enum PylonLinkError {
    /// Malformed arguments to a public method. Raised before any frame is sent.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Client construction or URL problems.
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Transport lost or never established.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// The gateway answered a one-shot request with a fault frame.
    #[error("Server error ({}): {}", .0.code, .0.message)]
    ServerError(ErrorDetail),

    /// A one-shot request received no response within its deadline.
    #[error("Request timed out: {0}")]
    RequestTimeoutError(String),

    /// An inbound frame could not be parsed or routed. Logged and dropped
    /// internally; only surfaced for debugging.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// JSON encode/decode failure.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP failure during gateway URL lookup.
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Unexpected internal state.
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl PylonLinkError {
    /// True when retrying after a reconnect could help.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PylonLinkError::ConnectionError(_) | PylonLinkError::RequestTimeoutError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code_and_message() {
        let err = PylonLinkError::ServerError(ErrorDetail {
            code: "4009".to_string(),
            message: "invalid selector".to_string(),
            details: None,
        });
        let text = err.to_string();
        assert!(text.contains("4009"));
        assert!(text.contains("invalid selector"));
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(PylonLinkError::ConnectionError("lost".into()).is_recoverable());
        assert!(PylonLinkError::RequestTimeoutError("slow".into()).is_recoverable());
        assert!(!PylonLinkError::ValidationError("bad".into()).is_recoverable());
    }
}
