use serde::{Deserialize, Serialize};
use std::fmt;

/// Error details attached to a gateway fault frame.
///
/// Delivered to a listener's error callback when the gateway rejects a
/// subscription, or wrapped in
/// [`PylonLinkError::ServerError`](crate::error::PylonLinkError::ServerError)
/// when a one-shot request faults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Gateway error code.
    pub code: String,

    /// Human-readable error message.
    pub message: String,

    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.details {
            Some(details) => write!(f, "{}: {} ({})", self.code, self.message, details),
            None => write!(f, "{}: {}", self.code, self.message),
        }
    }
}
