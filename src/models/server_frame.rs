use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::error_detail::ErrorDetail;

/// Gateway-to-client frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Acknowledges a `sub_on` request; the subscription is live from now on.
    SubReady {
        /// The `request_id` from the originating `sub_on`.
        request_id: u64,
        /// Gateway-assigned subscription id used to tag pushed events.
        subscription_id: String,
    },

    /// The gateway rejected a `sub_on` request (bad selector, unknown target).
    SubFault {
        /// The `request_id` from the originating `sub_on`.
        request_id: u64,
        /// What went wrong.
        error: ErrorDetail,
    },

    /// Pushed event for an acknowledged subscription.
    SubRes {
        /// Gateway-assigned subscription id from the `sub_ready` ack.
        subscription_id: String,
        /// Event payload; shape depends on the subscription kind.
        payload: JsonValue,
    },

    /// Successful reply to a `met_req`.
    MetRes {
        /// The `correlation_id` from the originating `met_req`.
        correlation_id: u64,
        /// Method result.
        data: JsonValue,
    },

    /// Failure reply to a `met_req`.
    MetFault {
        /// The `correlation_id` from the originating `met_req`.
        correlation_id: u64,
        /// What went wrong.
        error: ErrorDetail,
    },

    /// Any frame type this client version does not understand.
    /// Logged and dropped, never surfaced to application code.
    #[serde(other)]
    Unknown,
}
