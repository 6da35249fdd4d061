use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use super::subscription_filter::SubscriptionFilter;

/// Client-to-gateway frames.
///
/// Encoded as JSON text frames over the WebSocket, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Register a subscription. The gateway replies with `sub_ready` carrying
    /// the same `request_id`, or `sub_fault` if the request is rejected.
    SubOn {
        /// Client-assigned id correlating the eventual ack/fault.
        request_id: u64,
        /// `"<kind>:<target>"`, e.g. `"messages:chat"` or `"create:orders"`.
        name: String,
        /// Server-evaluated filter; empty filter is serialized as `{}`.
        options: SubscriptionFilter,
    },

    /// Tear down a subscription previously acknowledged by the gateway.
    SubOff {
        /// Gateway-assigned subscription id from the `sub_ready` ack.
        subscription_id: String,
    },

    /// One-shot request expecting a `met_res` or `met_fault` reply.
    MetReq {
        /// Client-assigned id correlating the reply.
        correlation_id: u64,
        /// Method name, e.g. `"command:chat"` or `"publish:chat"`.
        name: String,
        /// Method payload.
        data: JsonValue,
    },
}
