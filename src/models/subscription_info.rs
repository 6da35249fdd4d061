//! Subscription metadata exposed to callers.
//!
//! [`SubscriptionInfo`] provides a read-only snapshot of an active
//! subscription's state, useful for debugging and test assertions.

use serde::{Deserialize, Serialize};

use super::subscription_kind::SubscriptionKind;
use super::subscription_status::SubscriptionStatus;

/// Read-only snapshot of an active subscription's metadata.
///
/// Returned by
/// [`PylonLinkClient::active_subscriptions`](crate::client::PylonLinkClient::active_subscriptions).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionInfo {
    /// Subscription kind (messages, user_status, create, ...).
    pub kind: SubscriptionKind,
    /// Channel or table name this subscription targets.
    pub target: String,
    /// Normalized selector/where-clause, if any.
    pub filter: Option<String>,
    /// Current lifecycle status.
    pub status: SubscriptionStatus,
    /// Gateway-assigned subscription id, once acknowledged.
    /// May change across reconnects.
    pub subscription_id: Option<String>,
    /// Number of listeners currently attached.
    pub listener_count: usize,
    /// Millis since Unix epoch when the first listener registered.
    pub created_at_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_roundtrip() {
        let info = SubscriptionInfo {
            kind: SubscriptionKind::Messages,
            target: "chat".to_string(),
            filter: Some("room='1'".to_string()),
            status: SubscriptionStatus::Ready,
            subscription_id: Some("srv-7".to_string()),
            listener_count: 2,
            created_at_ms: 1700000000000,
        };
        let json = serde_json::to_string(&info).unwrap();
        let back: SubscriptionInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, SubscriptionKind::Messages);
        assert_eq!(back.target, "chat");
        assert_eq!(back.status, SubscriptionStatus::Ready);
        assert_eq!(back.listener_count, 2);
    }
}
