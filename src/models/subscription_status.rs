use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a subscription relative to gateway acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    /// Requested (or queued for replay), awaiting the gateway's ack.
    Pending,
    /// Acknowledged; events flow to listeners.
    Ready,
    /// Rejected by the gateway. The record is removed right after listeners
    /// are notified, so this state is only ever observed in error callbacks.
    Failed,
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Ready => "ready",
            SubscriptionStatus::Failed => "failed",
        };
        write!(f, "{}", text)
    }
}
