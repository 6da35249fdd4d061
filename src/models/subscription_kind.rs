use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of subscription kinds understood by the gateway.
///
/// Channel kinds (`Connect`, `Messages`, `UserStatus`, `Commands`) target a
/// named pub/sub channel; data kinds target a table and fire on row changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionKind {
    /// Channel membership feed. A channel is "joined" once this is acknowledged.
    Connect,
    /// Pub/sub messages published to a channel.
    Messages,
    /// Presence / user-status updates on a channel.
    UserStatus,
    /// Commands sent to a channel.
    Commands,
    /// Row inserted into a table.
    Create,
    /// Row updated in a table.
    Update,
    /// Row deleted from a table.
    Delete,
    /// Bulk insert into a table.
    BulkCreate,
    /// Bulk update of a table.
    BulkUpdate,
    /// Bulk delete from a table.
    BulkDelete,
}

impl SubscriptionKind {
    /// Stable wire tag used in SUB_ON `name` fields.
    pub fn wire_name(&self) -> &'static str {
        match self {
            SubscriptionKind::Connect => "connect",
            SubscriptionKind::Messages => "messages",
            SubscriptionKind::UserStatus => "user_status",
            SubscriptionKind::Commands => "commands",
            SubscriptionKind::Create => "create",
            SubscriptionKind::Update => "update",
            SubscriptionKind::Delete => "delete",
            SubscriptionKind::BulkCreate => "bulk_create",
            SubscriptionKind::BulkUpdate => "bulk_update",
            SubscriptionKind::BulkDelete => "bulk_delete",
        }
    }

    /// True for kinds that target a pub/sub channel rather than a table.
    pub fn is_channel_kind(&self) -> bool {
        matches!(
            self,
            SubscriptionKind::Connect
                | SubscriptionKind::Messages
                | SubscriptionKind::UserStatus
                | SubscriptionKind::Commands
        )
    }

    /// Channel kinds carry a selector; data kinds carry a where-clause.
    pub fn uses_selector(&self) -> bool {
        self.is_channel_kind()
    }

    /// All table-change kinds, in wire order.
    pub const DATA_KINDS: [SubscriptionKind; 6] = [
        SubscriptionKind::Create,
        SubscriptionKind::Update,
        SubscriptionKind::Delete,
        SubscriptionKind::BulkCreate,
        SubscriptionKind::BulkUpdate,
        SubscriptionKind::BulkDelete,
    ];

    /// Channel feature kinds (everything on a channel except the join feed).
    pub const CHANNEL_FEATURE_KINDS: [SubscriptionKind; 3] = [
        SubscriptionKind::Messages,
        SubscriptionKind::UserStatus,
        SubscriptionKind::Commands,
    ];
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}
