use serde::{Deserialize, Serialize};

/// Server-evaluated filter carried in a SUB_ON frame.
///
/// Channel subscriptions narrow delivery with a `selector`; table-change
/// subscriptions use a `where_clause`. At most one of the two is set; both
/// absent means "deliver everything". Evaluation happens entirely on the
/// gateway; the client never filters events locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionFilter {
    /// Selector expression for channel subscriptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Where-clause for table-change subscriptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<String>,
}

impl SubscriptionFilter {
    /// Filter that matches everything.
    pub fn none() -> Self {
        Self::default()
    }

    /// Channel selector filter.
    pub fn selector(expr: impl Into<String>) -> Self {
        Self {
            selector: Some(expr.into()),
            where_clause: None,
        }
    }

    /// Table where-clause filter.
    pub fn where_clause(expr: impl Into<String>) -> Self {
        Self {
            selector: None,
            where_clause: Some(expr.into()),
        }
    }

    /// True when no filter expression is set.
    pub fn is_empty(&self) -> bool {
        self.selector.is_none() && self.where_clause.is_none()
    }
}
