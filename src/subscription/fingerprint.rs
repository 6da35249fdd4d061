//! Deterministic identity for logical subscriptions.
//!
//! Two registrations that would produce identical gateway-side feeds must
//! collapse onto one wire subscription. The [`Fingerprint`] is that identity:
//! kind + target + normalized filter. Normalization trims surrounding
//! whitespace and treats an empty result as "no filter", so `""`, `"  "` and
//! `None` all map to the same subscription.

use crate::models::{SubscriptionFilter, SubscriptionKind};
use std::fmt;

/// Deterministic key identifying a logical subscription.
///
/// Derivation is pure and total: equal inputs always yield equal
/// fingerprints regardless of the call site that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    kind: SubscriptionKind,
    target: String,
    filter: Option<String>,
}

impl Fingerprint {
    /// Build a fingerprint from a kind, target and optional raw filter.
    pub fn new(kind: SubscriptionKind, target: impl Into<String>, filter: Option<&str>) -> Self {
        Self {
            kind,
            target: target.into(),
            filter: normalize_filter(filter),
        }
    }

    /// Subscription kind.
    pub fn kind(&self) -> SubscriptionKind {
        self.kind
    }

    /// Channel or table name.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Normalized filter expression, if any.
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// Wire name for the SUB_ON frame: `"<kind>:<target>"`.
    pub fn wire_name(&self) -> String {
        format!("{}:{}", self.kind.wire_name(), self.target)
    }

    /// SUB_ON options for this subscription. Channel kinds carry the filter
    /// as a selector, data kinds as a where-clause.
    pub fn wire_filter(&self) -> SubscriptionFilter {
        match &self.filter {
            None => SubscriptionFilter::none(),
            Some(expr) if self.kind.uses_selector() => SubscriptionFilter::selector(expr.clone()),
            Some(expr) => SubscriptionFilter::where_clause(expr.clone()),
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.filter {
            Some(filter) => write!(f, "{}:{}[{}]", self.kind, self.target, filter),
            None => write!(f, "{}:{}", self.kind, self.target),
        }
    }
}

/// Trim surrounding whitespace; an empty result means "no filter".
fn normalize_filter(filter: Option<&str>) -> Option<String> {
    let trimmed = filter?.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_inputs_equal_fingerprints() {
        let a = Fingerprint::new(SubscriptionKind::Messages, "chat", Some("room='1'"));
        let b = Fingerprint::new(SubscriptionKind::Messages, "chat", Some("room='1'"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_whitespace_is_normalized() {
        let a = Fingerprint::new(SubscriptionKind::Messages, "chat", Some("  room='1' "));
        let b = Fingerprint::new(SubscriptionKind::Messages, "chat", Some("room='1'"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_filter_equals_absent_filter() {
        let empty = Fingerprint::new(SubscriptionKind::Messages, "chat", Some(""));
        let blank = Fingerprint::new(SubscriptionKind::Messages, "chat", Some("   "));
        let absent = Fingerprint::new(SubscriptionKind::Messages, "chat", None);
        assert_eq!(empty, absent);
        assert_eq!(blank, absent);
        assert!(absent.filter().is_none());
    }

    #[test]
    fn test_distinct_selectors_are_distinct() {
        let a = Fingerprint::new(SubscriptionKind::Messages, "chat", Some("foo=1"));
        let b = Fingerprint::new(SubscriptionKind::Messages, "chat", Some("foo=2"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_kind_and_target_separate_fingerprints() {
        let messages = Fingerprint::new(SubscriptionKind::Messages, "chat", None);
        let commands = Fingerprint::new(SubscriptionKind::Commands, "chat", None);
        let other = Fingerprint::new(SubscriptionKind::Messages, "news", None);
        assert_ne!(messages, commands);
        assert_ne!(messages, other);
    }

    #[test]
    fn test_wire_name_and_filter() {
        let fp = Fingerprint::new(SubscriptionKind::Create, "orders", Some("amount > 10"));
        assert_eq!(fp.wire_name(), "create:orders");
        let filter = fp.wire_filter();
        assert_eq!(filter.where_clause.as_deref(), Some("amount > 10"));
        assert!(filter.selector.is_none());

        let fp = Fingerprint::new(SubscriptionKind::Commands, "chat", Some("t='kick'"));
        let filter = fp.wire_filter();
        assert_eq!(filter.selector.as_deref(), Some("t='kick'"));
        assert!(filter.where_clause.is_none());
    }
}
