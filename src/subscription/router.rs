//! Inbound event demultiplexing and fan-out.
//!
//! Given a pushed frame tagged with a gateway subscription id, find the
//! record and invoke every listener's callback with the payload, in
//! registration order, synchronously on the engine task. The router filters
//! nothing; selector/where-clause evaluation happened on the gateway.
//!
//! A frame whose subscription id is unknown is dropped: after a release, the
//! gateway may deliver one more event before it processes the SUB_OFF.

use crate::models::SubscriptionStatus;
use serde_json::Value as JsonValue;

use super::registry::SubscriptionRegistry;

/// Fan a pushed event out to all listeners of the addressed subscription.
/// Returns the number of listeners invoked (0 for dropped frames).
pub(crate) fn route(
    registry: &SubscriptionRegistry,
    subscription_id: &str,
    payload: JsonValue,
) -> usize {
    let Some(record) = registry.record_by_subscription_id(subscription_id) else {
        log::debug!(
            "[pylon-link] Dropping event for unknown subscription '{}'",
            subscription_id
        );
        return 0;
    };
    if record.status != SubscriptionStatus::Ready {
        log::debug!(
            "[pylon-link] Dropping event for non-ready subscription '{}'",
            subscription_id
        );
        return 0;
    }
    let mut delivered = 0;
    for listener in &record.listeners {
        (listener.callback)(payload.clone());
        delivered += 1;
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ClientFrame, SubscriptionKind};
    use crate::subscription::fingerprint::Fingerprint;
    use crate::subscription::listener::ListenerRecord;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn recording_listener(id: u64, log: Arc<Mutex<Vec<(u64, JsonValue)>>>) -> ListenerRecord {
        ListenerRecord {
            id,
            callback: Arc::new(move |payload| {
                log.lock().unwrap().push((id, payload));
            }),
            on_error: None,
            ready_flag: None,
        }
    }

    fn ready_registry(log: Arc<Mutex<Vec<(u64, JsonValue)>>>) -> SubscriptionRegistry {
        let mut registry = SubscriptionRegistry::new();
        let fp = Fingerprint::new(SubscriptionKind::Messages, "chat", None);
        let frame = registry
            .acquire(fp.clone(), recording_listener(1, log.clone()), true)
            .unwrap();
        registry.acquire(fp, recording_listener(2, log), true);
        let request_id = match frame {
            ClientFrame::SubOn { request_id, .. } => request_id,
            _ => unreachable!(),
        };
        registry.on_sub_ready(request_id, "srv-1".into());
        registry
    }

    #[test]
    fn test_fan_out_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ready_registry(log.clone());

        for n in 1..=3 {
            route(&registry, "srv-1", json!({"n": n}));
        }

        let events = log.lock().unwrap();
        // Each event reaches listener 1 before listener 2; events stay ordered.
        let expected: Vec<(u64, JsonValue)> = vec![
            (1, json!({"n": 1})),
            (2, json!({"n": 1})),
            (1, json!({"n": 2})),
            (2, json!({"n": 2})),
            (1, json!({"n": 3})),
            (2, json!({"n": 3})),
        ];
        assert_eq!(*events, expected);
    }

    #[test]
    fn test_unknown_subscription_id_is_dropped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = ready_registry(log.clone());
        assert_eq!(route(&registry, "srv-gone", json!({})), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_pending_subscription_receives_nothing() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = SubscriptionRegistry::new();
        let fp = Fingerprint::new(SubscriptionKind::Messages, "chat", None);
        registry.acquire(fp, recording_listener(1, log.clone()), true);
        // No ack yet: the id is not even mapped, the frame is dropped.
        assert_eq!(route(&registry, "srv-1", json!({})), 0);
        assert!(log.lock().unwrap().is_empty());
    }
}
