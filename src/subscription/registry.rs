//! The subscription registry: dedup, reference counting and replay.
//!
//! One [`SubscriptionRecord`] exists per distinct [`Fingerprint`] no matter
//! how many listeners share it. The registry is a pure state machine: every
//! operation mutates local state and returns the wire frames (if any) the
//! engine must send. It performs no I/O itself, which keeps the protocol
//! rules unit-testable without a socket.
//!
//! Wire rules enforced here:
//! - the first listener on a fingerprint produces exactly one SUB_ON;
//! - SUB_OFF is produced exactly when the listener count drops from 1 to 0,
//!   and only if the subscription ever reached Ready (a record released while
//!   still Pending never made it to the gateway's books, so there is nothing
//!   to tear down);
//! - after a transport swap, all surviving records are replayed in original
//!   creation order with fresh request ids.

use crate::models::{
    ClientFrame, ErrorDetail, SubscriptionInfo, SubscriptionKind, SubscriptionStatus,
};
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::time::{SystemTime, UNIX_EPOCH};

use super::fingerprint::Fingerprint;
use super::listener::ListenerRecord;

/// Current time in millis since Unix epoch.
fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Registry record tracking one fingerprint's gateway-side feed and its
/// attached listeners.
pub(crate) struct SubscriptionRecord {
    pub fingerprint: Fingerprint,
    pub status: SubscriptionStatus,
    /// Gateway-assigned id, set on SUB_READY. May change across reconnects.
    pub subscription_id: Option<String>,
    /// Request id of the outstanding SUB_ON, while one is in flight.
    pub pending_request_id: Option<u64>,
    /// Attached listeners in registration order.
    pub listeners: Vec<ListenerRecord>,
    /// Monotonic creation sequence, fixes the replay order.
    created_seq: u64,
    created_at_ms: u64,
}

impl SubscriptionRecord {
    fn set_ready(&mut self, subscription_id: String) {
        self.status = SubscriptionStatus::Ready;
        self.subscription_id = Some(subscription_id);
        self.pending_request_id = None;
        for listener in &self.listeners {
            if let Some(flag) = &listener.ready_flag {
                flag.store(true, Ordering::SeqCst);
            }
        }
    }

    fn set_pending(&mut self) {
        self.status = SubscriptionStatus::Pending;
        self.subscription_id = None;
        self.pending_request_id = None;
        self.lower_ready_flags();
    }

    fn lower_ready_flags(&self) {
        for listener in &self.listeners {
            if let Some(flag) = &listener.ready_flag {
                flag.store(false, Ordering::SeqCst);
            }
        }
    }
}

/// Central registry of all live subscriptions on one engine.
#[derive(Default)]
pub(crate) struct SubscriptionRegistry {
    records: HashMap<Fingerprint, SubscriptionRecord>,
    by_subscription_id: HashMap<String, Fingerprint>,
    by_request_id: HashMap<u64, Fingerprint>,
    next_request_id: u64,
    next_created_seq: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a listener to the record for `fingerprint`, creating the record
    /// if absent. Returns the SUB_ON frame to send when a new record was
    /// created while the transport is up; a record created while disconnected
    /// is picked up by the next [`replay_frames`](Self::replay_frames).
    ///
    /// The listener is appended regardless of the record's status; a
    /// registration never waits for the gateway.
    pub fn acquire(
        &mut self,
        fingerprint: Fingerprint,
        listener: ListenerRecord,
        connected: bool,
    ) -> Option<ClientFrame> {
        if let Some(record) = self.records.get_mut(&fingerprint) {
            if record.status == SubscriptionStatus::Ready {
                if let Some(flag) = &listener.ready_flag {
                    flag.store(true, Ordering::SeqCst);
                }
            }
            record.listeners.push(listener);
            return None;
        }

        let created_seq = self.next_created_seq;
        self.next_created_seq += 1;

        let mut record = SubscriptionRecord {
            fingerprint: fingerprint.clone(),
            status: SubscriptionStatus::Pending,
            subscription_id: None,
            pending_request_id: None,
            listeners: vec![listener],
            created_seq,
            created_at_ms: now_ms(),
        };

        let frame = if connected {
            let request_id = self.allocate_request_id();
            record.pending_request_id = Some(request_id);
            self.by_request_id.insert(request_id, fingerprint.clone());
            Some(ClientFrame::SubOn {
                request_id,
                name: fingerprint.wire_name(),
                options: fingerprint.wire_filter(),
            })
        } else {
            None
        };

        self.records.insert(fingerprint, record);
        frame
    }

    /// Detach one listener by id. When the last listener leaves, the record
    /// is removed and a SUB_OFF is returned iff the subscription ever reached
    /// Ready. Returns `None` silently when the handle no longer matches
    /// anything (already removed, benign).
    pub fn release(&mut self, fingerprint: &Fingerprint, listener_id: u64) -> Option<ClientFrame> {
        let record = self.records.get_mut(fingerprint)?;
        let before = record.listeners.len();
        record.listeners.retain(|listener| {
            if listener.id == listener_id {
                if let Some(flag) = &listener.ready_flag {
                    flag.store(false, Ordering::SeqCst);
                }
                false
            } else {
                true
            }
        });
        if record.listeners.len() == before {
            return None;
        }
        if record.listeners.is_empty() {
            return self.remove_record(fingerprint);
        }
        None
    }

    /// Detach every listener sharing `fingerprint` (selector-scoped bulk
    /// removal) and drop the record.
    pub fn release_fingerprint(&mut self, fingerprint: &Fingerprint) -> Option<ClientFrame> {
        self.records.get(fingerprint)?;
        self.remove_record(fingerprint)
    }

    /// Detach every listener on `target` for the given kinds (kind-level bulk
    /// removal). Returns the SUB_OFF frames for all removed Ready records.
    pub fn release_matching(
        &mut self,
        target: &str,
        kinds: &[SubscriptionKind],
    ) -> Vec<ClientFrame> {
        let victims: Vec<Fingerprint> = self
            .records
            .values()
            .filter(|record| {
                record.fingerprint.target() == target
                    && kinds.contains(&record.fingerprint.kind())
            })
            .map(|record| record.fingerprint.clone())
            .collect();

        victims
            .iter()
            .filter_map(|fingerprint| self.remove_record(fingerprint))
            .collect()
    }

    /// Gateway acknowledged a SUB_ON: Pending → Ready. Connect-kind records
    /// additionally deliver the join event to their listeners. Returns false
    /// for an unknown or stale request id (dropped by the caller).
    pub fn on_sub_ready(&mut self, request_id: u64, subscription_id: String) -> bool {
        let Some(fingerprint) = self.by_request_id.remove(&request_id) else {
            return false;
        };
        let Some(record) = self.records.get_mut(&fingerprint) else {
            return false;
        };
        if record.pending_request_id != Some(request_id) {
            return false;
        }
        record.set_ready(subscription_id.clone());
        self.by_subscription_id.insert(subscription_id, fingerprint);
        true
    }

    /// Gateway rejected a SUB_ON: every attached listener's error callback
    /// receives the fault, then the record is removed. No SUB_OFF is needed:
    /// the gateway never created the subscription. A later identical
    /// registration starts over from Pending.
    pub fn on_sub_fault(&mut self, request_id: u64, error: &ErrorDetail) -> bool {
        let Some(fingerprint) = self.by_request_id.remove(&request_id) else {
            return false;
        };
        let Some(record) = self.records.remove(&fingerprint) else {
            return false;
        };
        log::warn!(
            "[pylon-link] Subscription {} rejected by gateway: {}",
            fingerprint,
            error
        );
        record.lower_ready_flags();
        for listener in &record.listeners {
            if let Some(on_error) = &listener.on_error {
                on_error(error.clone());
            }
        }
        true
    }

    /// Transport lost or explicitly closed: every record falls back to
    /// Pending, gateway ids and in-flight request ids are forgotten, listener
    /// lists are untouched.
    pub fn mark_all_pending(&mut self) {
        self.by_subscription_id.clear();
        self.by_request_id.clear();
        for record in self.records.values_mut() {
            record.set_pending();
        }
    }

    /// SUB_ON frames for every surviving record, in original creation order,
    /// with fresh request ids. Called right after a (re)connect, before any
    /// queued command is processed, so pre-existing subscriptions always hit
    /// the wire ahead of ones registered later.
    pub fn replay_frames(&mut self) -> Vec<ClientFrame> {
        let mut order: Vec<Fingerprint> = self.records.keys().cloned().collect();
        order.sort_by_key(|fingerprint| self.records[fingerprint].created_seq);

        let mut frames = Vec::with_capacity(order.len());
        for fingerprint in order {
            let request_id = self.allocate_request_id();
            let record = self
                .records
                .get_mut(&fingerprint)
                .expect("record vanished during replay");
            record.status = SubscriptionStatus::Pending;
            record.pending_request_id = Some(request_id);
            self.by_request_id.insert(request_id, fingerprint.clone());
            frames.push(ClientFrame::SubOn {
                request_id,
                name: fingerprint.wire_name(),
                options: fingerprint.wire_filter(),
            });
        }
        frames
    }

    /// Look up a record by gateway subscription id (event routing path).
    pub fn record_by_subscription_id(&self, subscription_id: &str) -> Option<&SubscriptionRecord> {
        let fingerprint = self.by_subscription_id.get(subscription_id)?;
        self.records.get(fingerprint)
    }

    /// Connect-kind record lookup, used by the engine to deliver the join
    /// event right after a SUB_READY. Split out from
    /// [`on_sub_ready`](Self::on_sub_ready) so the caller controls when user
    /// callbacks run.
    pub fn connect_record(&self, subscription_id: &str) -> Option<&SubscriptionRecord> {
        let record = self.record_by_subscription_id(subscription_id)?;
        if record.fingerprint.kind() == SubscriptionKind::Connect {
            Some(record)
        } else {
            None
        }
    }

    /// Read-only snapshot of all records in creation order.
    pub fn snapshot(&self) -> Vec<SubscriptionInfo> {
        let mut records: Vec<&SubscriptionRecord> = self.records.values().collect();
        records.sort_by_key(|record| record.created_seq);
        records
            .into_iter()
            .map(|record| SubscriptionInfo {
                kind: record.fingerprint.kind(),
                target: record.fingerprint.target().to_string(),
                filter: record.fingerprint.filter().map(|s| s.to_string()),
                status: record.status,
                subscription_id: record.subscription_id.clone(),
                listener_count: record.listeners.len(),
                created_at_ms: record.created_at_ms,
            })
            .collect()
    }

    /// SUB_OFF frames for every Ready record, without mutating anything.
    /// Used for best-effort teardown right before a graceful shutdown.
    pub fn sub_off_frames(&self) -> Vec<ClientFrame> {
        self.by_subscription_id
            .keys()
            .map(|subscription_id| ClientFrame::SubOff {
                subscription_id: subscription_id.clone(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    fn allocate_request_id(&mut self) -> u64 {
        self.next_request_id += 1;
        self.next_request_id
    }

    /// Drop a record and its index entries; SUB_OFF only if it reached Ready.
    fn remove_record(&mut self, fingerprint: &Fingerprint) -> Option<ClientFrame> {
        let record = self.records.remove(fingerprint)?;
        record.lower_ready_flags();
        if let Some(request_id) = record.pending_request_id {
            self.by_request_id.remove(&request_id);
        }
        let subscription_id = record.subscription_id?;
        self.by_subscription_id.remove(&subscription_id);
        Some(ClientFrame::SubOff { subscription_id })
    }
}
