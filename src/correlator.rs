//! One-shot request correlation.
//!
//! Every command send gets a fresh correlation id and a [`PendingRequest`]
//! entry holding the caller's oneshot sender and a deadline. A matching
//! `met_res`/`met_fault` frame settles the entry; so does deadline expiry or
//! connection loss. Settling removes the entry, so each request resolves
//! exactly once and ids are never reused while outstanding (the id space is a
//! per-engine monotonic `u64`).
//!
//! Like the registry, this is a pure table with no I/O: the engine task calls
//! in on frame arrival and deadline ticks.

use crate::error::{PylonLinkError, Result};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// A command sent to the gateway that has not been answered yet.
pub(crate) struct PendingRequest {
    /// Method name, kept for timeout diagnostics.
    pub name: String,
    pub result_tx: oneshot::Sender<Result<JsonValue>>,
    pub deadline: Instant,
}

/// Table of outstanding one-shot requests, keyed by correlation id.
#[derive(Default)]
pub(crate) struct RequestCorrelator {
    pending: HashMap<u64, PendingRequest>,
    next_correlation_id: u64,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a correlation id and store the pending entry.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        result_tx: oneshot::Sender<Result<JsonValue>>,
        deadline: Instant,
    ) -> u64 {
        self.next_correlation_id += 1;
        let correlation_id = self.next_correlation_id;
        self.pending.insert(
            correlation_id,
            PendingRequest {
                name: name.into(),
                result_tx,
                deadline,
            },
        );
        correlation_id
    }

    /// Settle the request matching `correlation_id`. Returns false for an
    /// unknown id (stale response after timeout, dropped by the caller).
    pub fn settle(&mut self, correlation_id: u64, result: Result<JsonValue>) -> bool {
        match self.pending.remove(&correlation_id) {
            Some(request) => {
                // The caller may have dropped the future; that is fine.
                let _ = request.result_tx.send(result);
                true
            }
            None => false,
        }
    }

    /// The earliest deadline among outstanding requests, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|request| request.deadline).min()
    }

    /// Reject every request whose deadline has passed.
    pub fn expire_due(&mut self, now: Instant) {
        let due: Vec<u64> = self
            .pending
            .iter()
            .filter(|(_, request)| request.deadline <= now)
            .map(|(&id, _)| id)
            .collect();
        for correlation_id in due {
            if let Some(request) = self.pending.remove(&correlation_id) {
                log::debug!(
                    "[pylon-link] Request '{}' (id {}) timed out",
                    request.name,
                    correlation_id
                );
                let _ = request.result_tx.send(Err(PylonLinkError::RequestTimeoutError(
                    format!("no response for '{}'", request.name),
                )));
            }
        }
    }

    /// Reject everything outstanding, e.g. on connection loss.
    pub fn reject_all(&mut self, message: &str) {
        for (_, request) in self.pending.drain() {
            let _ = request
                .result_tx
                .send(Err(PylonLinkError::ConnectionError(message.to_string())));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
