//! Listener records and removal tokens.
//!
//! Removal is by explicit [`ListenerHandle`] token rather than callback
//! identity, so the same closure can be registered under several selectors
//! without ambiguity.

use crate::models::ErrorDetail;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::fingerprint::Fingerprint;

/// Callback invoked with each pushed event payload.
pub type EventCallback = Arc<dyn Fn(JsonValue) + Send + Sync>;

/// Callback invoked when the gateway rejects the underlying subscription.
pub type ErrorCallback = Arc<dyn Fn(ErrorDetail) + Send + Sync>;

/// One registered listener attached to a subscription record.
///
/// Registration order is preserved; events fan out to listeners in the order
/// they were added.
pub(crate) struct ListenerRecord {
    /// Process-wide unique listener id, allocated by the engine handle.
    pub id: u64,
    pub callback: EventCallback,
    pub on_error: Option<ErrorCallback>,
    /// Raised when the owning subscription reaches Ready, lowered when it
    /// falls back to Pending. Used for channel join tracking.
    pub ready_flag: Option<Arc<AtomicBool>>,
}

impl fmt::Debug for ListenerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerRecord")
            .field("id", &self.id)
            .field("on_error", &self.on_error.is_some())
            .field("ready_flag", &self.ready_flag.is_some())
            .finish()
    }
}

/// Token returned from every `add_*_listener` call, used for exact removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerHandle {
    pub(crate) fingerprint: Fingerprint,
    pub(crate) listener_id: u64,
}

impl ListenerHandle {
    /// The fingerprint of the subscription this listener is attached to.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// The unique id of this listener registration.
    pub fn listener_id(&self) -> u64 {
        self.listener_id
    }
}
