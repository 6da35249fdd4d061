//! Subscription state machine: fingerprints, listener records, the registry
//! and the inbound event router.
//!
//! All of this state lives on the engine task; the public facades reach it
//! only through engine commands.

pub mod fingerprint;
pub mod listener;
pub(crate) mod registry;
pub(crate) mod router;

pub use fingerprint::Fingerprint;
pub use listener::{ErrorCallback, EventCallback, ListenerHandle};

pub(crate) use listener::ListenerRecord;
pub(crate) use registry::SubscriptionRegistry;
