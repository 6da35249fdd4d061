//! Rust client library for the Pylon realtime gateway.
//!
//! One [`PylonLinkClient`] maintains a single WebSocket connection to the
//! gateway and multiplexes any number of live-update feeds over it:
//!
//! - Pub/sub channels ([`Channel`]): messages, presence, commands, join
//!   tracking, plus publish and command round-trips
//! - Table change feeds ([`TableEvents`]): create/update/delete and their
//!   bulk variants, optionally narrowed by a where-clause
//! - Deterministic deduplication: listeners registered for the same kind,
//!   target and normalized filter share one wire subscription
//! - Reference-counted teardown: the wire subscription closes when its last
//!   listener is removed
//! - Automatic reconnection with exponential backoff and transparent
//!   resubscription of every surviving feed
//! - Connection lifecycle events (`on_connect`, `on_disconnect`, `on_error`)
//!   and keepalive pings
//!
//! # Quick start
//!
//! ```rust,no_run
//! use pylon_link::PylonLinkClient;
//! use serde_json::json;
//!
//! # async fn example() -> pylon_link::Result<()> {
//! let client = PylonLinkClient::builder()
//!     .base_url("https://pylon.example.com")
//!     .api_key("pk_123")
//!     .build()?;
//!
//! let chat = client.subscribe("chat")?;
//! chat.add_message_listener(None, |msg| println!("got: {}", msg))?;
//! chat.publish(json!({"text": "hello"})).await?;
//! # Ok(())
//! # }
//! ```

pub mod channel;
pub mod client;
pub(crate) mod connection;
pub(crate) mod correlator;
pub mod error;
pub mod event_handlers;
pub mod models;
pub mod subscription;
pub mod table_events;
pub mod timeouts;
pub(crate) mod validation;

pub use channel::Channel;
pub use client::{PylonLinkClient, PylonLinkClientBuilder};
pub use error::{PylonLinkError, Result};
pub use event_handlers::{DisconnectReason, EventHandlers, TransportError};
pub use models::{
    ConnectionOptions, ConnectionState, ErrorDetail, PublishOptions, SubscriptionInfo,
    SubscriptionKind, SubscriptionStatus,
};
pub use subscription::{Fingerprint, ListenerHandle};
pub use table_events::TableEvents;
pub use timeouts::PylonLinkTimeouts;
