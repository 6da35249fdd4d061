//! The [`PylonLinkClient`]: entry point of the SDK.
//!
//! One client maintains at most one physical gateway connection, no matter
//! how many channels, tables and listeners hang off it. The client itself is
//! a thin handle around the connection engine; it is cheap to clone and safe
//! to share across tasks.
//!
//! # Example
//!
//! ```rust,no_run
//! use pylon_link::PylonLinkClient;
//!
//! # async fn example() -> pylon_link::Result<()> {
//! let client = PylonLinkClient::builder()
//!     .base_url("https://pylon.example.com")
//!     .api_key("pk_123")
//!     .build()?;
//!
//! let chat = client.subscribe("chat")?;
//! let orders = client.table("shop.orders")?;
//! orders.add_create_listener(Some("amount > 100"), |row| {
//!     println!("big order: {}", row);
//! })?;
//! # Ok(())
//! # }
//! ```

use crate::channel::Channel;
use crate::connection::{EngineConfig, EngineHandle};
use crate::error::{PylonLinkError, Result};
use crate::event_handlers::EventHandlers;
use crate::models::{ConnectionOptions, ConnectionState, SubscriptionInfo};
use crate::table_events::TableEvents;
use crate::timeouts::PylonLinkTimeouts;
use crate::validation;
use std::sync::Arc;

/// Client for the Pylon realtime gateway.
#[derive(Clone)]
pub struct PylonLinkClient {
    engine: Arc<EngineHandle>,
}

impl PylonLinkClient {
    /// Start building a client.
    pub fn builder() -> PylonLinkClientBuilder {
        PylonLinkClientBuilder::default()
    }

    /// Establish the gateway connection now. Optional: the connection is
    /// also established lazily by the first listener registration. Resolves
    /// once the WebSocket handshake completes.
    pub async fn connect(&self) -> Result<()> {
        self.engine.connect().await
    }

    /// Close the gateway connection. Registered listeners survive and are
    /// resubscribed by the next [`connect`](Self::connect); outstanding
    /// command futures are rejected.
    pub async fn disconnect(&self) -> Result<()> {
        self.engine.disconnect().await
    }

    /// Force a full teardown + reconnect cycle, as if the transport had
    /// dropped. Useful in integration tests exercising resubscription.
    pub async fn reset(&self) -> Result<()> {
        self.engine.reset().await
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.engine.connection_state()
    }

    /// True while the WebSocket is up.
    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Diagnostic snapshot of every live subscription record.
    pub async fn active_subscriptions(&self) -> Result<Vec<SubscriptionInfo>> {
        self.engine.list_subscriptions().await
    }

    /// Obtain a handle to the named pub/sub channel and register its join
    /// feed. Validates the name synchronously.
    pub fn subscribe(&self, channel_name: &str) -> Result<Channel> {
        validation::channel_name(channel_name)?;
        Channel::new(self.engine.clone(), channel_name.to_string())
    }

    /// Obtain a handle to the named table's change feeds. Validates the name
    /// synchronously.
    pub fn table(&self, table_name: &str) -> Result<TableEvents> {
        validation::table_name(table_name)?;
        Ok(TableEvents::new(self.engine.clone(), table_name.to_string()))
    }
}

impl std::fmt::Debug for PylonLinkClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PylonLinkClient")
            .field("state", &self.connection_state())
            .finish()
    }
}

/// Builder for [`PylonLinkClient`].
#[derive(Debug, Default)]
pub struct PylonLinkClientBuilder {
    base_url: Option<String>,
    gateway_url: Option<String>,
    api_key: Option<String>,
    timeouts: PylonLinkTimeouts,
    connection_options: ConnectionOptions,
    event_handlers: EventHandlers,
}

impl PylonLinkClientBuilder {
    /// Base HTTP(S) URL of the Pylon deployment. Required unless a gateway
    /// URL override is given; used for realtime gateway discovery.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Connect straight to this gateway URL (`ws://`, `wss://`, or the
    /// http(s) twin), skipping discovery.
    pub fn gateway_url(mut self, gateway_url: impl Into<String>) -> Self {
        self.gateway_url = Some(gateway_url.into());
        self
    }

    /// API key sent on the discovery call and the WebSocket handshake.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the default timeouts.
    pub fn timeouts(mut self, timeouts: PylonLinkTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Override the reconnection policy.
    pub fn connection_options(mut self, options: ConnectionOptions) -> Self {
        self.connection_options = options;
        self
    }

    /// Register connection lifecycle callbacks.
    pub fn event_handlers(mut self, handlers: EventHandlers) -> Self {
        self.event_handlers = handlers;
        self
    }

    /// Build the client and spawn its engine task. Must be called from
    /// within a tokio runtime. No connection is made yet.
    pub fn build(self) -> Result<PylonLinkClient> {
        let base_url = match (self.base_url, &self.gateway_url) {
            (Some(url), _) => url,
            // With an explicit gateway URL the base URL is never dereferenced.
            (None, Some(_)) => String::new(),
            (None, None) => {
                return Err(PylonLinkError::ConfigurationError(
                    "Either base_url or gateway_url must be set".to_string(),
                ))
            }
        };
        if !base_url.is_empty()
            && !base_url.starts_with("http://")
            && !base_url.starts_with("https://")
        {
            return Err(PylonLinkError::ConfigurationError(format!(
                "base_url must be http(s), got: {}",
                base_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .build()
            .map_err(PylonLinkError::HttpError)?;

        let engine = EngineHandle::spawn(EngineConfig {
            base_url,
            gateway_url: self.gateway_url,
            api_key: self.api_key,
            timeouts: self.timeouts,
            connection_options: self.connection_options,
            event_handlers: self.event_handlers,
            http_client,
        });

        Ok(PylonLinkClient {
            engine: Arc::new(engine),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_builder_requires_a_url() {
        assert!(matches!(
            PylonLinkClient::builder().build(),
            Err(PylonLinkError::ConfigurationError(_))
        ));
        assert!(PylonLinkClient::builder()
            .base_url("http://localhost:3000")
            .build()
            .is_ok());
        assert!(PylonLinkClient::builder()
            .gateway_url("ws://localhost:3000/rt")
            .build()
            .is_ok());
    }

    #[tokio::test]
    async fn test_builder_rejects_non_http_base_url() {
        assert!(matches!(
            PylonLinkClient::builder().base_url("ftp://x").build(),
            Err(PylonLinkError::ConfigurationError(_))
        ));
    }

    #[tokio::test]
    async fn test_facade_validation_is_synchronous() {
        let client = PylonLinkClient::builder()
            .base_url("http://localhost:3000")
            .build()
            .unwrap();
        assert!(client.subscribe("bad channel").is_err());
        assert!(client.table("a.b.c").is_err());
        assert!(client.subscribe("chat").is_ok());
        assert!(client.table("shop.orders").is_ok());
        assert!(!client.is_connected());
    }
}
