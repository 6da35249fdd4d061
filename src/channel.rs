//! The [`Channel`] facade: pub/sub messaging, presence, commands and join
//! tracking on one named channel.
//!
//! A `Channel` owns no connection state. Every listener registration
//! validates synchronously, builds a [`Fingerprint`] and enqueues a command
//! for the engine task; identical registrations from any number of channels
//! collapse onto one wire subscription.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> pylon_link::Result<()> {
//! use serde_json::json;
//!
//! let client = pylon_link::PylonLinkClient::builder()
//!     .base_url("http://localhost:3000")
//!     .build()?;
//!
//! let chat = client.subscribe("chat")?;
//! let handle = chat.add_message_listener(Some("room = 'eu'"), |msg| {
//!     println!("message: {}", msg);
//! })?;
//!
//! chat.publish(json!({"text": "hello"})).await?;
//! chat.remove_listener(&handle)?;
//! # Ok(())
//! # }
//! ```

use crate::connection::{EngineCmd, EngineHandle};
use crate::error::Result;
use crate::models::{ErrorDetail, PublishOptions, SubscriptionKind};
use crate::subscription::{Fingerprint, ListenerHandle, ListenerRecord};
use crate::validation;
use serde_json::{json, Value as JsonValue};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Handle to one named pub/sub channel.
///
/// Obtained from [`PylonLinkClient::subscribe`](crate::PylonLinkClient::subscribe).
/// Cheap to keep around; all state lives on the engine task.
pub struct Channel {
    name: String,
    engine: Arc<EngineHandle>,
    /// The internal CONNECT-kind listener backing `is_joined`.
    connect_handle: Mutex<Option<ListenerHandle>>,
    joined: Arc<AtomicBool>,
}

impl Channel {
    /// Create the channel handle and register its join feed. The channel
    /// counts as joined once the gateway acknowledges that subscription.
    pub(crate) fn new(engine: Arc<EngineHandle>, name: String) -> Result<Self> {
        let channel = Self {
            name,
            engine,
            connect_handle: Mutex::new(None),
            joined: Arc::new(AtomicBool::new(false)),
        };
        channel.join()?;
        Ok(channel)
    }

    /// Channel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True once the gateway has acknowledged the join feed. Falls back to
    /// false while reconnecting and after [`leave`](Self::leave).
    pub fn is_joined(&self) -> bool {
        self.joined.load(Ordering::SeqCst)
    }

    /// (Re-)register the join feed. A no-op when already registered.
    pub fn join(&self) -> Result<()> {
        let mut guard = self.connect_handle.lock().expect("connect handle lock");
        if guard.is_some() {
            return Ok(());
        }
        let fingerprint = Fingerprint::new(SubscriptionKind::Connect, &self.name, None);
        let listener_id = self.engine.next_listener_id();
        self.engine.enqueue(EngineCmd::Acquire {
            fingerprint: fingerprint.clone(),
            listener: ListenerRecord {
                id: listener_id,
                callback: Arc::new(|_| {}),
                on_error: None,
                ready_flag: Some(self.joined.clone()),
            },
        })?;
        *guard = Some(ListenerHandle {
            fingerprint,
            listener_id,
        });
        Ok(())
    }

    /// Leave the channel: removes every listener this channel registered,
    /// including the join feed. [`join`](Self::join) re-registers afterwards.
    pub fn leave(&self) -> Result<()> {
        self.engine.enqueue(EngineCmd::ReleaseMatching {
            target: self.name.clone(),
            kinds: vec![
                SubscriptionKind::Connect,
                SubscriptionKind::Messages,
                SubscriptionKind::UserStatus,
                SubscriptionKind::Commands,
            ],
        })?;
        self.joined.store(false, Ordering::SeqCst);
        *self.connect_handle.lock().expect("connect handle lock") = None;
        Ok(())
    }

    /// Listen for join events on this channel. The callback fires with
    /// `Value::Null` each time the join feed is (re-)acknowledged.
    pub fn add_connect_listener(
        &self,
        callback: impl Fn(JsonValue) + Send + Sync + 'static,
    ) -> Result<ListenerHandle> {
        self.add_listener(SubscriptionKind::Connect, None, Arc::new(callback), None)
    }

    /// Listen for messages published to this channel, optionally filtered by
    /// a selector evaluated gateway-side.
    pub fn add_message_listener(
        &self,
        selector: Option<&str>,
        callback: impl Fn(JsonValue) + Send + Sync + 'static,
    ) -> Result<ListenerHandle> {
        self.add_listener(
            SubscriptionKind::Messages,
            selector,
            Arc::new(callback),
            None,
        )
    }

    /// [`add_message_listener`](Self::add_message_listener) with an error
    /// callback that fires if the gateway rejects the subscription (e.g. a
    /// malformed selector).
    pub fn add_message_listener_with_error(
        &self,
        selector: Option<&str>,
        callback: impl Fn(JsonValue) + Send + Sync + 'static,
        on_error: impl Fn(ErrorDetail) + Send + Sync + 'static,
    ) -> Result<ListenerHandle> {
        self.add_listener(
            SubscriptionKind::Messages,
            selector,
            Arc::new(callback),
            Some(Arc::new(on_error)),
        )
    }

    /// Listen for presence / user-status updates on this channel.
    pub fn add_user_status_listener(
        &self,
        selector: Option<&str>,
        callback: impl Fn(JsonValue) + Send + Sync + 'static,
    ) -> Result<ListenerHandle> {
        self.add_listener(
            SubscriptionKind::UserStatus,
            selector,
            Arc::new(callback),
            None,
        )
    }

    /// [`add_user_status_listener`](Self::add_user_status_listener) with an
    /// error callback.
    pub fn add_user_status_listener_with_error(
        &self,
        selector: Option<&str>,
        callback: impl Fn(JsonValue) + Send + Sync + 'static,
        on_error: impl Fn(ErrorDetail) + Send + Sync + 'static,
    ) -> Result<ListenerHandle> {
        self.add_listener(
            SubscriptionKind::UserStatus,
            selector,
            Arc::new(callback),
            Some(Arc::new(on_error)),
        )
    }

    /// Listen for commands sent to this channel.
    pub fn add_command_listener(
        &self,
        selector: Option<&str>,
        callback: impl Fn(JsonValue) + Send + Sync + 'static,
    ) -> Result<ListenerHandle> {
        self.add_listener(
            SubscriptionKind::Commands,
            selector,
            Arc::new(callback),
            None,
        )
    }

    /// [`add_command_listener`](Self::add_command_listener) with an error
    /// callback.
    pub fn add_command_listener_with_error(
        &self,
        selector: Option<&str>,
        callback: impl Fn(JsonValue) + Send + Sync + 'static,
        on_error: impl Fn(ErrorDetail) + Send + Sync + 'static,
    ) -> Result<ListenerHandle> {
        self.add_listener(
            SubscriptionKind::Commands,
            selector,
            Arc::new(callback),
            Some(Arc::new(on_error)),
        )
    }

    /// Remove exactly the listener the handle was returned for. Removing an
    /// already-removed listener is a no-op.
    pub fn remove_listener(&self, handle: &ListenerHandle) -> Result<()> {
        self.engine.enqueue(EngineCmd::Release {
            fingerprint: handle.fingerprint.clone(),
            listener_id: handle.listener_id,
        })
    }

    /// Remove every message listener registered under `selector`.
    pub fn remove_message_listeners(&self, selector: Option<&str>) -> Result<()> {
        self.remove_listeners(SubscriptionKind::Messages, selector)
    }

    /// Remove every user-status listener registered under `selector`.
    pub fn remove_user_status_listeners(&self, selector: Option<&str>) -> Result<()> {
        self.remove_listeners(SubscriptionKind::UserStatus, selector)
    }

    /// Remove every command listener registered under `selector`.
    pub fn remove_command_listeners(&self, selector: Option<&str>) -> Result<()> {
        self.remove_listeners(SubscriptionKind::Commands, selector)
    }

    /// Remove all message, user-status and command listeners on this channel.
    /// The join feed stays registered.
    pub fn remove_all_listeners(&self) -> Result<()> {
        self.engine.enqueue(EngineCmd::ReleaseMatching {
            target: self.name.clone(),
            kinds: SubscriptionKind::CHANNEL_FEATURE_KINDS.to_vec(),
        })
    }

    /// Send a command to the channel and await the gateway's response.
    /// Independent of any subscription; fails fast when not connected.
    pub async fn send_command(&self, command_type: &str, data: JsonValue) -> Result<JsonValue> {
        validation::command_name(command_type)?;
        self.engine
            .invoke(
                format!("command:{}", self.name),
                json!({ "type": command_type, "data": data }),
            )
            .await
    }

    /// Publish a message to the channel.
    pub async fn publish(&self, message: JsonValue) -> Result<()> {
        self.publish_with_options(message, PublishOptions::new())
            .await
    }

    /// Publish a message with delivery metadata (publisher id, subtopic,
    /// headers) used by subscriber-side selectors.
    pub async fn publish_with_options(
        &self,
        message: JsonValue,
        options: PublishOptions,
    ) -> Result<()> {
        self.engine
            .invoke(
                format!("publish:{}", self.name),
                json!({ "message": message, "options": options }),
            )
            .await
            .map(|_| ())
    }

    fn add_listener(
        &self,
        kind: SubscriptionKind,
        selector: Option<&str>,
        callback: crate::subscription::EventCallback,
        on_error: Option<crate::subscription::ErrorCallback>,
    ) -> Result<ListenerHandle> {
        validation::filter(selector, "Selector")?;
        let fingerprint = Fingerprint::new(kind, &self.name, selector);
        let listener_id = self.engine.next_listener_id();
        self.engine.enqueue(EngineCmd::Acquire {
            fingerprint: fingerprint.clone(),
            listener: ListenerRecord {
                id: listener_id,
                callback,
                on_error,
                ready_flag: None,
            },
        })?;
        Ok(ListenerHandle {
            fingerprint,
            listener_id,
        })
    }

    fn remove_listeners(&self, kind: SubscriptionKind, selector: Option<&str>) -> Result<()> {
        self.engine.enqueue(EngineCmd::ReleaseFingerprint {
            fingerprint: Fingerprint::new(kind, &self.name, selector),
        })
    }
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.name)
            .field("joined", &self.is_joined())
            .finish()
    }
}
