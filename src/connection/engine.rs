//! The connection engine: a background task owning the single gateway
//! WebSocket plus all subscription and request state.
//!
//! Facades never touch engine state directly: every mutation travels as an
//! [`EngineCmd`] over a bounded channel and is applied sequentially on the
//! engine task. That single-writer discipline is what makes the ordering
//! guarantees hold: events for one subscription reach listeners in arrival
//! order, replay after reconnect happens before any newer command, and no
//! lock is ever taken.
//!
//! The loop structure mirrors the three connection phases:
//! - transport up: `select!` over commands, inbound frames, the earliest
//!   request deadline and the keepalive/pong timers;
//! - transport wanted but down: exponential-backoff retry, still serving
//!   commands while waiting;
//! - idle: block on the command channel.

use crate::correlator::RequestCorrelator;
use crate::error::{PylonLinkError, Result};
use crate::event_handlers::{DisconnectReason, EventHandlers, TransportError};
use crate::models::{
    ClientFrame, ConnectionOptions, ConnectionState, ServerFrame, SubscriptionInfo,
    SubscriptionKind,
};
use crate::subscription::{
    router, Fingerprint, ListenerRecord, SubscriptionRegistry,
};
use crate::timeouts::PylonLinkTimeouts;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant as TokioInstant;
use tokio_tungstenite::tungstenite::protocol::Message;

use super::transport::{
    establish_ws, jitter_keepalive_interval, parse_frame, resolve_gateway_url, send_frame,
    WebSocketStream, DEFAULT_CMD_CHANNEL_CAPACITY, FAR_FUTURE, MAX_WS_TEXT_MESSAGE_BYTES,
};

/// Commands sent from the public API to the background engine task.
pub(crate) enum EngineCmd {
    /// Establish the transport; resolves once the handshake completes.
    Connect {
        result_tx: oneshot::Sender<Result<()>>,
    },
    /// Tear down the transport. Subscriptions survive (marked pending);
    /// outstanding requests are rejected. No automatic reconnect follows.
    Disconnect {
        result_tx: oneshot::Sender<()>,
    },
    /// Force a teardown + reconnect cycle (test-harness entry point).
    Reset {
        result_tx: oneshot::Sender<()>,
    },
    /// Attach a listener; creates the subscription when it is the first.
    Acquire {
        fingerprint: Fingerprint,
        listener: ListenerRecord,
    },
    /// Detach one listener by id.
    Release {
        fingerprint: Fingerprint,
        listener_id: u64,
    },
    /// Detach every listener on one fingerprint.
    ReleaseFingerprint {
        fingerprint: Fingerprint,
    },
    /// Detach every listener on `target` for the given kinds.
    ReleaseMatching {
        target: String,
        kinds: Vec<SubscriptionKind>,
    },
    /// One-shot request/response exchange. Fails fast when not connected.
    Invoke {
        name: String,
        data: JsonValue,
        result_tx: oneshot::Sender<Result<JsonValue>>,
    },
    /// Diagnostic snapshot of all subscription records.
    ListSubscriptions {
        result_tx: oneshot::Sender<Vec<SubscriptionInfo>>,
    },
    /// Gracefully stop the engine task.
    Shutdown,
}

/// Static configuration handed to the engine task at spawn time.
pub(crate) struct EngineConfig {
    pub base_url: String,
    pub gateway_url: Option<String>,
    pub api_key: Option<String>,
    pub timeouts: PylonLinkTimeouts,
    pub connection_options: ConnectionOptions,
    pub event_handlers: EventHandlers,
    pub http_client: reqwest::Client,
}

/// Handle to the engine task held (behind an `Arc`) by the client and every
/// facade derived from it. Dropping the last handle shuts the engine down.
pub(crate) struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCmd>,
    state: Arc<AtomicU8>,
    listener_seq: AtomicU64,
    _task: JoinHandle<()>,
}

impl EngineHandle {
    /// Spawn the engine task. The transport stays down until the first
    /// subscription request or an explicit `connect()`.
    pub fn spawn(config: EngineConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(DEFAULT_CMD_CHANNEL_CAPACITY);
        let state = Arc::new(AtomicU8::new(ConnectionState::Disconnected.as_u8()));
        let state_clone = state.clone();
        let task = tokio::spawn(async move {
            engine_task(cmd_rx, config, state_clone).await;
        });
        Self {
            cmd_tx,
            state,
            listener_seq: AtomicU64::new(1),
            _task: task,
        }
    }

    /// Allocate a unique listener id for a new registration.
    pub fn next_listener_id(&self) -> u64 {
        self.listener_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Current connection state, read without contacting the task.
    pub fn connection_state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Enqueue a fire-and-forget command without blocking the caller.
    pub fn enqueue(&self, cmd: EngineCmd) -> Result<()> {
        self.cmd_tx.try_send(cmd).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                PylonLinkError::ConnectionError("Engine command queue is full".to_string())
            }
            mpsc::error::TrySendError::Closed(_) => {
                PylonLinkError::ConnectionError("Engine is not running".to_string())
            }
        })
    }

    pub async fn connect(&self) -> Result<()> {
        self.request(|result_tx| EngineCmd::Connect { result_tx })
            .await?
    }

    pub async fn disconnect(&self) -> Result<()> {
        self.request(|result_tx| EngineCmd::Disconnect { result_tx })
            .await
    }

    pub async fn reset(&self) -> Result<()> {
        self.request(|result_tx| EngineCmd::Reset { result_tx }).await
    }

    pub async fn invoke(&self, name: String, data: JsonValue) -> Result<JsonValue> {
        self.request(|result_tx| EngineCmd::Invoke {
            name,
            data,
            result_tx,
        })
        .await?
    }

    pub async fn list_subscriptions(&self) -> Result<Vec<SubscriptionInfo>> {
        self.request(|result_tx| EngineCmd::ListSubscriptions { result_tx })
            .await
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> EngineCmd) -> Result<T> {
        let (result_tx, result_rx) = oneshot::channel();
        self.cmd_tx
            .send(build(result_tx))
            .await
            .map_err(|_| PylonLinkError::ConnectionError("Engine is not running".to_string()))?;
        result_rx.await.map_err(|_| {
            PylonLinkError::ConnectionError("Engine stopped before replying".to_string())
        })
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        let _ = self.cmd_tx.try_send(EngineCmd::Shutdown);
    }
}

fn set_state(state: &AtomicU8, value: ConnectionState) {
    state.store(value.as_u8(), Ordering::SeqCst);
}

/// What the offline command handler wants the main loop to do next.
enum Flow {
    Continue,
    Shutdown,
    /// A command arrived that requires the transport (connect, acquire).
    WantConnect,
    /// An explicit disconnect cancels any pending reconnection.
    CancelConnect,
}

/// Handle a command while the transport is down. Registry mutations are
/// applied immediately; wire frames are left to the next replay.
fn handle_cmd_offline(
    cmd: EngineCmd,
    registry: &mut SubscriptionRegistry,
    correlator: &mut RequestCorrelator,
    pending_connects: &mut Vec<oneshot::Sender<Result<()>>>,
    state: &AtomicU8,
) -> Flow {
    match cmd {
        EngineCmd::Connect { result_tx } => {
            pending_connects.push(result_tx);
            Flow::WantConnect
        }
        EngineCmd::Disconnect { result_tx } => {
            registry.mark_all_pending();
            correlator.reject_all("Client disconnected");
            set_state(state, ConnectionState::Disconnected);
            let _ = result_tx.send(());
            Flow::CancelConnect
        }
        EngineCmd::Reset { result_tx } => {
            registry.mark_all_pending();
            correlator.reject_all("Client reset");
            let _ = result_tx.send(());
            Flow::Continue
        }
        EngineCmd::Acquire {
            fingerprint,
            listener,
        } => {
            // No transport: the record is created pending and replayed on
            // (re)connect. The registration itself arms the connection.
            registry.acquire(fingerprint, listener, false);
            Flow::WantConnect
        }
        EngineCmd::Release {
            fingerprint,
            listener_id,
        } => {
            registry.release(&fingerprint, listener_id);
            Flow::Continue
        }
        EngineCmd::ReleaseFingerprint { fingerprint } => {
            registry.release_fingerprint(&fingerprint);
            Flow::Continue
        }
        EngineCmd::ReleaseMatching { target, kinds } => {
            registry.release_matching(&target, &kinds);
            Flow::Continue
        }
        EngineCmd::Invoke { result_tx, name, .. } => {
            log::debug!("[pylon-link] Rejecting '{}': not connected", name);
            let _ = result_tx.send(Err(PylonLinkError::ConnectionError(
                "Not connected to the gateway".to_string(),
            )));
            Flow::Continue
        }
        EngineCmd::ListSubscriptions { result_tx } => {
            let _ = result_tx.send(registry.snapshot());
            Flow::Continue
        }
        EngineCmd::Shutdown => Flow::Shutdown,
    }
}

/// Apply an inbound gateway frame to the registry/correlator tables.
fn handle_server_frame(
    frame: ServerFrame,
    registry: &mut SubscriptionRegistry,
    correlator: &mut RequestCorrelator,
) {
    match frame {
        ServerFrame::SubReady {
            request_id,
            subscription_id,
        } => {
            if registry.on_sub_ready(request_id, subscription_id.clone()) {
                log::debug!(
                    "[pylon-link] Subscription ready: request {} -> '{}'",
                    request_id,
                    subscription_id
                );
                // Channel join feeds deliver the join event itself.
                if let Some(record) = registry.connect_record(&subscription_id) {
                    for listener in &record.listeners {
                        (listener.callback)(JsonValue::Null);
                    }
                }
            } else {
                log::debug!(
                    "[pylon-link] Dropping stale sub_ready for request {}",
                    request_id
                );
            }
        }
        ServerFrame::SubFault { request_id, error } => {
            if !registry.on_sub_fault(request_id, &error) {
                log::debug!(
                    "[pylon-link] Dropping stale sub_fault for request {}",
                    request_id
                );
            }
        }
        ServerFrame::SubRes {
            subscription_id,
            payload,
        } => {
            router::route(registry, &subscription_id, payload);
        }
        ServerFrame::MetRes {
            correlation_id,
            data,
        } => {
            if !correlator.settle(correlation_id, Ok(data)) {
                log::debug!(
                    "[pylon-link] Dropping stale met_res for correlation {}",
                    correlation_id
                );
            }
        }
        ServerFrame::MetFault {
            correlation_id,
            error,
        } => {
            if !correlator.settle(correlation_id, Err(PylonLinkError::ServerError(error))) {
                log::debug!(
                    "[pylon-link] Dropping stale met_fault for correlation {}",
                    correlation_id
                );
            }
        }
        ServerFrame::Unknown => {
            log::warn!("[pylon-link] Dropping frame of unknown type");
        }
    }
}

/// Record the consequences of losing the transport. The caller clears the
/// stream itself.
#[allow(clippy::too_many_arguments)]
fn note_transport_loss(
    registry: &mut SubscriptionRegistry,
    correlator: &mut RequestCorrelator,
    state: &AtomicU8,
    event_handlers: &EventHandlers,
    options: &ConnectionOptions,
    want_connected: &mut bool,
    resuming: &mut bool,
    reason: DisconnectReason,
) {
    log::warn!("[pylon-link] Transport lost: {}", reason);
    event_handlers.emit_disconnect(reason);
    registry.mark_all_pending();
    correlator.reject_all("Connection lost");
    if options.auto_reconnect && *want_connected {
        *resuming = true;
        set_state(state, ConnectionState::Reconnecting);
    } else {
        *want_connected = false;
        set_state(state, ConnectionState::Disconnected);
    }
}

async fn engine_task(
    mut cmd_rx: mpsc::Receiver<EngineCmd>,
    cfg: EngineConfig,
    state: Arc<AtomicU8>,
) {
    let mut registry = SubscriptionRegistry::new();
    let mut correlator = RequestCorrelator::new();
    let mut ws_stream: Option<WebSocketStream> = None;

    let mut shutdown_requested = false;
    let mut want_connected = false;
    // True while the retry loop is recovering from an unexpected loss, as
    // opposed to serving a first/explicit connect.
    let mut resuming = false;
    // Skip the backoff sleep for the next attempt (explicit connect, first
    // subscription, reset).
    let mut immediate_attempt = false;
    let mut reconnect_attempts: u32 = 0;
    let mut pending_connects: Vec<oneshot::Sender<Result<()>>> = Vec::new();

    let keepalive_dur = if cfg.timeouts.keepalive_interval.is_zero() {
        FAR_FUTURE
    } else {
        jitter_keepalive_interval(cfg.timeouts.keepalive_interval, &cfg.base_url)
    };
    let has_keepalive = !cfg.timeouts.keepalive_interval.is_zero();
    let mut idle_deadline = TokioInstant::now() + keepalive_dur;

    let pong_timeout_dur = cfg.timeouts.pong_timeout;
    let has_pong_timeout = has_keepalive && !pong_timeout_dur.is_zero();
    let mut awaiting_pong = false;
    let mut pong_deadline = TokioInstant::now() + FAR_FUTURE;

    loop {
        if shutdown_requested {
            if let Some(ref mut ws) = ws_stream {
                for frame in registry.sub_off_frames() {
                    let _ = send_frame(ws, &frame, &cfg.event_handlers).await;
                }
                let _ = ws.close(None).await;
                cfg.event_handlers
                    .emit_disconnect(DisconnectReason::new("Client shut down"));
            }
            correlator.reject_all("Client shut down");
            set_state(&state, ConnectionState::Disconnected);
            return;
        }

        if let Some(ref mut ws) = ws_stream {
            let idle_sleep = tokio::time::sleep_until(idle_deadline);
            tokio::pin!(idle_sleep);

            let pong_sleep = tokio::time::sleep_until(pong_deadline);
            tokio::pin!(pong_sleep);

            let request_deadline = correlator.next_deadline();
            let request_sleep = tokio::time::sleep_until(
                request_deadline.unwrap_or_else(|| TokioInstant::now() + FAR_FUTURE),
            );
            tokio::pin!(request_sleep);

            tokio::select! {
                biased;

                _ = &mut pong_sleep, if has_pong_timeout && awaiting_pong => {
                    awaiting_pong = false;
                    ws_stream = None;
                    note_transport_loss(
                        &mut registry, &mut correlator, &state,
                        &cfg.event_handlers, &cfg.connection_options,
                        &mut want_connected, &mut resuming,
                        DisconnectReason::new(format!(
                            "Pong timeout ({:?}): gateway unresponsive", pong_timeout_dur
                        )),
                    );
                    continue;
                }

                _ = &mut request_sleep, if request_deadline.is_some() => {
                    correlator.expire_due(TokioInstant::now());
                }

                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(EngineCmd::Connect { result_tx }) => {
                            let _ = result_tx.send(Ok(()));
                        }
                        Some(EngineCmd::Disconnect { result_tx }) => {
                            let _ = ws.close(None).await;
                            ws_stream = None;
                            registry.mark_all_pending();
                            correlator.reject_all("Client disconnected");
                            want_connected = false;
                            resuming = false;
                            set_state(&state, ConnectionState::Disconnected);
                            cfg.event_handlers
                                .emit_disconnect(DisconnectReason::new("Client disconnected"));
                            let _ = result_tx.send(());
                            continue;
                        }
                        Some(EngineCmd::Reset { result_tx }) => {
                            let _ = ws.close(None).await;
                            ws_stream = None;
                            registry.mark_all_pending();
                            correlator.reject_all("Client reset");
                            resuming = false;
                            immediate_attempt = true;
                            cfg.event_handlers
                                .emit_disconnect(DisconnectReason::new("Client reset"));
                            let _ = result_tx.send(());
                            continue;
                        }
                        Some(EngineCmd::Acquire { fingerprint, listener }) => {
                            if let Some(frame) = registry.acquire(fingerprint, listener, true) {
                                if let Err(e) = send_frame(ws, &frame, &cfg.event_handlers).await {
                                    ws_stream = None;
                                    note_transport_loss(
                                        &mut registry, &mut correlator, &state,
                                        &cfg.event_handlers, &cfg.connection_options,
                                        &mut want_connected, &mut resuming,
                                        DisconnectReason::new(e.to_string()),
                                    );
                                    continue;
                                }
                            }
                        }
                        Some(EngineCmd::Release { fingerprint, listener_id }) => {
                            if let Some(frame) = registry.release(&fingerprint, listener_id) {
                                let _ = send_frame(ws, &frame, &cfg.event_handlers).await;
                            }
                        }
                        Some(EngineCmd::ReleaseFingerprint { fingerprint }) => {
                            if let Some(frame) = registry.release_fingerprint(&fingerprint) {
                                let _ = send_frame(ws, &frame, &cfg.event_handlers).await;
                            }
                        }
                        Some(EngineCmd::ReleaseMatching { target, kinds }) => {
                            for frame in registry.release_matching(&target, &kinds) {
                                let _ = send_frame(ws, &frame, &cfg.event_handlers).await;
                            }
                        }
                        Some(EngineCmd::Invoke { name, data, result_tx }) => {
                            let deadline = TokioInstant::now() + cfg.timeouts.request_timeout;
                            let correlation_id =
                                correlator.register(name.clone(), result_tx, deadline);
                            let frame = ClientFrame::MetReq { correlation_id, name, data };
                            if let Err(e) = send_frame(ws, &frame, &cfg.event_handlers).await {
                                correlator.settle(
                                    correlation_id,
                                    Err(PylonLinkError::ConnectionError(e.to_string())),
                                );
                                ws_stream = None;
                                note_transport_loss(
                                    &mut registry, &mut correlator, &state,
                                    &cfg.event_handlers, &cfg.connection_options,
                                    &mut want_connected, &mut resuming,
                                    DisconnectReason::new(e.to_string()),
                                );
                                continue;
                            }
                        }
                        Some(EngineCmd::ListSubscriptions { result_tx }) => {
                            let _ = result_tx.send(registry.snapshot());
                        }
                        Some(EngineCmd::Shutdown) | None => {
                            shutdown_requested = true;
                            continue;
                        }
                    }
                }

                _ = &mut idle_sleep, if has_keepalive && !awaiting_pong => {
                    if let Err(e) = ws.send(Message::Ping(Bytes::new())).await {
                        ws_stream = None;
                        note_transport_loss(
                            &mut registry, &mut correlator, &state,
                            &cfg.event_handlers, &cfg.connection_options,
                            &mut want_connected, &mut resuming,
                            DisconnectReason::new(format!("Keepalive ping failed: {}", e)),
                        );
                        continue;
                    }
                    cfg.event_handlers.emit_send("[ping]");
                    if has_pong_timeout {
                        awaiting_pong = true;
                        pong_deadline = TokioInstant::now() + pong_timeout_dur;
                    }
                    idle_deadline = TokioInstant::now() + keepalive_dur;
                }

                frame = ws.next() => {
                    idle_deadline = TokioInstant::now() + keepalive_dur;
                    if awaiting_pong {
                        awaiting_pong = false;
                        pong_deadline = TokioInstant::now() + FAR_FUTURE;
                    }

                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            if text.len() > MAX_WS_TEXT_MESSAGE_BYTES {
                                log::warn!(
                                    "[pylon-link] Text frame too large ({} bytes), dropped",
                                    text.len()
                                );
                                continue;
                            }
                            cfg.event_handlers.emit_receive(&text);
                            match parse_frame(&text) {
                                Ok(server_frame) => handle_server_frame(
                                    server_frame, &mut registry, &mut correlator,
                                ),
                                Err(e) => log::warn!("[pylon-link] {}", e),
                            }
                        }
                        Some(Ok(Message::Binary(data))) => {
                            log::warn!(
                                "[pylon-link] Binary frame ({} bytes) is not part of the protocol, dropped",
                                data.len()
                            );
                        }
                        Some(Ok(Message::Close(close_frame))) => {
                            let reason = if let Some(f) = close_frame {
                                DisconnectReason::with_code(f.reason.to_string(), f.code.into())
                            } else {
                                DisconnectReason::new("Gateway closed connection")
                            };
                            ws_stream = None;
                            note_transport_loss(
                                &mut registry, &mut correlator, &state,
                                &cfg.event_handlers, &cfg.connection_options,
                                &mut want_connected, &mut resuming, reason,
                            );
                            continue;
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = ws.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Pong(_))) => {
                            log::debug!("[pylon-link] Keepalive: received pong");
                        }
                        Some(Ok(Message::Frame(_))) => {}
                        Some(Err(e)) => {
                            cfg.event_handlers
                                .emit_error(TransportError::new(e.to_string(), true));
                            ws_stream = None;
                            note_transport_loss(
                                &mut registry, &mut correlator, &state,
                                &cfg.event_handlers, &cfg.connection_options,
                                &mut want_connected, &mut resuming,
                                DisconnectReason::new(format!("WebSocket error: {}", e)),
                            );
                            continue;
                        }
                        None => {
                            ws_stream = None;
                            note_transport_loss(
                                &mut registry, &mut correlator, &state,
                                &cfg.event_handlers, &cfg.connection_options,
                                &mut want_connected, &mut resuming,
                                DisconnectReason::new("WebSocket stream ended"),
                            );
                            continue;
                        }
                    }
                }
            }
        } else if want_connected {
            // ── Transport wanted but down: retry with backoff ────────────
            if !immediate_attempt {
                if let Some(max) = cfg.connection_options.max_reconnect_attempts {
                    if reconnect_attempts >= max {
                        log::warn!(
                            "[pylon-link] Max reconnection attempts ({}) reached, giving up",
                            max
                        );
                        cfg.event_handlers.emit_error(TransportError::new(
                            format!("Max reconnection attempts ({}) reached", max),
                            false,
                        ));
                        for result_tx in pending_connects.drain(..) {
                            let _ = result_tx.send(Err(PylonLinkError::ConnectionError(
                                "Max reconnection attempts reached".to_string(),
                            )));
                        }
                        want_connected = false;
                        resuming = false;
                        reconnect_attempts = 0;
                        set_state(&state, ConnectionState::Disconnected);
                        continue;
                    }
                }

                let attempt = reconnect_attempts;
                reconnect_attempts += 1;
                let delay = cfg.connection_options.backoff_delay_ms(attempt);
                log::info!(
                    "[pylon-link] Reconnecting in {}ms (attempt {})",
                    delay,
                    attempt + 1
                );
                set_state(
                    &state,
                    if resuming {
                        ConnectionState::Reconnecting
                    } else {
                        ConnectionState::Connecting
                    },
                );

                let sleep_fut = tokio::time::sleep(Duration::from_millis(delay));
                tokio::pin!(sleep_fut);

                loop {
                    tokio::select! {
                        biased;
                        cmd = cmd_rx.recv() => {
                            let Some(cmd) = cmd else {
                                shutdown_requested = true;
                                break;
                            };
                            match handle_cmd_offline(
                                cmd, &mut registry, &mut correlator,
                                &mut pending_connects, &state,
                            ) {
                                Flow::Continue => {}
                                Flow::Shutdown => {
                                    shutdown_requested = true;
                                    break;
                                }
                                Flow::WantConnect => {
                                    // An explicit connect or fresh
                                    // registration skips the rest of the wait.
                                    immediate_attempt = true;
                                    break;
                                }
                                Flow::CancelConnect => {
                                    want_connected = false;
                                    resuming = false;
                                    break;
                                }
                            }
                        }
                        _ = &mut sleep_fut => { break; }
                    }
                }

                if shutdown_requested || !want_connected {
                    continue;
                }
            }
            immediate_attempt = false;
            set_state(
                &state,
                if resuming {
                    ConnectionState::Reconnecting
                } else {
                    ConnectionState::Connecting
                },
            );

            let attempt_result = async {
                let gateway_url = resolve_gateway_url(
                    &cfg.http_client,
                    &cfg.base_url,
                    cfg.gateway_url.as_deref(),
                    cfg.api_key.as_deref(),
                    cfg.timeouts.lookup_timeout,
                )
                .await?;
                establish_ws(
                    &gateway_url,
                    cfg.api_key.as_deref(),
                    &cfg.timeouts,
                    &cfg.event_handlers,
                )
                .await
            }
            .await;

            match attempt_result {
                Ok(mut stream) => {
                    log::info!("[pylon-link] Connected to gateway");
                    reconnect_attempts = 0;
                    resuming = false;
                    set_state(&state, ConnectionState::Connected);
                    cfg.event_handlers.emit_connect();
                    for result_tx in pending_connects.drain(..) {
                        let _ = result_tx.send(Ok(()));
                    }

                    // Replay every surviving subscription, in creation order,
                    // before any queued command gets a chance to run.
                    let replay = registry.replay_frames();
                    if !replay.is_empty() {
                        log::info!(
                            "[pylon-link] Replaying {} subscription(s)",
                            replay.len()
                        );
                    }
                    let mut replay_failed = false;
                    for frame in replay {
                        if let Err(e) = send_frame(&mut stream, &frame, &cfg.event_handlers).await {
                            log::warn!("[pylon-link] Replay failed: {}", e);
                            replay_failed = true;
                            break;
                        }
                    }
                    if replay_failed {
                        note_transport_loss(
                            &mut registry, &mut correlator, &state,
                            &cfg.event_handlers, &cfg.connection_options,
                            &mut want_connected, &mut resuming,
                            DisconnectReason::new("Replay failed"),
                        );
                        continue;
                    }

                    ws_stream = Some(stream);
                    idle_deadline = TokioInstant::now() + keepalive_dur;
                    awaiting_pong = false;
                    pong_deadline = TokioInstant::now() + FAR_FUTURE;
                }
                Err(e) => {
                    log::warn!("[pylon-link] Connection attempt failed: {}", e);
                    for result_tx in pending_connects.drain(..) {
                        let _ = result_tx
                            .send(Err(PylonLinkError::ConnectionError(e.to_string())));
                    }
                    if !cfg.connection_options.auto_reconnect || registry.is_empty() {
                        // Nothing to resume and nobody waiting: go idle until
                        // the next explicit connect or registration.
                        want_connected = false;
                        resuming = false;
                        reconnect_attempts = 0;
                        set_state(&state, ConnectionState::Disconnected);
                    }
                }
            }
        } else {
            // ── Idle: no transport and none wanted ───────────────────────
            match cmd_rx.recv().await {
                None => shutdown_requested = true,
                Some(cmd) => match handle_cmd_offline(
                    cmd,
                    &mut registry,
                    &mut correlator,
                    &mut pending_connects,
                    &state,
                ) {
                    Flow::Continue => {}
                    Flow::Shutdown => shutdown_requested = true,
                    Flow::WantConnect => {
                        want_connected = true;
                        resuming = false;
                        immediate_attempt = true;
                        reconnect_attempts = 0;
                    }
                    Flow::CancelConnect => {
                        want_connected = false;
                    }
                },
            }
        }
    }
}
