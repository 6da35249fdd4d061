//! Shared test harness: an in-process mock Pylon gateway.
//!
//! The mock accepts WebSocket connections, records every inbound client
//! frame and, by default, acknowledges each `sub_on` with a `sub_ready`
//! whose subscription id is derived from the request id (`srv-{request_id}`)
//! so tests can predict it. Command frames are never auto-answered; tests
//! craft `met_res`/`met_fault` replies themselves.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use pylon_link::{ConnectionOptions, PylonLinkClient, PylonLinkTimeouts};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::protocol::Message;

pub struct MockGateway {
    url: String,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<Value>>,
    conn_tx: Arc<Mutex<Option<mpsc::UnboundedSender<Message>>>>,
    auto_ack: Arc<AtomicBool>,
    connections: Arc<AtomicU64>,
    accept_task: tokio::task::JoinHandle<()>,
}

impl Drop for MockGateway {
    // Dropping the gateway closes the listener, so reconnect attempts to its
    // address start failing immediately.
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

impl MockGateway {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock gateway");
        let addr = listener.local_addr().expect("local addr");
        let url = format!("ws://{}", addr);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let conn_tx: Arc<Mutex<Option<mpsc::UnboundedSender<Message>>>> =
            Arc::new(Mutex::new(None));
        let auto_ack = Arc::new(AtomicBool::new(true));
        let connections = Arc::new(AtomicU64::new(0));

        let conn_tx_accept = conn_tx.clone();
        let auto_ack_accept = auto_ack.clone();
        let connections_accept = connections.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                let Ok(ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                connections_accept.fetch_add(1, Ordering::SeqCst);

                let (mut sink, mut source) = ws.split();
                let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Message>();
                *conn_tx_accept.lock().await = Some(out_tx.clone());

                tokio::spawn(async move {
                    while let Some(msg) = out_rx.recv().await {
                        let closing = matches!(msg, Message::Close(_));
                        if sink.send(msg).await.is_err() || closing {
                            break;
                        }
                    }
                });

                // One client at a time: serve this connection to completion.
                while let Some(Ok(msg)) = source.next().await {
                    match msg {
                        Message::Text(text) => {
                            let frame: Value =
                                serde_json::from_str(&text).expect("client sent invalid JSON");
                            if auto_ack_accept.load(Ordering::SeqCst)
                                && frame["type"] == "sub_on"
                            {
                                let request_id = frame["request_id"].as_u64().unwrap();
                                let ack = serde_json::json!({
                                    "type": "sub_ready",
                                    "request_id": request_id,
                                    "subscription_id": format!("srv-{}", request_id),
                                });
                                let _ = out_tx.send(Message::Text(ack.to_string().into()));
                            }
                            let _ = inbound_tx.send(frame);
                        }
                        Message::Ping(payload) => {
                            let _ = out_tx.send(Message::Pong(payload));
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }
            }
        });

        Self {
            url,
            inbound_rx: Mutex::new(inbound_rx),
            conn_tx,
            auto_ack,
            connections,
            accept_task,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Stop acknowledging `sub_on` frames (subscriptions stay Pending).
    pub fn set_auto_ack(&self, enabled: bool) {
        self.auto_ack.store(enabled, Ordering::SeqCst);
    }

    /// Next recorded client frame; panics after 5s of silence.
    pub async fn recv_frame(&self) -> Value {
        let mut rx = self.inbound_rx.lock().await;
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for a client frame")
            .expect("mock gateway stopped")
    }

    /// Next recorded client frame within `window`, or `None`.
    pub async fn recv_frame_within(&self, window: Duration) -> Option<Value> {
        let mut rx = self.inbound_rx.lock().await;
        tokio::time::timeout(window, rx.recv()).await.ok().flatten()
    }

    /// Assert the client stays quiet for `window`.
    pub async fn assert_silence(&self, window: Duration) {
        if let Some(frame) = self.recv_frame_within(window).await {
            panic!("expected no client frame, got: {}", frame);
        }
    }

    /// Push one server frame to the currently connected client.
    pub async fn send(&self, frame: Value) {
        let guard = self.conn_tx.lock().await;
        let tx = guard.as_ref().expect("no client connected");
        tx.send(Message::Text(frame.to_string().into()))
            .expect("connection writer gone");
    }

    /// Close the current connection from the server side.
    pub async fn drop_connection(&self) {
        if let Some(tx) = self.conn_tx.lock().await.take() {
            let _ = tx.send(Message::Close(None));
        }
    }

    /// How many WebSocket connections the gateway has accepted so far.
    pub fn connection_count(&self) -> u64 {
        self.connections.load(Ordering::SeqCst)
    }

    /// Wait until the gateway has accepted `count` connections.
    pub async fn wait_for_connections(&self, count: u64) {
        wait_until(|| self.connection_count() >= count).await;
    }
}

/// Client wired to the mock gateway with test-friendly timing.
pub fn test_client(gateway: &MockGateway) -> PylonLinkClient {
    PylonLinkClient::builder()
        .gateway_url(gateway.url())
        .timeouts(PylonLinkTimeouts::fast())
        .connection_options(
            ConnectionOptions::new()
                .with_reconnect_delay_ms(10)
                .with_max_reconnect_delay_ms(100),
        )
        .build()
        .expect("build test client")
}

/// Wait until the client holds exactly `expected` subscriptions, all Ready.
pub async fn wait_all_ready(client: &PylonLinkClient, expected: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let subscriptions = client.active_subscriptions().await.unwrap();
        if subscriptions.len() == expected
            && subscriptions
                .iter()
                .all(|info| info.status == pylon_link::SubscriptionStatus::Ready)
        {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!(
                "expected {} ready subscriptions, have: {:?}",
                expected, subscriptions
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll `predicate` every 10ms until true; panics after 5s.
pub async fn wait_until(predicate: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !predicate() {
        if tokio::time::Instant::now() > deadline {
            panic!("condition not reached within 5s");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
