//! Reconnection behavior: backoff, replay order and lifecycle events.

mod common;

use common::{test_client, wait_until, MockGateway};
use pylon_link::{EventHandlers, PylonLinkClient, PylonLinkTimeouts, ConnectionOptions};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_subscriptions_replay_in_creation_order_after_loss() {
    let gateway = MockGateway::start().await;
    let client = test_client(&gateway);

    let chat = client.subscribe("chat").unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let sink = hits.clone();
    chat.add_message_listener(None, move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    let orders = client.table("orders").unwrap();
    orders.add_create_listener(Some("amount > 10"), |_| {}).unwrap();

    let mut first_ids = Vec::new();
    let mut first_names = Vec::new();
    for _ in 0..3 {
        let frame = gateway.recv_frame().await;
        first_ids.push(frame["request_id"].as_u64().unwrap());
        first_names.push(frame["name"].as_str().unwrap().to_string());
    }
    assert_eq!(first_names, vec!["connect:chat", "messages:chat", "create:orders"]);
    wait_until(|| chat.is_joined()).await;

    gateway.drop_connection().await;
    gateway.wait_for_connections(2).await;

    // Same feeds, same order, strictly fresher request ids.
    let mut replay_ids = Vec::new();
    let mut replay_names = Vec::new();
    let mut messages_id = String::new();
    for _ in 0..3 {
        let frame = gateway.recv_frame().await;
        let request_id = frame["request_id"].as_u64().unwrap();
        replay_ids.push(request_id);
        let name = frame["name"].as_str().unwrap().to_string();
        if name == "messages:chat" {
            messages_id = format!("srv-{}", request_id);
        }
        replay_names.push(name);
        assert_eq!(frame["type"], "sub_on");
    }
    assert_eq!(replay_names, first_names);
    assert!(replay_ids[0] > *first_ids.last().unwrap());
    assert!(replay_ids.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(
        replay_names[2], "create:orders",
        "where-clause feeds replay too"
    );

    wait_until(|| chat.is_joined()).await;

    // The resubscribed feed delivers events under its new server id.
    gateway
        .send(json!({
            "type": "sub_res",
            "subscription_id": messages_id,
            "payload": {"text": "back"},
        }))
        .await;
    wait_until(|| hits.load(Ordering::SeqCst) == 1).await;
}

#[tokio::test]
async fn test_reset_forces_a_clean_reconnect_cycle() {
    let gateway = MockGateway::start().await;
    let client = test_client(&gateway);
    let chat = client.subscribe("chat").unwrap();
    gateway.recv_frame().await;
    wait_until(|| chat.is_joined()).await;
    assert_eq!(gateway.connection_count(), 1);

    client.reset().await.unwrap();
    gateway.wait_for_connections(2).await;
    let replay = gateway.recv_frame().await;
    assert_eq!(replay["type"], "sub_on");
    assert_eq!(replay["name"], "connect:chat");
    wait_until(|| chat.is_joined()).await;
}

#[tokio::test]
async fn test_lifecycle_handlers_fire_across_reconnects() {
    let gateway = MockGateway::start().await;
    let connects = Arc::new(AtomicUsize::new(0));
    let disconnects = Arc::new(AtomicUsize::new(0));
    let c = connects.clone();
    let d = disconnects.clone();

    let client = PylonLinkClient::builder()
        .gateway_url(gateway.url())
        .timeouts(PylonLinkTimeouts::fast())
        .connection_options(ConnectionOptions::new().with_reconnect_delay_ms(10))
        .event_handlers(
            EventHandlers::new()
                .on_connect(move || {
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .on_disconnect(move |_| {
                    d.fetch_add(1, Ordering::SeqCst);
                }),
        )
        .build()
        .unwrap();

    client.connect().await.unwrap();
    wait_until(|| connects.load(Ordering::SeqCst) == 1).await;

    // Keep a subscription alive so the engine reconnects after the drop.
    let chat = client.subscribe("chat").unwrap();
    gateway.recv_frame().await;
    wait_until(|| chat.is_joined()).await;

    gateway.drop_connection().await;
    wait_until(|| disconnects.load(Ordering::SeqCst) >= 1).await;
    wait_until(|| connects.load(Ordering::SeqCst) >= 2).await;
    wait_until(|| chat.is_joined()).await;
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let gateway = MockGateway::start().await;
    let errors = Arc::new(AtomicUsize::new(0));
    let e = errors.clone();

    let client = PylonLinkClient::builder()
        .gateway_url(gateway.url())
        .timeouts(PylonLinkTimeouts::fast())
        .connection_options(
            ConnectionOptions::new()
                .with_reconnect_delay_ms(10)
                .with_max_reconnect_attempts(Some(2)),
        )
        .event_handlers(EventHandlers::new().on_error(move |error| {
            if !error.recoverable {
                e.fetch_add(1, Ordering::SeqCst);
            }
        }))
        .build()
        .unwrap();

    let chat = client.subscribe("chat").unwrap();
    gateway.recv_frame().await;
    wait_until(|| chat.is_joined()).await;

    // Kill the gateway for good so every retry fails.
    gateway.drop_connection().await;
    drop(gateway);
    wait_until(|| errors.load(Ordering::SeqCst) >= 1).await;
    wait_until(|| !client.is_connected()).await;
}
