//! Reference-counted teardown rules: SUB_OFF timing, pending releases and
//! bulk removal scoping.

mod common;

use common::{test_client, wait_all_ready, wait_until, MockGateway};
use serde_json::Value;
use std::time::Duration;

async fn join_channel(gateway: &MockGateway) -> (pylon_link::PylonLinkClient, pylon_link::Channel) {
    let client = test_client(gateway);
    let chat = client.subscribe("chat").unwrap();
    gateway.recv_frame().await; // join feed
    wait_until(|| chat.is_joined()).await;
    (client, chat)
}

#[tokio::test]
async fn test_sub_off_fires_on_last_listener_only() {
    let gateway = MockGateway::start().await;
    let (_client, chat) = join_channel(&gateway).await;

    let first = chat.add_message_listener(None, |_| {}).unwrap();
    let sub_on = gateway.recv_frame().await;
    let subscription_id = format!("srv-{}", sub_on["request_id"].as_u64().unwrap());
    let second = chat.add_message_listener(None, |_| {}).unwrap();
    wait_all_ready(&_client, 2).await;

    chat.remove_listener(&first).unwrap();
    gateway.assert_silence(Duration::from_millis(200)).await;

    chat.remove_listener(&second).unwrap();
    let sub_off = gateway.recv_frame().await;
    assert_eq!(sub_off["type"], "sub_off");
    assert_eq!(sub_off["subscription_id"], Value::String(subscription_id));
}

#[tokio::test]
async fn test_removing_a_pending_subscription_sends_no_sub_off() {
    let gateway = MockGateway::start().await;
    gateway.set_auto_ack(false);
    let client = test_client(&gateway);
    let chat = client.subscribe("chat").unwrap();
    gateway.recv_frame().await; // join feed, pending

    let handle = chat.add_message_listener(None, |_| {}).unwrap();
    gateway.recv_frame().await; // the messages sub_on, never acknowledged

    chat.remove_listener(&handle).unwrap();
    gateway.assert_silence(Duration::from_millis(200)).await;

    // Removing it again is a benign no-op.
    chat.remove_listener(&handle).unwrap();
    gateway.assert_silence(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_remove_listeners_is_selector_scoped() {
    let gateway = MockGateway::start().await;
    let (_client, chat) = join_channel(&gateway).await;

    chat.add_message_listener(Some("room = 'eu'"), |_| {}).unwrap();
    let eu = gateway.recv_frame().await;
    let eu_id = format!("srv-{}", eu["request_id"].as_u64().unwrap());
    chat.add_message_listener(Some("room = 'us'"), |_| {}).unwrap();
    gateway.recv_frame().await;
    wait_all_ready(&_client, 3).await;

    // Normalization applies to removal too.
    chat.remove_message_listeners(Some(" room = 'eu' ")).unwrap();
    let sub_off = gateway.recv_frame().await;
    assert_eq!(sub_off["type"], "sub_off");
    assert_eq!(sub_off["subscription_id"], Value::String(eu_id));

    // The us-selector subscription is untouched.
    gateway.assert_silence(Duration::from_millis(200)).await;
}

#[tokio::test]
async fn test_remove_all_listeners_spares_the_join_feed() {
    let gateway = MockGateway::start().await;
    let (client, chat) = join_channel(&gateway).await;

    chat.add_message_listener(None, |_| {}).unwrap();
    gateway.recv_frame().await;
    chat.add_command_listener(None, |_| {}).unwrap();
    gateway.recv_frame().await;
    wait_all_ready(&client, 3).await;

    chat.remove_all_listeners().unwrap();
    let first_off = gateway.recv_frame().await;
    let second_off = gateway.recv_frame().await;
    assert_eq!(first_off["type"], "sub_off");
    assert_eq!(second_off["type"], "sub_off");

    assert!(chat.is_joined());
    let subscriptions = client.active_subscriptions().await.unwrap();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].kind, pylon_link::SubscriptionKind::Connect);
    assert_eq!(subscriptions[0].target, "chat");
}

#[tokio::test]
async fn test_active_subscriptions_snapshot() {
    let gateway = MockGateway::start().await;
    let (client, chat) = join_channel(&gateway).await;

    chat.add_message_listener(Some("room = 'eu'"), |_| {}).unwrap();
    gateway.recv_frame().await;
    chat.add_message_listener(Some("room = 'eu'"), |_| {}).unwrap();

    wait_all_ready(&client, 2).await;
    let subscriptions = client.active_subscriptions().await.unwrap();
    assert_eq!(subscriptions.len(), 2);
    let messages = subscriptions
        .iter()
        .find(|info| info.kind == pylon_link::SubscriptionKind::Messages)
        .unwrap();
    assert_eq!(messages.filter.as_deref(), Some("room = 'eu'"));
    assert_eq!(messages.listener_count, 2);
    assert!(messages.subscription_id.is_some());
}
