//! Room-based chat endpoint behaviour over real sockets.

use futures_util::SinkExt;
use serde_json::json;
use std::time::Duration;

mod common;

use common::*;

async fn join(relay: &TestRelay, room: &str, name: &str) -> Client {
    let mut client = connect(&relay.ws_url("/chat")).await;
    send_text(&mut client, &json!({"room_id": room, "displayName": name}).to_string()).await;
    client
}

#[tokio::test]
async fn join_message_and_leave_are_announced() {
    let relay = start_relay(test_config()).await;

    let mut ada = join(&relay, "lobby", "ada").await;
    let joined = next_json(&mut ada).await;
    assert_eq!(joined["type"], "user_joined");
    assert_eq!(joined["room_id"], "lobby");
    assert_eq!(joined["displayName"], "ada");
    assert!(joined["timestamp"].as_u64().unwrap() > 0);

    let mut bob = join(&relay, "lobby", "bob").await;
    assert_eq!(next_json(&mut bob).await["displayName"], "bob");
    assert_eq!(next_json(&mut ada).await["displayName"], "bob");

    send_text(&mut ada, r#"{"message":"hi bob"}"#).await;
    for client in [&mut ada, &mut bob] {
        let event = next_json(client).await;
        assert_eq!(event["type"], "new_message");
        assert_eq!(event["displayName"], "ada");
        assert_eq!(event["message"], "hi bob");
    }

    bob.close(None).await.unwrap();
    let left = next_json(&mut ada).await;
    assert_eq!(left["type"], "user_left");
    assert_eq!(left["displayName"], "bob");
    assert_eq!(relay.rooms.members("lobby"), 1);

    relay.shutdown.trigger();
}

#[tokio::test]
async fn rooms_are_isolated() {
    let relay = start_relay(test_config()).await;

    let mut red = join(&relay, "red", "r").await;
    next_json(&mut red).await;
    let mut blue = join(&relay, "blue", "b").await;
    next_json(&mut blue).await;

    send_text(&mut red, r#"{"message":"red only"}"#).await;
    assert_eq!(next_json(&mut red).await["message"], "red only");
    assert_silent(&mut blue, Duration::from_millis(200)).await;

    relay.shutdown.trigger();
}

#[tokio::test]
async fn missing_room_id_is_rejected() {
    let relay = start_relay(test_config()).await;

    let mut client = connect(&relay.ws_url("/chat")).await;
    send_text(&mut client, r#"{"displayName":"nobody"}"#).await;

    let error = next_json(&mut client).await;
    assert_eq!(error, json!({"type": "error", "message": "room_id is required."}));
    assert_eq!(expect_close(&mut client).await, 1008);
    assert_eq!(relay.rooms.room_count(), 0);

    relay.shutdown.trigger();
}

#[tokio::test]
async fn overlong_room_id_is_rejected() {
    let mut config = test_config();
    config.chat.max_room_id_len = 8;
    let relay = start_relay(config).await;

    let mut client = join(&relay, "a-room-name-far-too-long", "ada").await;

    let error = next_json(&mut client).await;
    assert_eq!(error, json!({"type": "error", "message": "room_id is too long."}));
    assert_eq!(expect_close(&mut client).await, 1008);
    assert_eq!(relay.rooms.room_count(), 0);

    relay.shutdown.trigger();
}

#[tokio::test]
async fn silent_client_is_closed_after_join_timeout() {
    let mut config = test_config();
    config.chat.join_timeout_secs = 1;
    let relay = start_relay(config).await;

    let mut client = connect(&relay.ws_url("/chat")).await;
    assert_eq!(expect_close(&mut client).await, 1008);
    assert_eq!(relay.rooms.room_count(), 0);

    relay.shutdown.trigger();
}

#[tokio::test]
async fn rate_limited_chat_message_gets_error_event() {
    let mut config = test_config();
    config.rate_limit.enabled = true;
    config.rate_limit.messages_per_second = 1;
    config.rate_limit.burst_size = 1;
    let relay = start_relay(config).await;

    let mut ada = join(&relay, "lobby", "ada").await;
    assert_eq!(next_json(&mut ada).await["type"], "user_joined");

    send_text(&mut ada, r#"{"message":"first"}"#).await;
    send_text(&mut ada, r#"{"message":"second"}"#).await;

    let first = next_json(&mut ada).await;
    assert_eq!(first["type"], "new_message");
    assert_eq!(first["message"], "first");
    assert_eq!(
        next_json(&mut ada).await,
        json!({"type": "error", "message": "rate limit exceeded"})
    );

    relay.shutdown.trigger();
}

#[tokio::test]
async fn malformed_join_is_rejected() {
    let relay = start_relay(test_config()).await;

    let mut client = connect(&relay.ws_url("/chat")).await;
    send_text(&mut client, "not json").await;

    assert_eq!(next_json(&mut client).await["type"], "error");
    assert_eq!(expect_close(&mut client).await, 1008);

    relay.shutdown.trigger();
}

#[tokio::test]
async fn display_name_defaults_to_anonymous() {
    let relay = start_relay(test_config()).await;

    let mut client = connect(&relay.ws_url("/chat")).await;
    send_text(&mut client, r#"{"room_id":"quiet"}"#).await;
    assert_eq!(next_json(&mut client).await["displayName"], "Anonymous");

    relay.shutdown.trigger();
}

#[tokio::test]
async fn malformed_chat_message_is_ignored() {
    let relay = start_relay(test_config()).await;

    let mut ada = join(&relay, "lobby", "ada").await;
    next_json(&mut ada).await;

    send_text(&mut ada, "{oops").await;
    send_text(&mut ada, r#"{"message":""}"#).await;
    send_text(&mut ada, r#"{"message":"still here"}"#).await;

    assert_eq!(next_json(&mut ada).await["message"], "still here");

    relay.shutdown.trigger();
}

#[tokio::test]
async fn empty_room_is_removed() {
    let relay = start_relay(test_config()).await;

    let mut ada = join(&relay, "ephemeral", "ada").await;
    next_json(&mut ada).await;
    assert_eq!(relay.rooms.room_count(), 1);

    ada.close(None).await.unwrap();
    wait_until(|| relay.rooms.room_count() == 0).await;

    relay.shutdown.trigger();
}

#[tokio::test]
async fn chat_endpoint_can_be_disabled() {
    let mut config = test_config();
    config.chat.enabled = false;
    let relay = start_relay(config).await;

    assert!(tokio_tungstenite::connect_async(relay.ws_url("/chat")).await.is_err());

    relay.shutdown.trigger();
}
