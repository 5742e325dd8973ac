//! Admin API over HTTP.

use std::time::Duration;

mod common;

use common::*;

const KEY: &str = "test-admin-key";

fn admin_config() -> ws_relay::RelayConfig {
    let mut config = test_config();
    config.admin.enabled = true;
    config.admin.api_key = KEY.into();
    config
}

fn http() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

#[tokio::test]
async fn rejects_missing_or_wrong_key() {
    let relay = start_relay(admin_config()).await;
    let client = http();

    let res = client.get(relay.http_url("/admin/status")).send().await.unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(relay.http_url("/admin/status"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    relay.shutdown.trigger();
}

#[tokio::test]
async fn reports_clients_and_rooms() {
    let relay = start_relay(admin_config()).await;
    let client = http();

    let _a = connect(&relay.ws_url("/ws")).await;
    let _b = connect(&relay.ws_url("/ws")).await;
    let mut chat = connect(&relay.ws_url("/chat")).await;
    send_text(&mut chat, r#"{"room_id":"lobby","displayName":"ada"}"#).await;
    next_json(&mut chat).await;
    wait_until(|| relay.hub.len() == 2).await;

    let status: serde_json::Value = client
        .get(relay.http_url("/admin/status"))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["status"], "operational");
    assert_eq!(status["active_connections"], 3);
    assert_eq!(status["relay_clients"], 2);
    assert_eq!(status["chat_clients"], 1);
    assert_eq!(status["rooms"], 1);

    let clients: Vec<serde_json::Value> = client
        .get(relay.http_url("/admin/clients"))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(clients.len(), 2);
    assert!(clients.iter().all(|c| c["peer"].as_str().unwrap().starts_with("127.0.0.1:")));

    let rooms: serde_json::Value = client
        .get(relay.http_url("/admin/rooms"))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(rooms, serde_json::json!([{"room_id": "lobby", "members": 1}]));

    relay.shutdown.trigger();
}

#[tokio::test]
async fn admin_routes_absent_when_disabled() {
    let relay = start_relay(test_config()).await;

    let res = http()
        .get(relay.http_url("/admin/status"))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    relay.shutdown.trigger();
}
