//! Shared utilities for integration testing.

#![allow(dead_code)]

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use ws_relay::relay::{Hub, RoomRegistry};
use ws_relay::{RelayConfig, RelayServer, Shutdown};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

/// A relay running on an ephemeral port.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub hub: Arc<Hub>,
    pub rooms: Arc<RoomRegistry>,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<RelayConfig>,
    pub server: tokio::task::JoinHandle<Result<(), std::io::Error>>,
}

impl TestRelay {
    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }

    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Config suitable for tests: loopback bind, short close timeout.
pub fn test_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.relay.close_timeout_secs = 2;
    config
}

pub async fn start_relay(config: RelayConfig) -> TestRelay {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = RelayServer::new(config);
    let hub = server.hub();
    let rooms = server.rooms();
    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    let server = tokio::spawn(async move { server.run(listener, updates_rx, server_shutdown).await });

    TestRelay {
        addr,
        hub,
        rooms,
        shutdown,
        config_updates,
        server,
    }
}

pub async fn connect(url: &str) -> Client {
    let (socket, _) = tokio::time::timeout(WAIT, connect_async(url))
        .await
        .expect("connect timed out")
        .expect("connect failed");
    socket
}

/// Poll `condition` until it holds or the wait budget runs out.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT;
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not met in time");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Next Text or Binary frame, skipping control frames.
pub async fn next_data(client: &mut Client) -> Message {
    loop {
        let msg = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("no frame in time")
            .expect("stream ended")
            .expect("read error");
        match msg {
            Message::Ping(_) | Message::Pong(_) => continue,
            other => return other,
        }
    }
}

pub async fn next_text(client: &mut Client) -> String {
    match next_data(client).await {
        Message::Text(text) => text.as_str().to_string(),
        other => panic!("expected text frame, got {other:?}"),
    }
}

pub async fn next_json(client: &mut Client) -> serde_json::Value {
    serde_json::from_str(&next_text(client).await).expect("frame is not JSON")
}

/// Assert nothing but control frames arrive within `window`.
pub async fn assert_silent(client: &mut Client, window: Duration) {
    let deadline = tokio::time::Instant::now() + window;
    loop {
        match tokio::time::timeout_at(deadline, client.next()).await {
            Err(_) => return,
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => continue,
            Ok(other) => panic!("expected silence, got {other:?}"),
        }
    }
}

/// Read until the server's close frame and return its code.
pub async fn expect_close(client: &mut Client) -> u16 {
    loop {
        let msg = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("no close in time");
        match msg {
            Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
            Some(Ok(Message::Close(None))) | None => panic!("closed without a close code"),
            Some(Ok(_)) => continue,
            Some(Err(e)) => panic!("read error before close: {e}"),
        }
    }
}

pub async fn send_text(client: &mut Client, text: &str) {
    client.send(Message::text(text.to_string())).await.unwrap();
}
