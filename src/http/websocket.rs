//! WebSocket session handling.
//!
//! # Responsibilities
//! - Admit or refuse upgrade requests against the session limit
//! - Run one read loop and one writer task per connection
//! - Feed relay frames to the global hub and chat frames to rooms
//! - Close sessions on idle timeout, slow-consumer kick, or shutdown
//!
//! # Data Flow
//! ```text
//! socket ──read loop──▶ hub / rooms ──▶ per-client queue ──writer task──▶ socket
//! ```

use axum::{
    body::Bytes,
    extract::{
        ws::{close_code, CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::{ChatConfig, RelayConfig, SlowConsumerPolicy};
use crate::http::server::AppState;
use crate::net::{ConnectionGuard, ConnectionId, ConnectionTracker};
use crate::observability::metrics;
use crate::relay::protocol::{unix_timestamp, ChatEvent, ChatInput, JoinRequest};
use crate::relay::ClientHandle;
use crate::security::MessageRateLimiter;

const RELAY_ENDPOINT: &str = "relay";
const CHAT_ENDPOINT: &str = "chat";

/// Close frame sent when the server ends a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Close {
    code: u16,
    reason: &'static str,
    /// Skip whatever is still queued and send the close frame next.
    urgent: bool,
}

impl Close {
    const fn new(code: u16, reason: &'static str, urgent: bool) -> Self {
        Self { code, reason, urgent }
    }

    fn frame(self) -> CloseFrame {
        CloseFrame {
            code: self.code,
            reason: Utf8Bytes::from_static(self.reason),
        }
    }
}

const CLOSE_SHUTDOWN: Close = Close::new(close_code::AWAY, "server shutting down", true);
const CLOSE_SLOW_CONSUMER: Close = Close::new(close_code::POLICY, "slow consumer", true);
const CLOSE_IDLE: Close = Close::new(close_code::NORMAL, "idle timeout", false);
const CLOSE_BAD_JOIN: Close = Close::new(close_code::POLICY, "invalid join message", false);
const CLOSE_JOIN_TIMEOUT: Close = Close::new(close_code::POLICY, "join timeout", false);

/// An accepted upgrade: its session slot and its shutdown subscription.
struct Admission {
    guard: ConnectionGuard,
    shutdown: broadcast::Receiver<()>,
}

/// Reserve a session slot, or refuse the upgrade.
fn admit(state: &AppState, config: &RelayConfig, peer: SocketAddr) -> Result<Admission, Response> {
    // Subscribed before the flag check so a trigger in between is still received.
    let shutdown = state.shutdown.subscribe();
    if state.shutdown.is_triggered() {
        tracing::debug!(peer = %peer, "Shutting down, refusing upgrade");
        metrics::record_connection_rejected();
        return Err((StatusCode::SERVICE_UNAVAILABLE, "Server shutting down").into_response());
    }

    let guard = state
        .tracker
        .try_track(config.listener.max_connections)
        .ok_or_else(|| {
            tracing::warn!(
                peer = %peer,
                max_connections = config.listener.max_connections,
                "Connection limit reached, refusing upgrade"
            );
            metrics::record_connection_rejected();
            (StatusCode::SERVICE_UNAVAILABLE, "Connection limit reached").into_response()
        })?;

    Ok(Admission { guard, shutdown })
}

/// Upgrade handler for the broadcast endpoint.
pub async fn relay_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    let config = state.config.load_full();
    let admission = match admit(&state, &config, peer) {
        Ok(admission) => admission,
        Err(response) => return response,
    };
    let span = tracing::info_span!("relay_session", connection_id = %admission.guard.id(), peer = %peer);

    ws.max_message_size(config.relay.max_message_size)
        .on_upgrade(move |socket| relay_session(socket, state, config, admission, peer).instrument(span))
}

/// Upgrade handler for the room-based chat endpoint.
pub async fn chat_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    let config = state.config.load_full();
    let admission = match admit(&state, &config, peer) {
        Ok(admission) => admission,
        Err(response) => return response,
    };
    let span = tracing::info_span!("chat_session", connection_id = %admission.guard.id(), peer = %peer);

    ws.max_message_size(config.relay.max_message_size)
        .on_upgrade(move |socket| chat_session(socket, state, config, admission, peer).instrument(span))
}

async fn relay_session(
    socket: WebSocket,
    state: AppState,
    config: Arc<RelayConfig>,
    admission: Admission,
    peer: SocketAddr,
) {
    let mut session = Session::open(socket, &state, &config, admission, peer, RELAY_ENDPOINT);
    let clients = state.hub.join(session.handle.clone());
    tracing::info!(clients, "Relay client connected");

    let close = loop {
        match session.next_frame().await {
            Next::Frame(msg) => {
                metrics::record_message_received(RELAY_ENDPOINT);
                if !session.limiter.check() {
                    tracing::debug!("Rate limit exceeded, frame dropped");
                    metrics::record_dropped("rate_limited", 1);
                    continue;
                }

                let live = state.config.load();
                let report = state.hub.broadcast(
                    Some(session.id),
                    &msg,
                    live.relay.echo_to_sender,
                    live.relay.slow_consumer,
                );
                metrics::record_fanout(RELAY_ENDPOINT, report.delivered, report.dropped);
            }
            Next::End(close) => break close,
        }
    };

    state.hub.leave(session.id);
    tracing::info!(clients = state.hub.len(), "Relay client disconnected");
    session.finish(close).await;
}

async fn chat_session(
    socket: WebSocket,
    state: AppState,
    config: Arc<RelayConfig>,
    admission: Admission,
    peer: SocketAddr,
) {
    let mut session = Session::open(socket, &state, &config, admission, peer, CHAT_ENDPOINT);

    let (room_id, display_name) = match session.await_join(&config.chat).await {
        Ok(joined) => joined,
        Err(close) => {
            session.finish(close).await;
            return;
        }
    };

    let handle = session.handle.clone().with_display_name(display_name.clone());
    let members = state.rooms.join(&room_id, handle);
    metrics::record_rooms(state.rooms.room_count());
    tracing::info!(room_id = %room_id, display_name = %display_name, members, "Chat client joined room");

    broadcast_event(
        &state,
        &room_id,
        &ChatEvent::UserJoined {
            room_id: room_id.clone(),
            display_name: display_name.clone(),
            timestamp: unix_timestamp(),
        },
    );

    let close = loop {
        match session.next_frame().await {
            Next::Frame(Message::Text(text)) => {
                metrics::record_message_received(CHAT_ENDPOINT);
                if !session.limiter.check() {
                    metrics::record_dropped("rate_limited", 1);
                    session.send_event(&ChatEvent::error("rate limit exceeded"));
                    continue;
                }

                match serde_json::from_str::<ChatInput>(text.as_str()) {
                    Ok(input) => {
                        if let Some(message) = input.text() {
                            tracing::debug!(room_id = %room_id, "Chat message received");
                            broadcast_event(
                                &state,
                                &room_id,
                                &ChatEvent::NewMessage {
                                    room_id: room_id.clone(),
                                    display_name: display_name.clone(),
                                    message: message.to_string(),
                                    timestamp: unix_timestamp(),
                                },
                            );
                        }
                    }
                    Err(e) => {
                        tracing::warn!(room_id = %room_id, error = %e, "Received malformed JSON from chat client");
                    }
                }
            }
            Next::Frame(_) => {
                tracing::debug!(room_id = %room_id, "Ignoring binary frame on chat endpoint");
            }
            Next::End(close) => break close,
        }
    };

    let remaining = state.rooms.leave(&room_id, session.id);
    metrics::record_rooms(state.rooms.room_count());
    tracing::info!(room_id = %room_id, display_name = %display_name, remaining, "Chat client left room");

    if remaining > 0 {
        broadcast_event(
            &state,
            &room_id,
            &ChatEvent::UserLeft {
                room_id: room_id.clone(),
                display_name,
                timestamp: unix_timestamp(),
            },
        );
    }

    session.finish(close).await;
}

fn broadcast_event(state: &AppState, room_id: &str, event: &ChatEvent) {
    let msg = match event.to_message() {
        Ok(msg) => msg,
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode chat event");
            return;
        }
    };
    let policy = state.config.load().relay.slow_consumer;
    let report = state.rooms.broadcast(room_id, &msg, policy);
    metrics::record_fanout(CHAT_ENDPOINT, report.delivered, report.dropped);
}

/// What the read loop saw next.
enum Next {
    /// A Text or Binary frame.
    Frame(Message),
    /// The session is over; `Some` carries the close frame to send.
    End(Option<Close>),
}

/// Per-connection state shared by both endpoints.
struct Session {
    id: ConnectionId,
    endpoint: &'static str,
    handle: ClientHandle,
    kick: Arc<Notify>,
    stream: SplitStream<WebSocket>,
    writer: JoinHandle<()>,
    close_tx: oneshot::Sender<CloseFrame>,
    shutdown: broadcast::Receiver<()>,
    limiter: MessageRateLimiter,
    idle_timeout: Duration,
    close_timeout: Duration,
    opened_at: Instant,
    tracker: ConnectionTracker,
    guard: ConnectionGuard,
}

impl Session {
    fn open(
        socket: WebSocket,
        state: &AppState,
        config: &RelayConfig,
        admission: Admission,
        peer: SocketAddr,
        endpoint: &'static str,
    ) -> Self {
        let Admission { guard, shutdown } = admission;
        let id = guard.id();
        let (sink, stream) = socket.split();
        let (tx, rx) = mpsc::channel(config.relay.send_queue_capacity);
        let (close_tx, close_rx) = oneshot::channel();
        let handle = ClientHandle::new(id, peer, tx);
        let writer =
            tokio::spawn(write_pump(sink, rx, close_rx, config.relay.ping_interval()).in_current_span());

        metrics::record_connection_opened(endpoint, state.tracker.active_count());

        Self {
            id,
            endpoint,
            kick: handle.kicked(),
            handle,
            stream,
            writer,
            close_tx,
            shutdown,
            limiter: MessageRateLimiter::new(&config.rate_limit),
            idle_timeout: config.relay.idle_timeout(),
            close_timeout: config.relay.close_timeout(),
            opened_at: Instant::now(),
            tracker: state.tracker.clone(),
            guard,
        }
    }

    /// Wait for the next Text or Binary frame.
    ///
    /// Ping and Pong frames count as activity but are not returned.
    async fn next_frame(&mut self) -> Next {
        loop {
            let idle = tokio::time::sleep(self.idle_timeout);
            tokio::select! {
                _ = self.shutdown.recv() => return Next::End(Some(CLOSE_SHUTDOWN)),
                _ = self.kick.notified() => return Next::End(Some(CLOSE_SLOW_CONSUMER)),
                _ = idle => {
                    tracing::info!(idle_secs = self.idle_timeout.as_secs(), "Closing idle connection");
                    return Next::End(Some(CLOSE_IDLE));
                }
                frame = self.stream.next() => match frame {
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                    Some(Ok(Message::Close(frame))) => {
                        tracing::debug!(close_frame = ?frame, "Client closed connection");
                        return Next::End(None);
                    }
                    Some(Ok(msg)) => return Next::Frame(msg),
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "WebSocket read error");
                        return Next::End(None);
                    }
                    None => return Next::End(None),
                },
            }
        }
    }

    /// Read and check the chat join frame.
    async fn await_join(&mut self, chat: &ChatConfig) -> Result<(String, String), Option<Close>> {
        let frame = match tokio::time::timeout(chat.join_timeout(), self.next_frame()).await {
            Ok(Next::Frame(frame)) => frame,
            Ok(Next::End(close)) => return Err(close),
            Err(_) => {
                tracing::info!("Chat client did not join in time");
                return Err(Some(CLOSE_JOIN_TIMEOUT));
            }
        };

        let join = match &frame {
            Message::Text(text) => serde_json::from_str::<JoinRequest>(text.as_str()).ok(),
            _ => None,
        };
        let Some(join) = join else {
            tracing::warn!("Chat join message is not valid JSON");
            self.send_event(&ChatEvent::error("invalid join message"));
            return Err(Some(CLOSE_BAD_JOIN));
        };

        let room_id = join.room_id.as_deref().map(str::trim).unwrap_or_default();
        if room_id.is_empty() {
            tracing::warn!("Chat join message missing room_id");
            self.send_event(&ChatEvent::error("room_id is required."));
            return Err(Some(CLOSE_BAD_JOIN));
        }
        if room_id.len() > chat.max_room_id_len {
            tracing::warn!(len = room_id.len(), max = chat.max_room_id_len, "Chat room_id too long");
            self.send_event(&ChatEvent::error("room_id is too long."));
            return Err(Some(CLOSE_BAD_JOIN));
        }

        let display_name = join
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| chat.default_display_name.clone());

        Ok((room_id.to_string(), display_name))
    }

    /// Send an event to this client only.
    fn send_event(&self, event: &ChatEvent) {
        match event.to_message() {
            Ok(msg) => {
                self.handle.deliver(msg, SlowConsumerPolicy::DropMessage);
            }
            Err(e) => tracing::error!(error = %e, "Failed to encode chat event"),
        }
    }

    /// Send the close frame, flush the writer, and release the slot.
    ///
    /// Urgent closes, and closes that find the queue full, go ahead of any
    /// queued messages, which are then discarded.
    async fn finish(self, close: Option<Close>) {
        let Session {
            endpoint,
            handle,
            writer,
            close_tx,
            close_timeout,
            opened_at,
            tracker,
            guard,
            ..
        } = self;

        match close {
            Some(close) if !close.urgent && handle.close(close.code, close.reason) => drop(close_tx),
            Some(close) => {
                if !close.urgent {
                    tracing::debug!("Outbound queue full, sending close frame ahead of it");
                }
                let _ = close_tx.send(close.frame());
            }
            None => drop(close_tx),
        }
        drop(handle);

        let abort = writer.abort_handle();
        if tokio::time::timeout(close_timeout, writer).await.is_err() {
            tracing::warn!("Writer did not finish in time, aborting");
            abort.abort();
        }

        drop(guard);
        metrics::record_connection_closed(endpoint, opened_at, tracker.active_count());
        tracing::debug!(duration_secs = opened_at.elapsed().as_secs(), "Session finished");
    }
}

/// Drain the client's queue to the socket and keep the connection alive with pings.
///
/// A frame on `close_rx` is sent before anything still queued.
async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Message>,
    mut close_rx: oneshot::Receiver<CloseFrame>,
    ping_interval: Duration,
) {
    let start = tokio::time::Instant::now() + ping_interval;
    let mut ping = tokio::time::interval_at(start, ping_interval);
    let mut close_pending = true;

    loop {
        tokio::select! {
            biased;
            frame = &mut close_rx, if close_pending => match frame {
                Ok(frame) => {
                    tracing::debug!(code = frame.code, "Sending close frame ahead of queued messages");
                    if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                        tracing::debug!(error = %e, "Failed to send close frame");
                    }
                    break;
                }
                // Session ended without a close of its own; flush the queue.
                Err(_) => close_pending = false,
            },
            msg = rx.recv() => match msg {
                Some(msg) => {
                    let closing = matches!(msg, Message::Close(_));
                    if let Err(e) = sink.send(msg).await {
                        tracing::debug!(error = %e, "WebSocket write error");
                        break;
                    }
                    if closing {
                        break;
                    }
                }
                None => break,
            },
            _ = ping.tick() => {
                if let Err(e) = sink.send(Message::Ping(Bytes::new())).await {
                    tracing::debug!(error = %e, "Ping failed");
                    break;
                }
            }
        }
    }

    // Flushes any pending close handshake reply.
    let _ = sink.close().await;
}
