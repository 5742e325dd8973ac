//! Handle to one live WebSocket session.

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Notify};

use crate::config::SlowConsumerPolicy;
use crate::net::ConnectionId;

/// Outcome of handing one message to one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Message is in the client's outbound queue.
    Queued,
    /// Queue was full; message skipped for this client.
    Dropped,
    /// Queue was full; client has been told to disconnect.
    Kicked,
    /// The session's writer is gone.
    Closed,
}

/// Cloneable handle to a session's outbound queue.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ConnectionId,
    peer: SocketAddr,
    display_name: Option<String>,
    connected_at: Instant,
    tx: mpsc::Sender<Message>,
    kick: Arc<Notify>,
    dropped: Arc<AtomicU64>,
}

impl ClientHandle {
    pub fn new(id: ConnectionId, peer: SocketAddr, tx: mpsc::Sender<Message>) -> Self {
        Self {
            id,
            peer,
            display_name: None,
            connected_at: Instant::now(),
            tx,
            kick: Arc::new(Notify::new()),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Messages skipped because this client's queue was full.
    pub fn dropped_messages(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Signal raised when the client must be disconnected.
    pub fn kicked(&self) -> Arc<Notify> {
        Arc::clone(&self.kick)
    }

    /// Enqueue without waiting. A full queue is resolved by `policy`.
    pub fn deliver(&self, msg: Message, policy: SlowConsumerPolicy) -> Delivery {
        match self.tx.try_send(msg) {
            Ok(()) => Delivery::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                match policy {
                    SlowConsumerPolicy::DropMessage => {
                        tracing::debug!(connection_id = %self.id, "Outbound queue full, message dropped");
                        Delivery::Dropped
                    }
                    SlowConsumerPolicy::Disconnect => {
                        tracing::warn!(connection_id = %self.id, peer = %self.peer, "Outbound queue full, disconnecting slow consumer");
                        self.kick.notify_one();
                        Delivery::Kicked
                    }
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Delivery::Closed,
        }
    }

    /// Queue a close frame behind any pending messages.
    ///
    /// Returns `false` if the queue is full or the writer is gone.
    pub fn close(&self, code: u16, reason: &'static str) -> bool {
        let frame = CloseFrame {
            code,
            reason: Utf8Bytes::from_static(reason),
        };
        self.tx.try_send(Message::Close(Some(frame))).is_ok()
    }

    pub fn info(&self) -> ClientInfo {
        ClientInfo {
            id: self.id.as_u64(),
            peer: self.peer.to_string(),
            display_name: self.display_name.clone(),
            connected_secs: self.connected_at.elapsed().as_secs(),
            dropped_messages: self.dropped_messages(),
        }
    }
}

/// Snapshot of a client for the admin API.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ClientInfo {
    pub id: u64,
    pub peer: String,
    pub display_name: Option<String>,
    pub connected_secs: u64,
    pub dropped_messages: u64,
}
