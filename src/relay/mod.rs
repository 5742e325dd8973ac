//! Message relay subsystem.
//!
//! # Data Flow
//! ```text
//! session read loop
//!     → hub.rs      (global set: every other client)      [relay endpoint]
//!     → rooms.rs    (room_id → hub: every room member)    [chat endpoint]
//!     → client.rs   (bounded per-client queue, slow-consumer policy)
//!     → session writer task → socket
//! ```
//!
//! # Design Decisions
//! - Fan-out is synchronous and non-blocking; only writer tasks touch sockets
//! - Per-sender order is preserved at every receiver; no global order
//! - Relay payloads are forwarded unmodified; chat frames use protocol.rs

pub mod client;
pub mod hub;
pub mod protocol;
pub mod rooms;

pub use client::{ClientHandle, ClientInfo, Delivery};
pub use hub::{BroadcastReport, Hub};
pub use protocol::{ChatEvent, ChatInput, JoinRequest};
pub use rooms::{RoomInfo, RoomRegistry};
