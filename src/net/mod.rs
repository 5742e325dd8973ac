//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (bind configured address)
//!     → tls.rs (optional TLS handshake)
//!     → HTTP layer (upgrade request)
//!     → connection.rs (admission, identity, drain on shutdown)
//! ```
//!
//! # Design Decisions
//! - Session limit is checked before the WebSocket upgrade
//! - Each session holds a guard so a panicking handler still frees its slot
//! - TLS is optional and handled transparently

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
