//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware, shutdown)
//!     → websocket.rs (admission, upgrade, session loops)
//!     → relay subsystem (fan-out)
//! ```

pub mod server;
pub mod websocket;

pub use server::{AppState, RelayServer};
