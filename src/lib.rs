//! WebSocket Broadcast Relay Library

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod relay;
pub mod security;

pub use config::schema::RelayConfig;
pub use error::RelayError;
pub use http::RelayServer;
pub use lifecycle::Shutdown;
