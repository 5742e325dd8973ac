//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Upgrade request:
//!     → net::connection (session limit)
//!     → WebSocket max_message_size (frame limit)
//! Each inbound frame:
//!     → rate_limit.rs (per-connection token bucket)
//!     → relay fan-out
//! ```

pub mod rate_limit;

pub use rate_limit::MessageRateLimiter;
