//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address, TLS, connection limit).
    pub listener: ListenerConfig,

    /// Broadcast endpoint settings.
    pub relay: RelaySettings,

    /// Room-based chat endpoint settings.
    pub chat: ChatConfig,

    /// Per-connection message rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Timeout configuration for plain HTTP routes.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent WebSocket sessions across all endpoints.
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// What to do with a client whose outbound queue is full.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlowConsumerPolicy {
    /// Skip this message for the slow client only.
    #[default]
    DropMessage,
    /// Close the slow client's connection.
    Disconnect,
}

/// Broadcast endpoint settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RelaySettings {
    /// Route the broadcast endpoint is mounted on.
    pub path: String,

    /// Deliver a client's own messages back to it.
    pub echo_to_sender: bool,

    /// Capacity of each client's outbound queue, in messages.
    pub send_queue_capacity: usize,

    /// Largest accepted WebSocket message in bytes.
    pub max_message_size: usize,

    /// Policy applied when a client's outbound queue is full.
    pub slow_consumer: SlowConsumerPolicy,

    /// Interval between server pings.
    pub ping_interval_secs: u64,

    /// Close a session after this long without any inbound frame.
    pub idle_timeout_secs: u64,

    /// Time allowed for flushing the close frame and draining sessions.
    pub close_timeout_secs: u64,
}

impl RelaySettings {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn close_timeout(&self) -> Duration {
        Duration::from_secs(self.close_timeout_secs)
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            path: "/ws".to_string(),
            echo_to_sender: false,
            send_queue_capacity: 256,
            max_message_size: 1024 * 1024, // 1MB
            slow_consumer: SlowConsumerPolicy::DropMessage,
            ping_interval_secs: 30,
            idle_timeout_secs: 300,
            close_timeout_secs: 5,
        }
    }
}

/// Room-based chat endpoint settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ChatConfig {
    /// Mount the chat endpoint.
    pub enabled: bool,

    /// Route the chat endpoint is mounted on.
    pub path: String,

    /// Name used when the join message carries no display name.
    pub default_display_name: String,

    /// Longest accepted room identifier, in bytes.
    pub max_room_id_len: usize,

    /// Time a new client has to send its join message.
    pub join_timeout_secs: u64,
}

impl ChatConfig {
    pub fn join_timeout(&self) -> Duration {
        Duration::from_secs(self.join_timeout_secs)
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/chat".to_string(),
            default_display_name: "Anonymous".to_string(),
            max_room_id_len: 128,
            join_timeout_secs: 10,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sustained inbound messages per second per connection.
    pub messages_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            messages_per_second: 50,
            burst_size: 100,
        }
    }
}

/// Timeout configuration for plain HTTP routes.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Full,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Placeholder shipped as the default admin key; rejected by validation.
pub const PLACEHOLDER_API_KEY: &str = "CHANGE_ME_IN_PRODUCTION";

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the admin routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: PLACEHOLDER_API_KEY.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: RelayConfig = toml::from_str("").unwrap();
        assert_eq!(config, RelayConfig::default());
        assert_eq!(config.relay.path, "/ws");
        assert!(!config.relay.echo_to_sender);
        assert_eq!(config.chat.default_display_name, "Anonymous");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: RelayConfig = toml::from_str(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [relay]
            echo_to_sender = true
            slow_consumer = "disconnect"

            [observability]
            log_format = "compact"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.listener.max_connections, 10_000);
        assert!(config.relay.echo_to_sender);
        assert_eq!(config.relay.slow_consumer, SlowConsumerPolicy::Disconnect);
        assert_eq!(config.relay.send_queue_capacity, 256);
        assert_eq!(config.observability.log_format, LogFormat::Compact);
    }

    #[test]
    fn unknown_policy_is_rejected() {
        let result: Result<RelayConfig, _> = toml::from_str(
            r#"
            [relay]
            slow_consumer = "block"
            "#,
        );
        assert!(result.is_err());
    }
}
