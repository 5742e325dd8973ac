//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, limits > 0, addresses parse)
//! - Detect conflicting routes
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::{RelayConfig, PLACEHOLDER_API_KEY};

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address {value:?}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: must be greater than zero")]
    MustBePositive { field: &'static str },

    #[error("{field}: route path {value:?} must start with '/'")]
    InvalidPath { field: &'static str, value: String },

    #[error("relay.path and chat.path are both {0:?}")]
    PathConflict(String),

    #[error("relay.ping_interval_secs must be less than relay.idle_timeout_secs")]
    PingNotBeforeIdle,

    #[error("admin.api_key must be set when admin is enabled")]
    MissingApiKey,

    #[error("{field}: must not be empty")]
    Empty { field: &'static str },
}

fn positive(value: u64, field: &'static str, errors: &mut Vec<ValidationError>) {
    if value == 0 {
        errors.push(ValidationError::MustBePositive { field });
    }
}

fn route_path(value: &str, field: &'static str, errors: &mut Vec<ValidationError>) {
    if !value.starts_with('/') {
        errors.push(ValidationError::InvalidPath {
            field,
            value: value.to_string(),
        });
    }
}

fn socket_addr(value: &str, field: &'static str, errors: &mut Vec<ValidationError>) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field,
            value: value.to_string(),
        });
    }
}

/// Check a parsed configuration for semantic problems.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    socket_addr(&config.listener.bind_address, "listener.bind_address", &mut errors);
    positive(config.listener.max_connections as u64, "listener.max_connections", &mut errors);
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() {
            errors.push(ValidationError::Empty { field: "listener.tls.cert_path" });
        }
        if tls.key_path.trim().is_empty() {
            errors.push(ValidationError::Empty { field: "listener.tls.key_path" });
        }
    }

    let relay = &config.relay;
    route_path(&relay.path, "relay.path", &mut errors);
    positive(relay.send_queue_capacity as u64, "relay.send_queue_capacity", &mut errors);
    positive(relay.max_message_size as u64, "relay.max_message_size", &mut errors);
    positive(relay.ping_interval_secs, "relay.ping_interval_secs", &mut errors);
    positive(relay.idle_timeout_secs, "relay.idle_timeout_secs", &mut errors);
    positive(relay.close_timeout_secs, "relay.close_timeout_secs", &mut errors);
    if relay.ping_interval_secs > 0
        && relay.idle_timeout_secs > 0
        && relay.ping_interval_secs >= relay.idle_timeout_secs
    {
        errors.push(ValidationError::PingNotBeforeIdle);
    }

    if config.chat.enabled {
        route_path(&config.chat.path, "chat.path", &mut errors);
        if config.chat.path == relay.path {
            errors.push(ValidationError::PathConflict(relay.path.clone()));
        }
        positive(config.chat.max_room_id_len as u64, "chat.max_room_id_len", &mut errors);
        positive(config.chat.join_timeout_secs, "chat.join_timeout_secs", &mut errors);
    }

    if config.rate_limit.enabled {
        positive(
            config.rate_limit.messages_per_second as u64,
            "rate_limit.messages_per_second",
            &mut errors,
        );
        positive(config.rate_limit.burst_size as u64, "rate_limit.burst_size", &mut errors);
    }

    positive(config.timeouts.request_secs, "timeouts.request_secs", &mut errors);

    if config.observability.metrics_enabled {
        socket_addr(
            &config.observability.metrics_address,
            "observability.metrics_address",
            &mut errors,
        );
    }

    if config.admin.enabled {
        let key = config.admin.api_key.trim();
        if key.is_empty() || key == PLACEHOLDER_API_KEY {
            errors.push(ValidationError::MissingApiKey);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::TlsConfig;

    #[test]
    fn defaults_are_valid() {
        assert!(validate_config(&RelayConfig::default()).is_ok());
    }

    #[test]
    fn collects_every_error() {
        let mut config = RelayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.listener.max_connections = 0;
        config.relay.send_queue_capacity = 0;
        config.relay.path = "ws".into();

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::MustBePositive {
            field: "listener.max_connections"
        }));
        assert!(errors.contains(&ValidationError::InvalidPath {
            field: "relay.path",
            value: "ws".into()
        }));
    }

    #[test]
    fn rejects_conflicting_paths() {
        let mut config = RelayConfig::default();
        config.chat.path = "/ws".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::PathConflict("/ws".into())]);

        config.chat.enabled = false;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn ping_must_fire_before_idle_timeout() {
        let mut config = RelayConfig::default();
        config.relay.ping_interval_secs = 60;
        config.relay.idle_timeout_secs = 60;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::PingNotBeforeIdle]);
    }

    #[test]
    fn admin_requires_real_key() {
        let mut config = RelayConfig::default();
        config.admin.enabled = true;
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::MissingApiKey]
        );

        config.admin.api_key = "s3cret".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rate_limit_checked_only_when_enabled() {
        let mut config = RelayConfig::default();
        config.rate_limit.messages_per_second = 0;
        assert!(validate_config(&config).is_ok());

        config.rate_limit.enabled = true;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn tls_paths_must_be_set() {
        let mut config = RelayConfig::default();
        config.listener.tls = Some(TlsConfig {
            cert_path: "cert.pem".into(),
            key_path: " ".into(),
        });
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::Empty { field: "listener.tls.key_path" }]
        );
    }
}
