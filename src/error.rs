//! Top-level error type for starting and running the relay.

use crate::config::ConfigError;
use crate::net::listener::ListenerError;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("listener: {0}")]
    Listener(#[from] ListenerError),

    #[error("TLS setup: {0}")]
    Tls(#[source] std::io::Error),

    #[error("config watcher: {0}")]
    Watch(#[from] notify::Error),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}
