//! WebSocket Broadcast Relay
//!
//! Clients connect over WebSocket; anything one client sends is forwarded
//! verbatim to every other connected client.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌──────────────────────────────────────────────────────┐
//!                     │                      WS RELAY                         │
//!                     │                                                      │
//!   client ──ws──────▶│  net ──▶ http ──▶ /ws   ──▶ Hub (all clients) ──┐    │
//!                     │                   /chat ──▶ RoomRegistry ──▶ Hub ├──▶ per-client
//!                     │                                                 │    queue ──▶ client
//!   operator ──http──▶│                   /health, /admin/*             │    │
//!                     │                                                      │
//!                     │  ┌────────────────────────────────────────────────┐  │
//!                     │  │            Cross-Cutting Concerns              │  │
//!                     │  │  config (hot reload) │ observability │ limits  │  │
//!                     │  │  lifecycle (signals, graceful close & drain)   │  │
//!                     │  └────────────────────────────────────────────────┘  │
//!                     └──────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::sync::mpsc;

use ws_relay::config::validation::validate_config;
use ws_relay::config::watcher::ConfigWatcher;
use ws_relay::config::{load_config, ConfigError};
use ws_relay::lifecycle::signals::shutdown_signal;
use ws_relay::net::{listener, tls};
use ws_relay::observability::{logging, metrics};
use ws_relay::{RelayConfig, RelayError, RelayServer, Shutdown};

#[derive(Parser)]
#[command(name = "ws-relay", version, about = "WebSocket broadcast relay", long_about = None)]
struct Args {
    /// Path to a TOML config file; watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), RelayError> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => RelayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ws-relay starting");

    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        relay_path = %config.relay.path,
        chat_enabled = config.chat.enabled,
        admin_enabled = config.admin.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    // Keep the watcher alive for the life of the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.trigger();
        }
    });

    let server = RelayServer::new(config.clone());
    match &config.listener.tls {
        Some(tls_config) => {
            let rustls = tls::from_config(tls_config).await.map_err(RelayError::Tls)?;
            let addr = listener::bind_address(&config.listener)?;
            let std_listener = std::net::TcpListener::bind(addr).map_err(listener::ListenerError::Bind)?;
            server
                .run_tls(std_listener, rustls, config_updates, server_shutdown)
                .await?;
        }
        None => {
            let tcp = listener::bind(&config.listener).await?;
            server.run(tcp, config_updates, server_shutdown).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
