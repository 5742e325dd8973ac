//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (tracing, request ID, timeout)
//! - Bind server to listener (plain or TLS)
//! - Apply hot-reloaded configuration
//! - Close sessions and drain on shutdown

use arc_swap::ArcSwap;
use axum::{routing::get, Json, Router};
use axum_server::tls_rustls::RustlsConfig;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::admin;
use crate::config::RelayConfig;
use crate::http::websocket;
use crate::lifecycle::Shutdown;
use crate::net::ConnectionTracker;
use crate::relay::{Hub, RoomRegistry};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Live configuration; swapped on reload.
    pub config: Arc<ArcSwap<RelayConfig>>,
    /// Every client of the broadcast endpoint.
    pub hub: Arc<Hub>,
    /// Chat rooms.
    pub rooms: Arc<RoomRegistry>,
    pub tracker: ConnectionTracker,
    /// Tells open sessions to close.
    pub shutdown: Shutdown,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            config: Arc::new(ArcSwap::from_pointee(config)),
            hub: Arc::new(Hub::new()),
            rooms: Arc::new(RoomRegistry::new()),
            tracker: ConnectionTracker::new(),
            shutdown: Shutdown::new(),
            started_at: Instant::now(),
        }
    }

    /// Swap in a reloaded configuration.
    ///
    /// Settings read per connection or per broadcast, including
    /// `listener.max_connections`, take effect immediately. Bind address,
    /// TLS, route and timeout changes only apply after a restart.
    pub fn apply_config(&self, new: RelayConfig) {
        if requires_restart(&self.config.load(), &new) {
            tracing::warn!("Bind address, TLS, route or timeout changes require a restart to take effect");
        }
        self.config.store(Arc::new(new));
        tracing::info!("Configuration reloaded");
    }
}

/// Whether moving from `current` to `new` changes anything fixed at startup.
fn requires_restart(current: &RelayConfig, new: &RelayConfig) -> bool {
    current.listener.bind_address != new.listener.bind_address
        || current.listener.tls != new.listener.tls
        || current.relay.path != new.relay.path
        || current.chat.enabled != new.chat.enabled
        || current.chat.path != new.chat.path
        || current.admin.enabled != new.admin.enabled
        || current.timeouts != new.timeouts
}

/// WebSocket relay server.
pub struct RelayServer {
    router: Router,
    state: AppState,
}

impl RelayServer {
    /// Create a new server with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        let state = AppState::new(config.clone());
        let router = Self::build_router(&config, state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &RelayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route(&config.relay.path, get(websocket::relay_handler))
            .route("/health", get(health_handler));

        if config.chat.enabled {
            router = router.route(&config.chat.path, get(websocket::chat_handler));
        }
        if config.admin.enabled {
            router = router.merge(admin::router(state.clone()));
        }

        router.with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
        )
    }

    /// Shared state, for inspection.
    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn hub(&self) -> Arc<Hub> {
        Arc::clone(&self.state.hub)
    }

    pub fn rooms(&self) -> Arc<RoomRegistry> {
        Arc::clone(&self.state.rooms)
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Returns once `shutdown` fires and open sessions have drained (or the
    /// close timeout has passed).
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<RelayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Relay server starting");

        let reloader = tokio::spawn(apply_config_updates(self.state.clone(), config_updates));
        let state = self.state.clone();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let close_sessions = state.shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                close_sessions.trigger();
            })
            .await?;

        reloader.abort();
        drain(&state).await;
        tracing::info!("Relay server stopped");
        Ok(())
    }

    /// Like [`run`](Self::run) but terminates TLS on the listener.
    pub async fn run_tls(
        self,
        listener: std::net::TcpListener,
        tls: RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<RelayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Relay server starting with TLS");

        let reloader = tokio::spawn(apply_config_updates(self.state.clone(), config_updates));
        let state = self.state.clone();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        let close_sessions = state.shutdown.clone();
        let grace = state.config.load().relay.close_timeout();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            close_sessions.trigger();
            shutdown_handle.graceful_shutdown(Some(grace));
        });

        axum_server::from_tcp_rustls(listener, tls)
            .handle(handle)
            .serve(app)
            .await?;

        reloader.abort();
        drain(&state).await;
        tracing::info!("Relay server stopped");
        Ok(())
    }
}

async fn apply_config_updates(state: AppState, mut updates: mpsc::UnboundedReceiver<RelayConfig>) {
    while let Some(config) = updates.recv().await {
        state.apply_config(config);
    }
}

/// Wait for sessions to finish their close handshakes.
async fn drain(state: &AppState) {
    let timeout = state.config.load().relay.close_timeout();
    let open = state.tracker.active_count();
    if open > 0 {
        tracing::info!(open, "Waiting for sessions to close");
    }
    if !state.tracker.drain(timeout).await {
        tracing::warn!(
            open = state.tracker.active_count(),
            "Sessions still open after close timeout"
        );
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
