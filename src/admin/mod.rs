//! Operator API: status, connected clients and open rooms.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::AppState;

/// Admin routes, all behind bearer-token auth.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/clients", get(get_clients))
        .route("/admin/rooms", get(get_rooms))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}
