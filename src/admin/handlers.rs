use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::server::AppState;
use crate::relay::{ClientInfo, RoomInfo};

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    pub uptime_secs: u64,
    pub active_connections: u64,
    pub relay_clients: usize,
    pub chat_clients: usize,
    pub rooms: usize,
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
        uptime_secs: state.started_at.elapsed().as_secs(),
        active_connections: state.tracker.active_count(),
        relay_clients: state.hub.len(),
        chat_clients: state.rooms.client_count(),
        rooms: state.rooms.room_count(),
    })
}

pub async fn get_clients(State(state): State<AppState>) -> Json<Vec<ClientInfo>> {
    Json(state.hub.clients())
}

pub async fn get_rooms(State(state): State<AppState>) -> Json<Vec<RoomInfo>> {
    Json(state.rooms.rooms())
}
