//! Metrics collection and exposition.
//!
//! # Metrics
//! - `relay_connections_total` (counter): accepted sessions by endpoint
//! - `relay_connections_rejected_total` (counter): upgrades refused at the limit
//! - `relay_active_connections` (gauge): live sessions
//! - `relay_messages_received_total` (counter): inbound frames by endpoint
//! - `relay_messages_delivered_total` (counter): frames queued to receivers
//! - `relay_messages_dropped_total` (counter): frames not delivered, by reason
//! - `relay_session_duration_seconds` (histogram): session lifetime
//! - `relay_rooms` (gauge): open chat rooms

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint started"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to start metrics endpoint"),
    }
}

pub fn record_connection_opened(endpoint: &'static str, active: u64) {
    counter!("relay_connections_total", "endpoint" => endpoint).increment(1);
    gauge!("relay_active_connections").set(active as f64);
}

pub fn record_connection_closed(endpoint: &'static str, opened_at: Instant, active: u64) {
    histogram!("relay_session_duration_seconds", "endpoint" => endpoint)
        .record(opened_at.elapsed().as_secs_f64());
    gauge!("relay_active_connections").set(active as f64);
}

pub fn record_connection_rejected() {
    counter!("relay_connections_rejected_total").increment(1);
}

pub fn record_message_received(endpoint: &'static str) {
    counter!("relay_messages_received_total", "endpoint" => endpoint).increment(1);
}

pub fn record_fanout(endpoint: &'static str, delivered: usize, dropped: usize) {
    if delivered > 0 {
        counter!("relay_messages_delivered_total", "endpoint" => endpoint).increment(delivered as u64);
    }
    if dropped > 0 {
        record_dropped("queue_full", dropped);
    }
}

pub fn record_dropped(reason: &'static str, count: usize) {
    counter!("relay_messages_dropped_total", "reason" => reason).increment(count as u64);
}

pub fn record_rooms(count: usize) {
    gauge!("relay_rooms").set(count as f64);
}
