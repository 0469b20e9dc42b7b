//! Metrics recording.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding process installs a recorder.
//!
//! # Metrics
//! - `lb_connections_total` (counter): connections by outcome (`relayed`, `no_backend`, `dial_failed`)
//! - `lb_active_connections` (gauge): connections currently relaying
//! - `lb_relayed_bytes_total` (counter): bytes by direction (`upstream`, `downstream`)
//! - `lb_backend_up` (gauge): 1=alive, 0=dead, per backend

use metrics::{counter, gauge};

pub fn record_connection(outcome: &'static str) {
    counter!("lb_connections_total", "outcome" => outcome).increment(1);
}

pub fn connection_opened() {
    gauge!("lb_active_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("lb_active_connections").decrement(1.0);
}

pub fn record_relayed_bytes(direction: &'static str, bytes: u64) {
    counter!("lb_relayed_bytes_total", "direction" => direction).increment(bytes);
}

pub fn record_backend_health(backend: &str, alive: bool) {
    gauge!("lb_backend_up", "backend" => backend.to_string()).set(if alive { 1.0 } else { 0.0 });
}
