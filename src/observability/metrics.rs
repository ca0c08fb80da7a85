//! Metrics collection and exposition.
//!
//! # Metrics
//! - `healthcheck_check_runs_total` (counter): checker executions by check, outcome
//! - `healthcheck_ticks_dropped_total` (counter): ticks skipped at the in-flight cap
//! - `healthcheck_status` (gauge): 0=OK, 1=WARNING, 2=CRITICAL
//! - `healthcheck_subscriber_notifications_total` (counter): deliveries to subscribers
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

use crate::check::Status;

/// Install the Prometheus recorder and its scrape listener on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_check_run(check: &str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!(
        "healthcheck_check_runs_total",
        "check" => check.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_tick_dropped(check: &str) {
    counter!("healthcheck_ticks_dropped_total", "check" => check.to_string()).increment(1);
}

/// Publish the combined status as its severity.
pub fn record_status(status: Status) {
    gauge!("healthcheck_status").set(f64::from(status.severity()));
}

pub fn record_notification() {
    counter!("healthcheck_subscriber_notifications_total").increment(1);
}
