//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define node metrics (datagrams, transactions, events, neighbors)
//! - Expose a Prometheus-compatible endpoint when configured
//!
//! # Metrics
//! - `messenger_datagrams_received_total` (counter)
//! - `messenger_parse_failures_total` (counter)
//! - `messenger_transactions_total` (counter): committed outputs by status
//! - `messenger_transaction_duration_seconds` (histogram): receive to commit
//! - `messenger_events_processed_total` (counter): by event name
//! - `messenger_known_nodes` (gauge)
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed recorder it is a no-op
//! - Labels are low cardinality (status code, event name)

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> bool {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => {
            tracing::info!(address = %addr, "Metrics exporter listening");
            true
        }
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter");
            false
        }
    }
}

pub fn record_datagram(bytes: usize) {
    metrics::counter!("messenger_datagrams_received_total").increment(1);
    metrics::histogram!("messenger_datagram_bytes").record(bytes as f64);
}

pub fn record_parse_failure() {
    metrics::counter!("messenger_parse_failures_total").increment(1);
}

pub fn record_transaction(status: u16, start: Instant) {
    metrics::counter!("messenger_transactions_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("messenger_transaction_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_event(name: &str) {
    metrics::counter!("messenger_events_processed_total", "event" => name.to_string())
        .increment(1);
}

pub fn record_known_nodes(count: usize) {
    metrics::gauge!("messenger_known_nodes").set(count as f64);
}
