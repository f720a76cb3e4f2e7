//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define agent metrics (probe samples, committed state, watcher attempts)
//! - Expose a Prometheus-compatible scrape endpoint when enabled
//!
//! # Metrics
//! - `apphealth_probe_samples_total` (counter): raw samples by state
//! - `apphealth_committed_state` (gauge): committed state code
//! - `apphealth_watcher_attempts_total` (counter): watcher launches
//! - `apphealth_watcher_failures_total` (counter): failed attempts by reason
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests need no setup
//! - Labels are static strings only

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::health::HealthState;

/// Install the Prometheus recorder and its HTTP listener.
///
/// Must be called from inside the Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_probe_sample(state: HealthState) {
    metrics::counter!("apphealth_probe_samples_total", "state" => state.as_str()).increment(1);
}

pub fn record_committed_state(state: HealthState) {
    metrics::gauge!("apphealth_committed_state").set(state.code());
}

pub fn record_watcher_attempt() {
    metrics::counter!("apphealth_watcher_attempts_total").increment(1);
}

pub fn record_watcher_failure(reason: &'static str) {
    metrics::counter!("apphealth_watcher_failures_total", "reason" => reason).increment(1);
}
