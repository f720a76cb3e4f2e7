//! The agent control loop.
//!
//! # Per tick
//! ```text
//! check shutdown → probe → commit → read latest watcher status
//!     → StatusReport → persist → check shutdown → sleep rest of interval
//! ```
//!
//! # Design Decisions
//! - The loop alone owns the committer; no locking
//! - The watcher status is read without waiting, so a silent supervisor never stalls reporting
//! - Persistence errors are logged and the loop continues

use std::time::Duration;

use tokio::time::Instant;

use crate::config::ProbeConfig;
use crate::health::{Probe, StateCommitter};
use crate::lifecycle::shutdown::ShutdownSignal;
use crate::observability::metrics;
use crate::report::{StatusReport, StatusSink};
use crate::watcher::StatusReceiver;

/// Probe loop state for one `enable` run.
pub struct Agent {
    probe: Probe,
    committer: StateCommitter,
    watcher_status: StatusReceiver,
    sink: Box<dyn StatusSink>,
    interval: Duration,
}

impl Agent {
    /// Build the loop; the grace period starts now.
    pub fn new(
        probe: Probe,
        config: &ProbeConfig,
        watcher_status: StatusReceiver,
        sink: Box<dyn StatusSink>,
    ) -> Self {
        let committer = StateCommitter::new(
            config.num_of_probes,
            Some(config.grace_period()),
            probe.state_after_grace_expires(),
            Instant::now().into_std(),
        );
        Self {
            probe,
            committer,
            watcher_status,
            sink,
            interval: config.interval(),
        }
    }

    pub fn committer(&self) -> &StateCommitter {
        &self.committer
    }

    /// Run until shutdown.
    pub async fn run(mut self, shutdown: ShutdownSignal) {
        tracing::info!(
            probe = %self.probe.describe(),
            interval_secs = self.interval.as_secs(),
            "Health loop starting"
        );

        loop {
            if shutdown.is_triggered() {
                break;
            }

            let started = Instant::now();
            let report = self.tick().await;
            if let Err(e) = self.sink.persist(&report) {
                tracing::error!(error = %e, "Failed to persist status");
            }

            if shutdown.is_triggered() {
                break;
            }

            let remaining = self.interval.saturating_sub(started.elapsed());
            tokio::select! {
                _ = tokio::time::sleep(remaining) => {}
                _ = shutdown.triggered() => break,
            }
        }

        tracing::info!(committed = %self.committer.committed(), "Health loop stopped");
    }

    /// Probe once and build the report for this tick.
    pub async fn tick(&mut self) -> StatusReport {
        let sample = self.probe.evaluate().await;
        metrics::record_probe_sample(sample.state);
        if let Some(error) = &sample.error {
            tracing::debug!(state = %sample.state, error = %error, "Probe did not report healthy");
        }

        let committed = self.committer.observe(sample.state, Instant::now().into_std());
        metrics::record_committed_state(committed);

        let watcher = self.watcher_status.borrow().clone();
        StatusReport {
            timestamp: sample.observed_at,
            committed_state: committed,
            custom_metrics: sample.custom_metrics,
            watcher,
            probe_error: sample.error.map(|e| e.to_string()),
        }
    }
}
