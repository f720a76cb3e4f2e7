//! Heartbeat monitoring for the watcher process.
//!
//! The watcher touches a liveness file periodically. Every interval the
//! monitor checks the file's modification time; a missing or stale file
//! means the process is hung.

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use thiserror::Error;

/// How often the heartbeat file is checked.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(60);

/// Maximum age of the heartbeat file before the watcher counts as hung.
pub const HEARTBEAT_THRESHOLD: Duration = Duration::from_secs(60);

/// Why the heartbeat check failed.
#[derive(Debug, Error)]
pub enum HeartbeatError {
    #[error("heartbeat file {} is unreadable: {source}", path.display())]
    Missing {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("heartbeat file {} is stale ({age:?} old, limit {threshold:?})", path.display())]
    Stale {
        path: PathBuf,
        age: Duration,
        threshold: Duration,
    },
}

/// Periodic liveness check on a heartbeat file.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    path: PathBuf,
    interval: Duration,
    threshold: Duration,
}

impl HeartbeatMonitor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            interval: HEARTBEAT_INTERVAL,
            threshold: HEARTBEAT_THRESHOLD,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Check once. Returns the file's age when fresh.
    pub fn check(&self) -> Result<Duration, HeartbeatError> {
        let modified = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .map_err(|source| HeartbeatError::Missing {
                path: self.path.clone(),
                source,
            })?;

        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > self.threshold {
            return Err(HeartbeatError::Stale {
                path: self.path.clone(),
                age,
                threshold: self.threshold,
            });
        }
        Ok(age)
    }

    /// Check every interval until the heartbeat fails.
    ///
    /// Only returns on failure; callers race it against process exit.
    pub async fn watch(&self) -> HeartbeatError {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = tokio::time::interval_at(start, self.interval);
        loop {
            ticker.tick().await;
            match self.check() {
                Ok(age) => {
                    tracing::debug!(path = %self.path.display(), age_ms = age.as_millis() as u64, "Watcher heartbeat is fresh");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Watcher heartbeat check failed");
                    return e;
                }
            }
        }
    }
}
