//! Watcher status and the single-slot channel it is published on.
//!
//! The supervisor overwrites the slot on every transition and never waits
//! for the reader; the probe loop reads the latest value once per tick.

use std::fmt;

use serde::Serialize;
use tokio::sync::watch;

/// Externally visible state of the watcher process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum WatcherStatus {
    /// Feature turned off in configuration.
    Disabled,
    /// Enabled but not launched yet.
    NotRunning,
    Running,
    /// The last attempt failed; another one will follow.
    Failed { error: String },
    /// The supervisor stopped for good.
    Terminated { error: String },
}

impl WatcherStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WatcherStatus::Disabled => "Disabled",
            WatcherStatus::NotRunning => "NotRunning",
            WatcherStatus::Running => "Running",
            WatcherStatus::Failed { .. } => "Failed",
            WatcherStatus::Terminated { .. } => "Terminated",
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            WatcherStatus::Failed { error } | WatcherStatus::Terminated { error } => Some(error),
            _ => None,
        }
    }
}

impl fmt::Display for WatcherStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.error() {
            Some(error) => write!(f, "{}: {}", self.as_str(), error),
            None => f.write_str(self.as_str()),
        }
    }
}

pub type StatusSender = watch::Sender<WatcherStatus>;
pub type StatusReceiver = watch::Receiver<WatcherStatus>;

/// Create the latest-value slot, initialised to `NotRunning`.
pub fn status_channel() -> (StatusSender, StatusReceiver) {
    watch::channel(WatcherStatus::NotRunning)
}
