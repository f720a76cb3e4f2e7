//! Watcher error definitions.

use std::path::PathBuf;

use thiserror::Error;

use crate::watcher::governor::GovernorError;
use crate::watcher::heartbeat::HeartbeatError;

/// Why a watcher attempt ended.
///
/// Every attempt ends with one of these: the watcher has no clean exit.
#[derive(Debug, Error)]
pub enum WatcherError {
    /// No watcher binary is shipped for this CPU architecture.
    #[error("unsupported architecture: {0}")]
    UnsupportedArch(String),

    /// The process could not be started.
    #[error("failed to start {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    /// CPU/memory limits could not be applied; the process was killed.
    #[error("failed to apply resource limits: {0}")]
    ResourceGovernance(#[from] GovernorError),

    /// The process exited (any exit status counts as a failure).
    #[error("watcher exited with {status}; output: {output}")]
    Exited { status: String, output: String },

    /// The heartbeat went stale; the process was killed.
    #[error("watcher is unresponsive: {source}; output: {output}")]
    Hung {
        source: HeartbeatError,
        output: String,
    },

    /// Waiting on the process failed.
    #[error("failed to wait for watcher: {0}")]
    Wait(std::io::Error),

    /// Shutdown was requested; the process was killed.
    #[error("shutdown requested")]
    ShutdownRequested,
}

impl WatcherError {
    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            WatcherError::UnsupportedArch(_) => "unsupported_arch",
            WatcherError::Spawn { .. } => "spawn",
            WatcherError::ResourceGovernance(_) => "resource_governance",
            WatcherError::Exited { .. } => "exited",
            WatcherError::Hung { .. } => "hung",
            WatcherError::Wait(_) => "wait",
            WatcherError::ShutdownRequested => "shutdown",
        }
    }
}
