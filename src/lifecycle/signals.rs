//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate the first signal into the process-wide shutdown flag
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Handlers are registered before the listener task starts, so no early signal is lost
//! - One-shot: the listener exits after the first signal
//! - The running watcher is killed by its supervisor, which observes the same flag

use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// Registered termination signal streams.
pub struct TerminationSignals {
    terminate: Signal,
    interrupt: Signal,
    hangup: Signal,
}

impl TerminationSignals {
    /// Install the handlers. Must be called inside the Tokio runtime.
    pub fn register() -> std::io::Result<Self> {
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    /// Wait for the next termination signal and return its name.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.hangup.recv() => "SIGHUP",
        }
    }
}

/// Register the handlers and spawn the one-shot signal listener.
pub fn spawn_listener(shutdown: Shutdown) -> JoinHandle<()> {
    let registered = TerminationSignals::register();
    tokio::spawn(async move {
        match registered {
            Ok(mut signals) => {
                let name = signals.recv().await;
                tracing::info!(signal = name, "Termination signal received, shutting down");
                shutdown.trigger();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to register signal handlers");
            }
        }
    })
}
