//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Control loop (agent.rs):
//!     Tick → probe → commit → merge watcher status → persist → sleep
//!
//! Shutdown (shutdown.rs):
//!     Write-once flag → observed by the control loop and the watcher supervisor
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT/SIGHUP → trigger shutdown
//! ```
//!
//! # Design Decisions
//! - The flag is checked at the top and bottom of every loop iteration
//! - Sleeps select on the flag so time-to-exit is bounded by one interval
//! - The supervisor kills the watcher when it observes the flag

pub mod agent;
pub mod shutdown;
pub mod signals;

pub use agent::Agent;
pub use shutdown::{Shutdown, ShutdownSignal};
