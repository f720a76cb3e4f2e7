//! Watcher subprocess subsystem.
//!
//! # Data Flow
//! ```text
//! Supervisor (supervisor.rs):
//!     Build command (command.rs)
//!     → systemd-run scope with limits, or spawn + ResourceGovernor (governor.rs)
//!     → race { exit, HeartbeatMonitor stale (heartbeat.rs), shutdown }
//!     → WatcherError (error.rs) → WatcherStatus slot (status.rs)
//!     → retry within AttemptBudget, cool down when spent
//! ```
//!
//! # Design Decisions
//! - At most one watcher process; the supervisor alone owns its handle
//! - Status is a latest-value slot; publishing never blocks
//! - Watcher cancellation is always a hard kill

pub mod command;
pub mod error;
pub mod governor;
pub mod heartbeat;
pub mod status;
pub mod supervisor;

pub use command::LaunchSpec;
pub use error::WatcherError;
pub use governor::{CgroupVersion, GovernorError, ResourceGovernor, ResourceLimits, SystemdRun};
pub use heartbeat::{HeartbeatError, HeartbeatMonitor};
pub use status::{status_channel, StatusReceiver, StatusSender, WatcherStatus};
pub use supervisor::WatcherSupervisor;
