//! Status reporting subsystem.
//!
//! # Data Flow
//! ```text
//! Control loop tick:
//!     committed state + custom metrics + latest watcher status
//!         → StatusReport (status.rs)
//!         → StatusSink::persist (sink.rs) → <status_folder>/<seq>.status
//! ```
//!
//! # Design Decisions
//! - Persistence errors are returned to the loop, which logs and continues
//! - The sink is a trait so the loop can be driven without a filesystem

pub mod sink;
pub mod status;

pub use sink::{JsonStatusFile, ReportError, StatusSink};
pub use status::{StatusReport, StatusType};
