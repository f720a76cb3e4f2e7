//! Application health subsystem.
//!
//! # Data Flow
//! ```text
//! Probe engine (probe.rs):
//!     Tick
//!     → TCP connect / HTTP GET / always-healthy default
//!     → ProbeSample (state.rs)
//!
//! State committer (committer.rs):
//!     ProbeSample.state
//!     → consecutive-sample count + grace period bookkeeping
//!     → committed HealthState
//! ```
//!
//! # Design Decisions
//! - Probes are stateless; all history lives in the committer
//! - State transitions require consecutive identical samples
//! - The first sample commits immediately from Unset

pub mod committer;
pub mod probe;
pub mod state;

pub use committer::StateCommitter;
pub use probe::{Probe, ProbeError};
pub use state::{CustomMetrics, HealthState, ProbeSample};
