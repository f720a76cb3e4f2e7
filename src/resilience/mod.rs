//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Probe:
//!     → timeouts.rs (every network call has a deadline)
//!
//! Watcher attempt failed:
//!     → backoff.rs (count consecutive attempts, cool down when the cap is hit)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Restart storms are bounded by a fixed attempt cap
//! - Cool-down sleeps are cut short by shutdown

pub mod backoff;
pub mod timeouts;
