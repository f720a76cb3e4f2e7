//! Probe-commit state machine.
//!
//! Turns a stream of raw samples into the committed health state that is
//! reported upstream.
//!
//! # Rules (applied once per tick)
//! ```text
//! 1. same sample as last tick  → consecutive += 1
//!    different sample          → consecutive = 1, remember sample
//! 2. grace period active:
//!    a. deadline passed        → grace off, sample = after-grace state,
//!                                consecutive = 1, committed = Unset
//!    b. consecutive == N and sample != after-grace state
//!                              → grace off, sample reported as-is
//!    c. otherwise              → sample reported as Initializing
//! 3. consecutive == N or committed == Unset:
//!    commit sample if it differs; reset consecutive only when N was reached
//! ```
//!
//! # Design Decisions
//! - A single early sample commits from Unset (fast first answer)
//! - Every later change needs N confirmations (debounces flapping)
//! - Owned by the probe loop alone; no interior mutability

use std::time::{Duration, Instant};

use crate::health::state::HealthState;

/// Committed health state plus grace-period bookkeeping.
#[derive(Debug, Clone)]
pub struct StateCommitter {
    committed: HealthState,
    previous_sample: HealthState,
    consecutive_count: u32,
    num_of_probes: u32,
    grace_period: Option<Duration>,
    grace_active: bool,
    grace_started_at: Instant,
    after_grace: HealthState,
}

impl StateCommitter {
    /// Create a committer. `grace_period` of `None` disables the grace window.
    pub fn new(
        num_of_probes: u32,
        grace_period: Option<Duration>,
        after_grace: HealthState,
        started_at: Instant,
    ) -> Self {
        Self {
            committed: HealthState::Unset,
            previous_sample: HealthState::Unset,
            consecutive_count: 0,
            num_of_probes: num_of_probes.max(1),
            grace_period,
            grace_active: grace_period.is_some(),
            grace_started_at: started_at,
            after_grace,
        }
    }

    /// Feed one sample observed at `now`; returns the committed state.
    pub fn observe(&mut self, sample: HealthState, now: Instant) -> HealthState {
        let mut state = sample;

        if state == self.previous_sample {
            self.consecutive_count = self.consecutive_count.saturating_add(1);
        } else {
            tracing::info!(
                from = %self.previous_sample,
                to = %state,
                "Health state changed"
            );
            self.consecutive_count = 1;
            self.previous_sample = state;
        }

        if let (true, Some(grace)) = (self.grace_active, self.grace_period) {
            if now.saturating_duration_since(self.grace_started_at) >= grace {
                tracing::info!(
                    grace_secs = grace.as_secs(),
                    state = %self.after_grace,
                    "Grace period expired"
                );
                self.grace_active = false;
                state = self.after_grace;
                self.previous_sample = state;
                self.consecutive_count = 1;
                self.committed = HealthState::Unset;
            } else if self.consecutive_count == self.num_of_probes && state != self.after_grace {
                tracing::info!(state = %state, "Grace period ended early on confirmed state");
                self.grace_active = false;
            } else {
                state = HealthState::Initializing;
            }
        }

        let confirmed = self.consecutive_count == self.num_of_probes;
        if confirmed || self.committed == HealthState::Unset {
            if state != self.committed {
                tracing::info!(
                    from = %self.committed,
                    to = %state,
                    "Committed health state changed"
                );
                self.committed = state;
            }
            // The fast commit from Unset keeps the in-flight run going.
            if confirmed {
                self.consecutive_count = 0;
            }
        }

        self.committed
    }

    pub fn committed(&self) -> HealthState {
        self.committed
    }

    pub fn consecutive_count(&self) -> u32 {
        self.consecutive_count
    }

    pub fn grace_active(&self) -> bool {
        self.grace_active
    }
}
