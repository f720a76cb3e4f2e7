//! Bounded restart attempts with a long cool-down.

use std::time::Duration;

/// Consecutive launches allowed before cooling down.
pub const MAX_ATTEMPTS: u32 = 3;

/// Sleep after the attempt cap is exhausted.
pub const COOLDOWN: Duration = Duration::from_secs(3 * 60 * 60);

/// Counts consecutive failed attempts and decides when to cool down.
#[derive(Debug, Clone)]
pub struct AttemptBudget {
    max_attempts: u32,
    cooldown: Duration,
    used: u32,
}

impl AttemptBudget {
    pub fn new(max_attempts: u32, cooldown: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            cooldown,
            used: 0,
        }
    }

    /// Record a failed attempt.
    ///
    /// Returns the cool-down to sleep when the cap has just been reached; the
    /// budget is then refilled for the next cycle.
    pub fn record_failure(&mut self) -> Option<Duration> {
        self.used += 1;
        if self.used >= self.max_attempts {
            self.used = 0;
            Some(self.cooldown)
        } else {
            None
        }
    }

    /// Attempts used in the current cycle.
    pub fn used(&self) -> u32 {
        self.used
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for AttemptBudget {
    fn default() -> Self {
        Self::new(MAX_ATTEMPTS, COOLDOWN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cools_down_after_cap() {
        let mut budget = AttemptBudget::default();
        assert_eq!(budget.record_failure(), None);
        assert_eq!(budget.record_failure(), None);
        assert_eq!(budget.record_failure(), Some(COOLDOWN));
        assert_eq!(budget.used(), 0);

        // Next cycle starts fresh.
        assert_eq!(budget.record_failure(), None);
        assert_eq!(budget.used(), 1);
    }

    #[test]
    fn zero_cap_is_treated_as_one() {
        let mut budget = AttemptBudget::new(0, Duration::from_secs(1));
        assert_eq!(budget.max_attempts(), 1);
        assert_eq!(budget.record_failure(), Some(Duration::from_secs(1)));
    }
}
