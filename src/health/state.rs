//! Application health states and raw probe samples.
//!
//! # States
//! - Unset: nothing committed yet (initial value only)
//! - Initializing: reported while the startup grace period is active
//! - Healthy / Unhealthy: the application's answer
//! - Unknown: the HTTP probe could not determine health
//!
//! # State Transitions
//! ```text
//! Unset → any: first sample commits immediately
//! X → Y:       num_of_probes consecutive Y samples
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::health::probe::ProbeError;

/// Health state of the probed application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    #[default]
    Unset,
    Initializing,
    Healthy,
    Unhealthy,
    Unknown,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unset => "unset",
            HealthState::Initializing => "initializing",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
            HealthState::Unknown => "unknown",
        }
    }

    /// Numeric code exported as a gauge.
    pub fn code(&self) -> f64 {
        match self {
            HealthState::Unset => 0.0,
            HealthState::Initializing => 1.0,
            HealthState::Healthy => 2.0,
            HealthState::Unhealthy => 3.0,
            HealthState::Unknown => 4.0,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application-supplied metrics attached to an HTTP probe response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CustomMetrics {
    #[default]
    Absent,
    /// A non-empty JSON object, kept as the original text.
    Valid(String),
    /// The application sent something that is not a non-empty JSON object.
    Invalid { raw: String, reason: String },
}

impl CustomMetrics {
    /// Classify the raw `customMetrics` string from a probe response.
    pub fn from_raw(raw: Option<String>) -> Self {
        let raw = match raw {
            Some(raw) if !raw.is_empty() => raw,
            _ => return CustomMetrics::Absent,
        };

        match serde_json::from_str::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Object(map)) if !map.is_empty() => CustomMetrics::Valid(raw),
            Ok(serde_json::Value::Object(_)) => CustomMetrics::Invalid {
                raw,
                reason: "custom metrics object is empty".to_string(),
            },
            Ok(_) => CustomMetrics::Invalid {
                raw,
                reason: "custom metrics must be a JSON object".to_string(),
            },
            Err(e) => CustomMetrics::Invalid {
                raw,
                reason: format!("custom metrics is not valid JSON: {}", e),
            },
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, CustomMetrics::Absent)
    }
}

/// One raw observation produced by a probe.
#[derive(Debug)]
pub struct ProbeSample {
    pub state: HealthState,
    pub custom_metrics: CustomMetrics,
    pub observed_at: DateTime<Utc>,
    /// Why the state is not healthy, when the probe knows.
    pub error: Option<ProbeError>,
}

impl ProbeSample {
    pub fn new(state: HealthState) -> Self {
        Self {
            state,
            custom_metrics: CustomMetrics::Absent,
            observed_at: Utc::now(),
            error: None,
        }
    }

    pub fn failed(state: HealthState, error: ProbeError) -> Self {
        Self {
            error: Some(error),
            ..Self::new(state)
        }
    }

    pub fn with_custom_metrics(mut self, custom_metrics: CustomMetrics) -> Self {
        self.custom_metrics = custom_metrics;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_state_is_unset() {
        assert_eq!(HealthState::default(), HealthState::Unset);
    }

    #[test]
    fn whitespace_custom_metrics_are_invalid() {
        assert!(matches!(
            CustomMetrics::from_raw(Some("   ".into())),
            CustomMetrics::Invalid { .. }
        ));
    }

    #[test]
    fn custom_metrics_classification() {
        assert_eq!(CustomMetrics::from_raw(None), CustomMetrics::Absent);
        assert_eq!(CustomMetrics::from_raw(Some(String::new())), CustomMetrics::Absent);
        assert_eq!(
            CustomMetrics::from_raw(Some(r#"{"rollingUpgradePolicyPhase":"green"}"#.into())),
            CustomMetrics::Valid(r#"{"rollingUpgradePolicyPhase":"green"}"#.into())
        );
        assert!(matches!(
            CustomMetrics::from_raw(Some("{}".into())),
            CustomMetrics::Invalid { .. }
        ));
        assert!(matches!(
            CustomMetrics::from_raw(Some("[1,2]".into())),
            CustomMetrics::Invalid { .. }
        ));
        assert!(matches!(
            CustomMetrics::from_raw(Some("{not json".into())),
            CustomMetrics::Invalid { .. }
        ));
    }
}
