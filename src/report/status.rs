//! Status report model and its on-disk document shape.
//!
//! # Document
//! ```text
//! [ { version, timestampUTC,
//!     status: { name, operation, status, formattedMessage,
//!               substatus: [ AppHealthStatus, ApplicationHealthState,
//!                            CustomMetrics?, VMWatch ] } } ]
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::health::{CustomMetrics, HealthState};
use crate::watcher::WatcherStatus;

pub const STATUS_NAME: &str = "AppHealth";
pub const STATUS_OPERATION: &str = "enable";

pub const APP_HEALTH_SUBSTATUS: &str = "AppHealthStatus";
pub const APP_HEALTH_STATE_SUBSTATUS: &str = "ApplicationHealthState";
pub const CUSTOM_METRICS_SUBSTATUS: &str = "CustomMetrics";
pub const WATCHER_SUBSTATUS: &str = "VMWatch";

/// One reporting cycle's merged view of probe and watcher.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusReport {
    pub timestamp: DateTime<Utc>,
    pub committed_state: HealthState,
    pub custom_metrics: CustomMetrics,
    pub watcher: WatcherStatus,
    /// Why the last sample was not healthy, if the probe said.
    pub probe_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusType {
    Transitioning,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormattedMessage {
    pub lang: &'static str,
    pub message: String,
}

impl FormattedMessage {
    fn en(message: impl Into<String>) -> Self {
        Self {
            lang: "en",
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubStatus {
    pub name: &'static str,
    pub status: StatusType,
    pub formatted_message: FormattedMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopLevelStatus {
    pub name: &'static str,
    pub operation: &'static str,
    pub status: StatusType,
    pub formatted_message: FormattedMessage,
    pub substatus: Vec<SubStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusItem {
    pub version: f64,
    #[serde(rename = "timestampUTC")]
    pub timestamp_utc: String,
    pub status: TopLevelStatus,
}

impl StatusReport {
    pub fn new(committed_state: HealthState, watcher: WatcherStatus) -> Self {
        Self {
            timestamp: Utc::now(),
            committed_state,
            custom_metrics: CustomMetrics::Absent,
            watcher,
            probe_error: None,
        }
    }

    /// Overall status: transitioning until a real state is committed.
    pub fn overall(&self) -> StatusType {
        match self.committed_state {
            HealthState::Unset | HealthState::Initializing => StatusType::Transitioning,
            _ => StatusType::Success,
        }
    }

    pub fn to_status_item(&self) -> StatusItem {
        let mut substatus = vec![self.app_health_substatus(), self.state_substatus()];
        if let Some(metrics) = self.custom_metrics_substatus() {
            substatus.push(metrics);
        }
        substatus.push(self.watcher_substatus());

        StatusItem {
            version: 1.0,
            timestamp_utc: self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            status: TopLevelStatus {
                name: STATUS_NAME,
                operation: STATUS_OPERATION,
                status: self.overall(),
                formatted_message: FormattedMessage::en(match self.overall() {
                    StatusType::Transitioning => "Application health is being determined",
                    _ => "Application health is reported",
                }),
                substatus,
            },
        }
    }

    fn app_health_substatus(&self) -> SubStatus {
        let (status, message) = match self.committed_state {
            HealthState::Healthy => (StatusType::Success, "Application found to be healthy".to_string()),
            HealthState::Unset | HealthState::Initializing => (
                StatusType::Transitioning,
                "Application health is initializing".to_string(),
            ),
            state => {
                let mut message = format!("Application found to be {}", state);
                if let Some(error) = &self.probe_error {
                    message.push_str(": ");
                    message.push_str(error);
                }
                (StatusType::Error, message)
            }
        };
        SubStatus {
            name: APP_HEALTH_SUBSTATUS,
            status,
            formatted_message: FormattedMessage::en(message),
        }
    }

    fn state_substatus(&self) -> SubStatus {
        SubStatus {
            name: APP_HEALTH_STATE_SUBSTATUS,
            status: StatusType::Success,
            formatted_message: FormattedMessage::en(state_label(self.committed_state)),
        }
    }

    fn custom_metrics_substatus(&self) -> Option<SubStatus> {
        let (status, message) = match &self.custom_metrics {
            CustomMetrics::Absent => return None,
            CustomMetrics::Valid(raw) => (StatusType::Success, raw.clone()),
            CustomMetrics::Invalid { reason, .. } => (StatusType::Error, reason.clone()),
        };
        Some(SubStatus {
            name: CUSTOM_METRICS_SUBSTATUS,
            status,
            formatted_message: FormattedMessage::en(message),
        })
    }

    fn watcher_substatus(&self) -> SubStatus {
        let status = match self.watcher {
            WatcherStatus::Failed { .. } | WatcherStatus::Terminated { .. } => StatusType::Error,
            _ => StatusType::Success,
        };
        SubStatus {
            name: WATCHER_SUBSTATUS,
            status,
            formatted_message: FormattedMessage::en(self.watcher.to_string()),
        }
    }
}

/// Capitalised state name as consumed upstream.
pub fn state_label(state: HealthState) -> &'static str {
    match state {
        HealthState::Unset => "Unset",
        HealthState::Initializing => "Initializing",
        HealthState::Healthy => "Healthy",
        HealthState::Unhealthy => "Unhealthy",
        HealthState::Unknown => "Unknown",
    }
}
