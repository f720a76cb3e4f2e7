//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals, probe counts, limits, ports)
//! - Check protocol-dependent fields (TCP needs a port)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AgentConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::ops::RangeInclusive;

use thiserror::Error;

use crate::config::schema::{AgentConfig, ProbeProtocol};

pub const INTERVAL_SECS_RANGE: RangeInclusive<u64> = 5..=60;
pub const NUM_OF_PROBES_RANGE: RangeInclusive<u32> = 1..=24;
pub const GRACE_PERIOD_SECS_RANGE: RangeInclusive<u64> = 5..=14_400;
pub const CPU_PERCENTAGE_RANGE: RangeInclusive<u32> = 1..=100;
pub const MIN_WATCHER_MEMORY_BYTES: u64 = 30_000_000;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be within {min}..={max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: u64,
        max: u64,
        value: u64,
    },

    #[error("probe.port is required for the tcp protocol")]
    MissingPort,

    #[error("probe.port must be non-zero")]
    ZeroPort,

    #[error("probe.request_path is only valid for http/https probes")]
    UnexpectedRequestPath,

    #[error("watcher.memory_limit_bytes must be at least {min}, got {value}")]
    MemoryLimitTooLow { min: u64, value: u64 },

    #[error("observability.metrics_address is not a socket address: {0}")]
    MetricsAddress(String),
}

fn check_range<T>(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    range: &RangeInclusive<T>,
    value: T,
) where
    T: PartialOrd + Copy + Into<u64>,
{
    if !range.contains(&value) {
        errors.push(ValidationError::OutOfRange {
            field,
            min: (*range.start()).into(),
            max: (*range.end()).into(),
            value: value.into(),
        });
    }
}

/// Validate a parsed configuration, collecting every violation.
pub fn validate_config(config: &AgentConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let probe = &config.probe;

    check_range(&mut errors, "probe.interval_secs", &INTERVAL_SECS_RANGE, probe.interval_secs);
    check_range(&mut errors, "probe.num_of_probes", &NUM_OF_PROBES_RANGE, probe.num_of_probes);
    if let Some(grace) = probe.grace_period_secs {
        check_range(&mut errors, "probe.grace_period_secs", &GRACE_PERIOD_SECS_RANGE, grace);
    }

    match probe.protocol {
        Some(ProbeProtocol::Tcp) => {
            if probe.port.is_none() {
                errors.push(ValidationError::MissingPort);
            }
            if !probe.request_path.is_empty() {
                errors.push(ValidationError::UnexpectedRequestPath);
            }
        }
        Some(ProbeProtocol::Http) | Some(ProbeProtocol::Https) | None => {}
    }
    if probe.port == Some(0) {
        errors.push(ValidationError::ZeroPort);
    }

    if config.watcher.enabled {
        check_range(
            &mut errors,
            "watcher.max_cpu_percentage",
            &CPU_PERCENTAGE_RANGE,
            config.watcher.max_cpu_percentage,
        );
        if config.watcher.memory_limit_bytes < MIN_WATCHER_MEMORY_BYTES {
            errors.push(ValidationError::MemoryLimitTooLow {
                min: MIN_WATCHER_MEMORY_BYTES,
                value: config.watcher.memory_limit_bytes,
            });
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&AgentConfig::default()).is_ok());
    }

    #[test]
    fn collects_all_errors() {
        let mut config = AgentConfig::default();
        config.probe.protocol = Some(ProbeProtocol::Tcp);
        config.probe.interval_secs = 1;
        config.probe.num_of_probes = 0;
        config.probe.grace_period_secs = Some(0);

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::MissingPort));
    }

    #[test]
    fn watcher_limits_checked_only_when_enabled() {
        let mut config = AgentConfig::default();
        config.watcher.memory_limit_bytes = 1;
        assert!(validate_config(&config).is_ok());

        config.watcher.enabled = true;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::MemoryLimitTooLow {
                min: MIN_WATCHER_MEMORY_BYTES,
                value: 1
            }]
        );
    }

    #[test]
    fn tcp_rejects_request_path() {
        let mut config = AgentConfig::default();
        config.probe.protocol = Some(ProbeProtocol::Tcp);
        config.probe.port = Some(22);
        config.probe.request_path = "health".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors, vec![ValidationError::UnexpectedRequestPath]);
    }
}
