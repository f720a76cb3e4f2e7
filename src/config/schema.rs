//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the agent.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the health agent.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AgentConfig {
    /// Application probe settings.
    pub probe: ProbeConfig,

    /// Companion watcher process settings.
    pub watcher: WatcherConfig,

    /// Filesystem locations used by the agent and the watcher.
    pub paths: PathsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Protocol used to probe the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeProtocol {
    Tcp,
    Http,
    Https,
}

impl ProbeProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeProtocol::Tcp => "tcp",
            ProbeProtocol::Http => "http",
            ProbeProtocol::Https => "https",
        }
    }
}

/// Probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Probe protocol. When absent every probe reports healthy.
    pub protocol: Option<ProbeProtocol>,

    /// Host to probe (normally the local machine).
    pub host: String,

    /// Port to probe. Required for TCP.
    pub port: Option<u16>,

    /// Request path for HTTP/HTTPS probes.
    pub request_path: String,

    /// Seconds between probes.
    pub interval_secs: u64,

    /// Consecutive identical samples required to change the committed state.
    pub num_of_probes: u32,

    /// Startup grace period in seconds. Defaults to `interval_secs * num_of_probes`.
    pub grace_period_secs: Option<u64>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            protocol: None,
            host: "localhost".to_string(),
            port: None,
            request_path: String::new(),
            interval_secs: 5,
            num_of_probes: 1,
            grace_period_secs: None,
        }
    }
}

impl ProbeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Effective grace period.
    pub fn grace_period(&self) -> Duration {
        let secs = self
            .grace_period_secs
            .unwrap_or(self.interval_secs.saturating_mul(u64::from(self.num_of_probes)));
        Duration::from_secs(secs)
    }
}

/// Signal filters passed through to the watcher.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SignalFilters {
    pub disabled_signals: Vec<String>,
    pub disabled_tags: Vec<String>,
    pub enabled_tags: Vec<String>,
    pub enabled_optional_signals: Vec<String>,
}

/// Watcher (companion diagnostics process) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Run the watcher at all.
    pub enabled: bool,

    /// CPU ceiling as a percentage of one core.
    pub max_cpu_percentage: u32,

    /// Memory ceiling in bytes.
    pub memory_limit_bytes: u64,

    pub signal_filters: SignalFilters,

    /// Remote configuration URL handed to the watcher.
    pub global_configuration_url: Option<String>,

    pub disable_config_reader: bool,

    /// Extra `KEY=VALUE` environment entries for the watcher.
    pub parameter_overrides: HashMap<String, String>,

    /// Attributes forwarded as `--env-attributes k=v:...`.
    pub environment_attributes: HashMap<String, bool>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_cpu_percentage: 1,
            memory_limit_bytes: 80_000_000,
            signal_filters: SignalFilters::default(),
            global_configuration_url: None,
            disable_config_reader: false,
            parameter_overrides: HashMap::new(),
            environment_attributes: HashMap::new(),
        }
    }
}

/// Filesystem locations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Folder for agent and watcher logs (also holds the heartbeat file).
    pub log_folder: PathBuf,

    /// Folder the status file is written to.
    pub status_folder: PathBuf,

    /// Folder the watcher writes signal events to.
    pub events_folder: PathBuf,

    /// Folder containing the watcher binaries and `vmwatch.conf`.
    pub watcher_bin_dir: PathBuf,

    /// Mount point of the kernel resource-group filesystem.
    pub cgroup_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            log_folder: PathBuf::from("/var/log/azure/applicationhealth-extension"),
            status_folder: PathBuf::from("/var/lib/waagent/applicationhealth-extension/status"),
            events_folder: PathBuf::from("/var/log/azure/applicationhealth-extension/events"),
            watcher_bin_dir: PathBuf::from("/var/lib/waagent/applicationhealth-extension/bin"),
            cgroup_root: PathBuf::from("/sys/fs/cgroup"),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
