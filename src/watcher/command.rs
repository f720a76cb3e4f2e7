//! Watcher launch command.
//!
//! # Responsibilities
//! - Pick the watcher binary for the CPU architecture
//! - Assemble CLI arguments from the watcher settings
//! - Assemble the environment (sorted overrides plus fixed entries)
//!
//! # Design Decisions
//! - Map-backed settings are sorted by key so the command line is deterministic
//! - List filters are passed as one `:`-joined argument

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::config::{ExecutionEnvironment, PathsConfig, SignalFilters, WatcherConfig};
use crate::watcher::error::WatcherError;

pub const CONFIG_FILE_NAME: &str = "vmwatch.conf";
pub const HEARTBEAT_FILE_NAME: &str = "vmwatch-heartbeat.txt";
pub const VERBOSE_LOG_FILE_NAME: &str = "vmwatch.log";

pub const SIGNAL_FOLDER_VAR: &str = "SIGNAL_FOLDER";
pub const VERBOSE_LOG_VAR: &str = "VERBOSE_LOG_FILE_FULL_PATH";

const LIST_SEPARATOR: char = ':';

/// Fully resolved watcher invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Extra environment entries, in the order they are applied.
    pub envs: Vec<(String, String)>,
    pub heartbeat_path: PathBuf,
}

impl LaunchSpec {
    /// Build the process command with piped output.
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    /// Replace the program, keeping arguments and environment.
    pub fn with_program(mut self, program: PathBuf) -> Self {
        self.program = program;
        self
    }
}

/// Watcher binary shipped for `arch` (as in `std::env::consts::ARCH`).
pub fn binary_name_for_arch(arch: &str) -> Result<&'static str, WatcherError> {
    match arch {
        "x86_64" => Ok("vmwatch_linux_amd64"),
        "aarch64" => Ok("vmwatch_linux_arm64"),
        other => Err(WatcherError::UnsupportedArch(other.to_string())),
    }
}

pub fn heartbeat_path(paths: &PathsConfig) -> PathBuf {
    paths.log_folder.join(HEARTBEAT_FILE_NAME)
}

/// Resolve the full launch command for this host.
pub fn build_launch_spec(
    config: &WatcherConfig,
    paths: &PathsConfig,
    env: ExecutionEnvironment,
    agent_version: Option<&str>,
) -> Result<LaunchSpec, WatcherError> {
    let binary = binary_name_for_arch(std::env::consts::ARCH)?;
    let heartbeat_path = heartbeat_path(paths);
    let config_path = paths.watcher_bin_dir.join(CONFIG_FILE_NAME);

    Ok(LaunchSpec {
        program: paths.watcher_bin_dir.join(binary),
        args: build_args(config, &config_path, &heartbeat_path, env, agent_version),
        envs: build_envs(config, paths),
        heartbeat_path,
    })
}

/// Command-line arguments for the watcher.
pub fn build_args(
    config: &WatcherConfig,
    config_path: &Path,
    heartbeat_path: &Path,
    env: ExecutionEnvironment,
    agent_version: Option<&str>,
) -> Vec<String> {
    let mut args = vec![
        "--config".to_string(),
        config_path.display().to_string(),
        "--debug".to_string(),
        "--heartbeat-file".to_string(),
        heartbeat_path.display().to_string(),
        "--execution-environment".to_string(),
        env.label().to_string(),
        "--memory-limit-bytes".to_string(),
        config.memory_limit_bytes.to_string(),
    ];

    let filters = &config.signal_filters;
    push_list(&mut args, "--disabled-signals", &filters.disabled_signals);
    push_list(&mut args, "--disabled-tags", &filters.disabled_tags);
    push_list(&mut args, "--enabled-tags", &filters.enabled_tags);
    push_list(&mut args, "--enabled-optional-signals", &filters.enabled_optional_signals);

    if let Some(url) = config.global_configuration_url.as_deref().filter(|u| !u.is_empty()) {
        args.push("--global-config-url".to_string());
        args.push(url.to_string());
    }

    args.push("--disable-config-reader".to_string());
    args.push(config.disable_config_reader.to_string());

    if !config.environment_attributes.is_empty() {
        let mut attributes: Vec<_> = config.environment_attributes.iter().collect();
        attributes.sort_by(|a, b| a.0.cmp(b.0));
        let joined = attributes
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(&LIST_SEPARATOR.to_string());
        args.push("--env-attributes".to_string());
        args.push(joined);
    }

    // The metadata service is unreachable from dev containers.
    if env.dev_container {
        args.push("--local".to_string());
    }

    if let Some(version) = agent_version.filter(|v| !v.is_empty()) {
        args.push("--apphealth-version".to_string());
        args.push(version.to_string());
    }

    args
}

fn push_list(args: &mut Vec<String>, flag: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    args.push(flag.to_string());
    args.push(values.join(&LIST_SEPARATOR.to_string()));
}

/// Environment for the watcher: sorted overrides, then the fixed entries.
pub fn build_envs(config: &WatcherConfig, paths: &PathsConfig) -> Vec<(String, String)> {
    let mut envs: Vec<(String, String)> = config
        .parameter_overrides
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    envs.sort();

    envs.push((
        SIGNAL_FOLDER_VAR.to_string(),
        paths.events_folder.display().to_string(),
    ));
    envs.push((
        VERBOSE_LOG_VAR.to_string(),
        paths.log_folder.join(VERBOSE_LOG_FILE_NAME).display().to_string(),
    ));
    envs
}

/// Recover the signal filters from a watcher argument list.
pub fn parse_filter_args(args: &[String]) -> SignalFilters {
    let mut filters = SignalFilters::default();
    let mut iter = args.iter();
    while let Some(flag) = iter.next() {
        let target = match flag.as_str() {
            "--disabled-signals" => &mut filters.disabled_signals,
            "--disabled-tags" => &mut filters.disabled_tags,
            "--enabled-tags" => &mut filters.enabled_tags,
            "--enabled-optional-signals" => &mut filters.enabled_optional_signals,
            _ => continue,
        };
        if let Some(value) = iter.next() {
            *target = split_list(value);
        }
    }
    filters
}

/// Recover the `--env-attributes` map from a watcher argument list.
pub fn parse_env_attributes(args: &[String]) -> HashMap<String, bool> {
    let mut attributes = HashMap::new();
    if let Some(pos) = args.iter().position(|a| a == "--env-attributes") {
        if let Some(value) = args.get(pos + 1) {
            for pair in split_list(value) {
                if let Some((k, v)) = pair.split_once('=') {
                    attributes.insert(k.to_string(), v == "true");
                }
            }
        }
    }
    attributes
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(LIST_SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
