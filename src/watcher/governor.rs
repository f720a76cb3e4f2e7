//! CPU and memory ceilings for the watcher process.
//!
//! # Architecture
//!
//! Two ways to constrain the watcher:
//! - `systemd-run --scope` with `CPUQuota`/`MemoryMax` properties: the limit is
//!   in force when the process starts
//! - Writing the limits into a kernel resource group after spawn, on the
//!   unified hierarchy (`cpu.max`, `memory.max`) when present and on the legacy
//!   per-controller hierarchy (`cpu.cfs_*`, `memory.limit_in_bytes`) otherwise
//!
//! The second path leaves the child briefly unconstrained between spawn and
//! assignment.
//!
//! Limits always target the watcher pid, never the agent itself.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;

use crate::watcher::command::LaunchSpec;

/// CFS period used for both hierarchies.
pub const CPU_PERIOD_US: u64 = 100_000;

/// Smallest quota the kernel accepts.
pub const MIN_CPU_QUOTA_US: u64 = 1_000;

/// Resource group created for the watcher.
pub const CGROUP_NAME: &str = "apphealth-vmwatch";

/// Where the launch wrapper is looked up.
pub const SYSTEMD_RUN_CANDIDATES: &[&str] = &["/usr/bin/systemd-run", "/bin/systemd-run"];

/// Present when systemd is the running init system.
pub const SYSTEMD_RUNTIME_DIR: &str = "/run/systemd/system";

/// First systemd release where `MemoryLimit` is deprecated in favour of `MemoryMax`.
pub const MEMORY_MAX_MIN_VERSION: u32 = 246;

/// Errors applying resource limits.
#[derive(Debug, Error)]
pub enum GovernorError {
    /// Neither hierarchy was found.
    #[error("no supported cgroup hierarchy under {}", .0.display())]
    Unsupported(PathBuf),

    #[error("failed to create cgroup at {}: {source}", path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("failed to write {value} to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        value: String,
        source: io::Error,
    },
}

/// CPU and memory ceilings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Percentage of one CPU.
    pub cpu_percent: u32,
    pub memory_bytes: u64,
}

impl ResourceLimits {
    /// CFS quota in microseconds for the given period.
    pub fn cpu_quota_us(&self, period_us: u64) -> u64 {
        (period_us * u64::from(self.cpu_percent) / 100).max(MIN_CPU_QUOTA_US)
    }
}

/// Resource-group hierarchy generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CgroupVersion {
    /// Single unified hierarchy (cgroup v2).
    Unified,
    /// One hierarchy per controller (cgroup v1).
    Legacy,
}

impl CgroupVersion {
    /// Detect the active hierarchy mounted at `root`, preferring the unified one.
    pub fn detect(root: &Path) -> Option<Self> {
        if root.join("cgroup.controllers").is_file() {
            Some(CgroupVersion::Unified)
        } else if root.join("cpu").is_dir() && root.join("memory").is_dir() {
            Some(CgroupVersion::Legacy)
        } else {
            None
        }
    }
}

/// Applies [`ResourceLimits`] to a pid through the kernel resource-group filesystem.
#[derive(Debug, Clone)]
pub struct ResourceGovernor {
    root: PathBuf,
    group: String,
    limits: ResourceLimits,
}

impl ResourceGovernor {
    pub fn new(root: impl Into<PathBuf>, limits: ResourceLimits) -> Self {
        Self {
            root: root.into(),
            group: CGROUP_NAME.to_string(),
            limits,
        }
    }

    /// Move `pid` into the watcher group and apply the limits.
    pub fn apply(&self, pid: u32) -> Result<CgroupVersion, GovernorError> {
        let version = CgroupVersion::detect(&self.root)
            .ok_or_else(|| GovernorError::Unsupported(self.root.clone()))?;

        match version {
            CgroupVersion::Unified => self.apply_unified(pid)?,
            CgroupVersion::Legacy => self.apply_legacy(pid)?,
        }

        tracing::info!(
            pid,
            version = ?version,
            cpu_percent = self.limits.cpu_percent,
            memory_bytes = self.limits.memory_bytes,
            "Applied watcher resource limits"
        );
        Ok(version)
    }

    fn apply_unified(&self, pid: u32) -> Result<(), GovernorError> {
        // Controllers must be delegated by the parent; usually already are.
        let subtree = self.root.join("cgroup.subtree_control");
        if let Err(e) = fs::write(&subtree, "+cpu +memory") {
            tracing::debug!(path = %subtree.display(), error = %e, "Could not enable cgroup controllers");
        }

        let group = self.create_group(&self.root)?;
        let quota = self.limits.cpu_quota_us(CPU_PERIOD_US);
        write_value(&group.join("cpu.max"), format!("{} {}", quota, CPU_PERIOD_US))?;
        write_value(&group.join("memory.max"), self.limits.memory_bytes.to_string())?;
        write_value(&group.join("cgroup.procs"), pid.to_string())
    }

    fn apply_legacy(&self, pid: u32) -> Result<(), GovernorError> {
        let cpu = self.create_group(&self.root.join("cpu"))?;
        let quota = self.limits.cpu_quota_us(CPU_PERIOD_US);
        write_value(&cpu.join("cpu.cfs_period_us"), CPU_PERIOD_US.to_string())?;
        write_value(&cpu.join("cpu.cfs_quota_us"), quota.to_string())?;

        let memory = self.create_group(&self.root.join("memory"))?;
        write_value(
            &memory.join("memory.limit_in_bytes"),
            self.limits.memory_bytes.to_string(),
        )?;

        write_value(&cpu.join("cgroup.procs"), pid.to_string())?;
        write_value(&memory.join("cgroup.procs"), pid.to_string())
    }

    fn create_group(&self, parent: &Path) -> Result<PathBuf, GovernorError> {
        let path = parent.join(&self.group);
        fs::create_dir_all(&path).map_err(|source| GovernorError::Create {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}

fn write_value(path: &Path, value: String) -> Result<(), GovernorError> {
    fs::write(path, &value).map_err(|source| GovernorError::Write {
        path: path.to_path_buf(),
        value,
        source,
    })
}

/// The privileged launch wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemdRun {
    path: PathBuf,
    version: u32,
}

impl SystemdRun {
    pub fn new(path: impl Into<PathBuf>, version: u32) -> Self {
        Self {
            path: path.into(),
            version,
        }
    }

    /// Find a usable `systemd-run` on this host.
    pub async fn detect() -> Option<Self> {
        if !Path::new(SYSTEMD_RUNTIME_DIR).is_dir() {
            return None;
        }
        let path = SYSTEMD_RUN_CANDIDATES
            .iter()
            .map(Path::new)
            .find(|p| p.is_file())?;

        let output = match Command::new(path).arg("--version").output().await {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                tracing::warn!(status = %output.status, "systemd-run --version failed");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to run systemd-run --version");
                return None;
            }
        };

        let version = Self::parse_version(&String::from_utf8_lossy(&output.stdout))?;
        tracing::debug!(path = %path.display(), version, "Found systemd-run");
        Some(Self::new(path, version))
    }

    /// Parse the first line of `systemd-run --version`, e.g. `systemd 249 (249.11-0ubuntu3)`.
    pub fn parse_version(output: &str) -> Option<u32> {
        let mut words = output.lines().next()?.split_whitespace();
        if words.next()? != "systemd" {
            return None;
        }
        words.next()?.parse().ok()
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Wrap `spec` so the limits are in force from process creation.
    pub fn wrap(&self, spec: &LaunchSpec, limits: ResourceLimits) -> LaunchSpec {
        let memory_property = if self.version >= MEMORY_MAX_MIN_VERSION {
            "MemoryMax"
        } else {
            "MemoryLimit"
        };

        let mut args = vec![
            "--scope".to_string(),
            "-p".to_string(),
            format!("CPUQuota={}%", limits.cpu_percent),
            "-p".to_string(),
            format!("{}={}", memory_property, limits.memory_bytes),
            spec.program.display().to_string(),
        ];
        args.extend(spec.args.iter().cloned());

        LaunchSpec {
            program: self.path.clone(),
            args,
            envs: spec.envs.clone(),
            heartbeat_path: spec.heartbeat_path.clone(),
        }
    }
}
