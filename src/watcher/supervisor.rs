//! Watcher process supervision.
//!
//! # Per attempt
//! ```text
//! NotRunning → build command → spawn (wrapped or direct + governor)
//!            → Running → race { process exit, heartbeat stale, shutdown }
//!            → Failed (kill if still alive, report output)
//! ```
//!
//! # Outer loop
//! Up to `MAX_ATTEMPTS` consecutive attempts, then a long cool-down, until
//! shutdown. Every exit counts as a failure: the watcher has no clean exit.

use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;
use tokio::task::JoinHandle;

use crate::config::{ExecutionEnvironment, PathsConfig, WatcherConfig};
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;
use crate::resilience::backoff::AttemptBudget;
use crate::watcher::command::{build_launch_spec, LaunchSpec};
use crate::watcher::error::WatcherError;
use crate::watcher::governor::{GovernorError, ResourceGovernor, ResourceLimits, SystemdRun};
use crate::watcher::heartbeat::{HeartbeatError, HeartbeatMonitor, HEARTBEAT_INTERVAL};
use crate::watcher::status::{StatusSender, WatcherStatus};

/// Bytes of combined stdout/stderr kept for the failure report.
const OUTPUT_TAIL_BYTES: usize = 4096;

/// How long to wait for the output pipes to drain after exit.
const OUTPUT_COLLECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Owns the watcher process lifecycle.
pub struct WatcherSupervisor {
    config: WatcherConfig,
    paths: PathsConfig,
    env: ExecutionEnvironment,
    agent_version: Option<String>,
    status: StatusSender,
    budget: AttemptBudget,
    heartbeat_interval: Duration,
    program_override: Option<PathBuf>,
    use_wrapper: bool,
}

enum Ended {
    Exited(io::Result<ExitStatus>),
    Hung(HeartbeatError),
    Shutdown,
}

impl WatcherSupervisor {
    pub fn new(
        config: WatcherConfig,
        paths: PathsConfig,
        env: ExecutionEnvironment,
        status: StatusSender,
    ) -> Self {
        Self {
            config,
            paths,
            env,
            agent_version: None,
            status,
            budget: AttemptBudget::default(),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            program_override: None,
            use_wrapper: true,
        }
    }

    /// Version reported to the watcher with `--apphealth-version`.
    pub fn with_agent_version(mut self, version: Option<String>) -> Self {
        self.agent_version = version;
        self
    }

    pub fn with_budget(mut self, budget: AttemptBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Launch `program` instead of the architecture-specific binary.
    pub fn with_program(mut self, program: PathBuf) -> Self {
        self.program_override = Some(program);
        self
    }

    /// Never use `systemd-run`; always spawn directly and apply the governor.
    pub fn without_wrapper(mut self) -> Self {
        self.use_wrapper = false;
        self
    }

    pub fn limits(&self) -> ResourceLimits {
        ResourceLimits {
            cpu_percent: self.config.max_cpu_percentage,
            memory_bytes: self.config.memory_limit_bytes,
        }
    }

    fn launch_spec(&self) -> Result<LaunchSpec, WatcherError> {
        let spec = build_launch_spec(
            &self.config,
            &self.paths,
            self.env,
            self.agent_version.as_deref(),
        )?;
        Ok(match &self.program_override {
            Some(program) => spec.with_program(program.clone()),
            None => spec,
        })
    }

    /// Supervise the watcher until shutdown.
    pub async fn run(self, shutdown: ShutdownSignal) {
        if !self.config.enabled {
            tracing::info!("Watcher disabled");
            self.status.send_replace(WatcherStatus::Disabled);
            return;
        }

        tracing::info!(
            cpu_percent = self.config.max_cpu_percentage,
            memory_bytes = self.config.memory_limit_bytes,
            max_attempts = self.budget.max_attempts(),
            "Watcher supervisor starting"
        );
        self.status.send_replace(WatcherStatus::NotRunning);

        let this = &self;
        let signal = &shutdown;
        drive(self.budget.clone(), signal, &self.status, move || this.run_attempt(signal)).await;

        tracing::info!("Watcher supervisor stopped");
    }

    /// Run the watcher once, returning why it ended.
    pub async fn run_attempt(&self, shutdown: &ShutdownSignal) -> WatcherError {
        let spec = match self.launch_spec() {
            Ok(spec) => spec,
            Err(e) => return e,
        };

        // A file left by the previous attempt would look fresh.
        if let Err(e) = std::fs::remove_file(&spec.heartbeat_path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::debug!(path = %spec.heartbeat_path.display(), error = %e, "Could not remove old heartbeat file");
            }
        }

        let limits = self.limits();
        let wrapper = if self.use_wrapper {
            SystemdRun::detect().await
        } else {
            None
        };
        let launch = match &wrapper {
            Some(systemd_run) => systemd_run.wrap(&spec, limits),
            None => spec.clone(),
        };

        tracing::info!(
            program = %launch.program.display(),
            args = ?launch.args,
            systemd_version = ?wrapper.as_ref().map(SystemdRun::version),
            "Starting watcher"
        );
        metrics::record_watcher_attempt();

        let mut child = match launch.command().spawn() {
            Ok(child) => child,
            Err(source) => {
                return WatcherError::Spawn {
                    program: launch.program,
                    source,
                }
            }
        };

        if wrapper.is_none() {
            if let Err(e) = self.govern(&child) {
                if self.env.tolerates_governor_failure() {
                    tracing::warn!(error = %e, "Resource limits not applied, continuing unconstrained");
                } else {
                    tracing::error!(error = %e, "Resource limits not applied, killing watcher");
                    kill(&mut child).await;
                    return WatcherError::ResourceGovernance(e);
                }
            }
        }

        self.status.send_replace(WatcherStatus::Running);
        let output = spawn_output_capture(&mut child);
        let heartbeat = HeartbeatMonitor::new(spec.heartbeat_path.clone())
            .with_interval(self.heartbeat_interval);

        let ended = tokio::select! {
            status = child.wait() => Ended::Exited(status),
            error = heartbeat.watch() => Ended::Hung(error),
            _ = shutdown.triggered() => Ended::Shutdown,
        };

        if !matches!(ended, Ended::Exited(_)) {
            kill(&mut child).await;
        }
        let output = collect_output(output).await;

        match ended {
            Ended::Exited(Ok(status)) => WatcherError::Exited {
                status: status.to_string(),
                output,
            },
            Ended::Exited(Err(e)) => WatcherError::Wait(e),
            Ended::Hung(source) => WatcherError::Hung { source, output },
            Ended::Shutdown => {
                tracing::info!("Killed watcher for shutdown");
                WatcherError::ShutdownRequested
            }
        }
    }

    fn govern(&self, child: &Child) -> Result<(), GovernorError> {
        // No pid means the process already exited and was reaped.
        let Some(pid) = child.id() else {
            return Ok(());
        };
        ResourceGovernor::new(self.paths.cgroup_root.clone(), self.limits())
            .apply(pid)
            .map(|_| ())
    }
}

/// Retry loop shared by the supervisor and its tests.
///
/// Runs `attempt` until shutdown, cooling down whenever the budget is spent.
pub async fn drive<F, Fut>(
    mut budget: AttemptBudget,
    shutdown: &ShutdownSignal,
    status: &StatusSender,
    mut attempt: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = WatcherError>,
{
    while !shutdown.is_triggered() {
        let error = attempt().await;
        if shutdown.is_triggered() || matches!(error, WatcherError::ShutdownRequested) {
            break;
        }

        tracing::warn!(error = %error, attempt = budget.used() + 1, "Watcher attempt failed");
        metrics::record_watcher_failure(error.reason());
        status.send_replace(WatcherStatus::Failed {
            error: error.to_string(),
        });

        if let Some(cooldown) = budget.record_failure() {
            tracing::warn!(
                attempts = budget.max_attempts(),
                cooldown_secs = cooldown.as_secs(),
                "Watcher attempts exhausted, cooling down"
            );
            tokio::select! {
                _ = tokio::time::sleep(cooldown) => {}
                _ = shutdown.triggered() => break,
            }
        }
    }

    status.send_replace(WatcherStatus::Terminated {
        error: WatcherError::ShutdownRequested.to_string(),
    });
}

async fn kill(child: &mut Child) {
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "Failed to kill watcher");
    }
}

/// Bounded tail of the watcher's interleaved stdout and stderr.
#[derive(Default)]
struct OutputTail {
    bytes: Vec<u8>,
}

impl OutputTail {
    fn push(&mut self, chunk: &[u8]) {
        self.bytes.extend_from_slice(chunk);
        if self.bytes.len() > OUTPUT_TAIL_BYTES * 2 {
            let excess = self.bytes.len() - OUTPUT_TAIL_BYTES;
            self.bytes.drain(..excess);
        }
    }

    fn into_string(self) -> String {
        let start = self.bytes.len().saturating_sub(OUTPUT_TAIL_BYTES);
        String::from_utf8_lossy(&self.bytes[start..]).trim().to_string()
    }
}

enum Pipe {
    Stdout,
    Stderr,
}

/// Read from `reader` or stay pending once it is closed.
async fn read_some<R>(reader: &mut Option<R>, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}

/// Drain both pipes into one tail, in arrival order.
async fn capture_output<O, E>(mut stdout: Option<O>, mut stderr: Option<E>) -> String
where
    O: AsyncRead + Unpin,
    E: AsyncRead + Unpin,
{
    let mut tail = OutputTail::default();
    let mut out_buf = [0u8; 1024];
    let mut err_buf = [0u8; 1024];

    while stdout.is_some() || stderr.is_some() {
        let (pipe, read) = tokio::select! {
            read = read_some(&mut stdout, &mut out_buf) => (Pipe::Stdout, read),
            read = read_some(&mut stderr, &mut err_buf) => (Pipe::Stderr, read),
        };
        match (pipe, read) {
            (Pipe::Stdout, Ok(n)) if n > 0 => tail.push(&out_buf[..n]),
            (Pipe::Stderr, Ok(n)) if n > 0 => tail.push(&err_buf[..n]),
            (Pipe::Stdout, _) => stdout = None,
            (Pipe::Stderr, _) => stderr = None,
        }
    }
    tail.into_string()
}

fn spawn_output_capture(child: &mut Child) -> JoinHandle<String> {
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();
    tokio::spawn(capture_output(stdout, stderr))
}

async fn collect_output(handle: JoinHandle<String>) -> String {
    match tokio::time::timeout(OUTPUT_COLLECT_TIMEOUT, handle).await {
        Ok(Ok(output)) => output,
        _ => String::new(),
    }
}
