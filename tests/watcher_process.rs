//! Watcher supervision against real child processes.
//!
//! Scenarios run sequentially in one test so freshly written scripts are
//! never exec'd while another test thread is forking.

use std::fs;
use std::path::Path;
use std::time::Duration;

use app_health_agent::config::{ExecutionEnvironment, PathsConfig, WatcherConfig};
use app_health_agent::lifecycle::Shutdown;
use app_health_agent::watcher::governor::CGROUP_NAME;
use app_health_agent::watcher::{status_channel, WatcherError, WatcherStatus, WatcherSupervisor};

mod common;

const ATTEMPT_LIMIT: Duration = Duration::from_secs(20);

fn paths(root: &Path, cgroup_root: &Path) -> PathsConfig {
    PathsConfig {
        log_folder: root.join("log"),
        status_folder: root.join("status"),
        events_folder: root.join("events"),
        watcher_bin_dir: root.join("bin"),
        cgroup_root: cgroup_root.to_path_buf(),
    }
}

fn supervisor(
    root: &Path,
    cgroup_root: &Path,
    env: ExecutionEnvironment,
    program: std::path::PathBuf,
) -> (WatcherSupervisor, app_health_agent::watcher::StatusReceiver) {
    fs::create_dir_all(root.join("log")).unwrap();
    let (tx, rx) = status_channel();
    let supervisor = WatcherSupervisor::new(WatcherConfig::default(), paths(root, cgroup_root), env, tx)
        .with_program(program)
        .without_wrapper();
    (supervisor, rx)
}

#[tokio::test]
async fn test_watcher_attempts() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let no_cgroups = tempfile::tempdir().unwrap();

    let exiting = common::fake_watcher(root, "exiting.sh", "echo watcher started\nexit 3");
    let sleeping = common::fake_watcher(root, "sleeping.sh", "echo watcher started\nexec sleep 30");
    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();

    // Limits cannot be applied and no override is set: the child is killed.
    let (sup, rx) = supervisor(root, no_cgroups.path(), ExecutionEnvironment::default(), sleeping.clone());
    let error = tokio::time::timeout(ATTEMPT_LIMIT, sup.run_attempt(&signal)).await.unwrap();
    assert!(matches!(error, WatcherError::ResourceGovernance(_)), "{error}");
    assert_eq!(*rx.borrow(), WatcherStatus::NotRunning);

    // Both override markers: the attempt continues unconstrained.
    let override_env = ExecutionEnvironment {
        dev_container: true,
        allow_cgroup_failure: true,
    };
    let (sup, rx) = supervisor(root, no_cgroups.path(), override_env, exiting.clone());
    let error = tokio::time::timeout(ATTEMPT_LIMIT, sup.run_attempt(&signal)).await.unwrap();
    match error {
        WatcherError::Exited { status, output } => {
            assert!(status.contains('3'), "{status}");
            assert!(output.contains("watcher started"), "{output}");
        }
        other => panic!("unexpected outcome: {other}"),
    }
    assert_eq!(*rx.borrow(), WatcherStatus::Running);

    // A unified hierarchy receives the limits and the pid.
    let unified = tempfile::tempdir().unwrap();
    fs::write(unified.path().join("cgroup.controllers"), "cpu memory").unwrap();
    let (sup, _rx) = supervisor(root, unified.path(), ExecutionEnvironment::default(), exiting.clone());
    let error = tokio::time::timeout(ATTEMPT_LIMIT, sup.run_attempt(&signal)).await.unwrap();
    assert!(matches!(error, WatcherError::Exited { .. }), "{error}");
    let group = unified.path().join(CGROUP_NAME);
    assert_eq!(fs::read_to_string(group.join("cpu.max")).unwrap(), "1000 100000");
    assert_eq!(fs::read_to_string(group.join("memory.max")).unwrap(), "80000000");
    assert!(!fs::read_to_string(group.join("cgroup.procs")).unwrap().is_empty());

    // No heartbeat file ever appears: the watcher is declared hung.
    let (sup, _rx) = supervisor(root, no_cgroups.path(), override_env, sleeping.clone());
    let sup = sup.with_heartbeat_interval(Duration::from_millis(200));
    let error = tokio::time::timeout(ATTEMPT_LIMIT, sup.run_attempt(&signal)).await.unwrap();
    assert!(matches!(error, WatcherError::Hung { .. }), "{error}");

    // Shutdown while running kills the watcher.
    let (sup, _rx) = supervisor(root, no_cgroups.path(), override_env, sleeping.clone());
    let stopper = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        stopper.trigger();
    });
    let error = tokio::time::timeout(ATTEMPT_LIMIT, sup.run_attempt(&signal)).await.unwrap();
    assert!(matches!(error, WatcherError::ShutdownRequested), "{error}");

    // The full supervisor loop stops on shutdown and reports Terminated.
    let enabled = WatcherConfig {
        enabled: true,
        ..WatcherConfig::default()
    };
    let (tx, mut rx) = status_channel();
    let sup = WatcherSupervisor::new(enabled, paths(root, no_cgroups.path()), override_env, tx)
        .with_program(sleeping.clone())
        .without_wrapper();
    let shutdown = Shutdown::new();
    let task = tokio::spawn(sup.run(shutdown.subscribe()));

    tokio::time::timeout(ATTEMPT_LIMIT, rx.wait_for(|s| *s == WatcherStatus::Running))
        .await
        .expect("watcher should start")
        .unwrap();
    shutdown.trigger();
    tokio::time::timeout(ATTEMPT_LIMIT, task).await.unwrap().unwrap();
    assert_eq!(
        *rx.borrow(),
        WatcherStatus::Terminated {
            error: "shutdown requested".to_string()
        }
    );
}

#[tokio::test]
async fn test_disabled_watcher_publishes_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let (tx, rx) = status_channel();
    let supervisor = WatcherSupervisor::new(
        WatcherConfig::default(),
        paths(dir.path(), dir.path()),
        ExecutionEnvironment::default(),
        tx,
    );

    let shutdown = Shutdown::new();
    supervisor.run(shutdown.subscribe()).await;
    assert_eq!(*rx.borrow(), WatcherStatus::Disabled);
}

#[tokio::test]
async fn test_missing_binary_fails_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let (sup, _rx) = supervisor(
        dir.path(),
        dir.path(),
        ExecutionEnvironment::default(),
        dir.path().join("does-not-exist"),
    );
    let error = sup.run_attempt(&Shutdown::new().subscribe()).await;
    assert!(matches!(error, WatcherError::Spawn { .. }), "{error}");
}
