//! Application health agent.
//!
//! # Architecture Overview
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────┐
//!   │                       APPLICATION HEALTH AGENT                   │
//!   │                                                                  │
//!   │  ┌────────────┐   sample   ┌────────────┐  committed  ┌────────┐ │
//!   │  │   probe    │──────────▶│ committer  │───────────▶│ report │─┼──▶ <seq>.status
//!   │  │ tcp/http/  │            │ consecutive│             │  sink  │ │
//!   │  │  default   │            │  + grace   │      ┌─────▶│        │ │
//!   │  └────────────┘            └────────────┘      │      └────────┘ │
//!   │        ▲ control loop (lifecycle::agent)       │ latest status   │
//!   │        │                                       │                 │
//!   │  ┌─────┴──────┐                         ┌──────┴──────┐          │
//!   │  │  shutdown  │────────────────────────▶│  watcher    │──spawn──┼──▶ vmwatch
//!   │  │ flag+signal│                         │ supervisor  │ limits   │   (cgroup /
//!   │  └────────────┘                         │ + heartbeat │          │   systemd-run)
//!   │                                         └─────────────┘          │
//!   └──────────────────────────────────────────────────────────────────┘
//! ```

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use app_health_agent::config::{load_config, AgentConfig, ExecutionEnvironment};
use app_health_agent::health::{CustomMetrics, Probe};
use app_health_agent::lifecycle::{signals, Agent, Shutdown};
use app_health_agent::observability::{logging, metrics};
use app_health_agent::report::JsonStatusFile;
use app_health_agent::watcher::{status_channel, WatcherSupervisor};

#[derive(Parser)]
#[command(name = "apphealth-agent")]
#[command(about = "Application health probe and watcher supervisor", long_about = None)]
#[command(version)]
struct Cli {
    /// Agent configuration file (TOML).
    #[arg(short, long)]
    config: PathBuf,

    /// Sequence number used to name the status file.
    #[arg(long, default_value_t = 0)]
    sequence_number: u64,

    /// Agent version passed on to the watcher.
    #[arg(long)]
    version_string: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the probe loop and watcher until a termination signal
    Enable,
    /// Evaluate the probe once and print the sample
    Check,
    /// Load and validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Enable => enable(config, cli.sequence_number, cli.version_string).await,
        Commands::Check => check(&config).await,
        Commands::Validate => {
            println!("Configuration {} is valid", cli.config.display());
            Ok(())
        }
    }
}

async fn enable(
    config: AgentConfig,
    sequence_number: u64,
    version: Option<String>,
) -> Result<(), Box<dyn Error>> {
    logging::init(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        sequence_number,
        "apphealth-agent starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(e) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    error = %e,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let probe = Probe::from_config(&config.probe)?;
    let env = ExecutionEnvironment::from_env();
    tracing::info!(
        probe = %probe.describe(),
        environment = env.label(),
        watcher_enabled = config.watcher.enabled,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    let listener = signals::spawn_listener(shutdown.clone());

    let (status_tx, status_rx) = status_channel();
    let supervisor = WatcherSupervisor::new(
        config.watcher.clone(),
        config.paths.clone(),
        env,
        status_tx,
    )
    .with_agent_version(version);
    let supervisor = tokio::spawn(supervisor.run(shutdown.subscribe()));

    let sink = JsonStatusFile::new(config.paths.status_folder.clone(), sequence_number);
    Agent::new(probe, &config.probe, status_rx, Box::new(sink))
        .run(shutdown.subscribe())
        .await;

    if let Err(e) = supervisor.await {
        tracing::error!(error = %e, "Watcher supervisor task failed");
    }
    listener.abort();

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn check(config: &AgentConfig) -> Result<(), Box<dyn Error>> {
    let probe = Probe::from_config(&config.probe)?;
    let sample = probe.evaluate().await;

    let custom_metrics = match &sample.custom_metrics {
        CustomMetrics::Absent => None,
        CustomMetrics::Valid(raw) => Some(raw.clone()),
        CustomMetrics::Invalid { reason, .. } => Some(reason.clone()),
    };
    let output = serde_json::json!({
        "probe": probe.describe(),
        "state": sample.state,
        "observedAt": sample.observed_at,
        "customMetrics": custom_metrics,
        "error": sample.error.map(|e| e.to_string()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
