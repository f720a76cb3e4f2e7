//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AgentConfig (validated, immutable)
//!     → handed to the probe loop and the watcher supervisor
//!
//! process environment
//!     → environment.rs (dev-container / cgroup-override markers)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod environment;
pub mod loader;
pub mod schema;
pub mod validation;

pub use environment::ExecutionEnvironment;
pub use loader::{load_config, ConfigError};
pub use schema::{
    AgentConfig, LogFormat, ObservabilityConfig, PathsConfig, ProbeConfig, ProbeProtocol,
    SignalFilters, WatcherConfig,
};
