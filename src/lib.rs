//! Application health agent library.

pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod report;
pub mod resilience;
pub mod watcher;

pub use config::AgentConfig;
pub use lifecycle::{Agent, Shutdown};
pub use watcher::WatcherSupervisor;
