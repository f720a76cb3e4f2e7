//! Environment toggles that change how the watcher is launched.

/// Set when the agent runs inside a development container.
pub const DEV_CONTAINER_VAR: &str = "RUNNING_IN_DEV_CONTAINER";

/// Set to tolerate failures when assigning the watcher to a resource group.
pub const ALLOW_CGROUP_FAILURE_VAR: &str = "ALLOW_VMWATCH_CGROUP_ASSIGNMENT_FAILURE";

/// Markers read once from the process environment at startup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionEnvironment {
    /// Running in a dev container: skip the metadata service, report `Test`.
    pub dev_container: bool,
    /// Operator asked to tolerate resource-group assignment failures.
    pub allow_cgroup_failure: bool,
}

impl ExecutionEnvironment {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup (used by tests).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            dev_container: is_truthy(lookup(DEV_CONTAINER_VAR)),
            allow_cgroup_failure: is_truthy(lookup(ALLOW_CGROUP_FAILURE_VAR)),
        }
    }

    /// Resource-governance failures are only tolerated when both markers are set.
    pub fn tolerates_governor_failure(&self) -> bool {
        self.dev_container && self.allow_cgroup_failure
    }

    /// Value passed as `--execution-environment`.
    pub fn label(&self) -> &'static str {
        if self.dev_container {
            "Test"
        } else {
            "Prod"
        }
    }
}

fn is_truthy(value: Option<String>) -> bool {
    match value {
        Some(v) => {
            let v = v.trim();
            !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false")
        }
        None => false,
    }
}
