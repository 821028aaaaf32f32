//! Execution context configuration.

use kiln_core::logging::DEFAULT_BUFFER_CAPACITY;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default bound for [`Context::await_termination`](super::Context::await_termination).
pub const DEFAULT_QUIESCENCE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// What a failing operator does to the rest of its run.
///
/// Either way the run ends [`RunStatus::Failed`](crate::RunStatus::Failed).
/// Only [`AbortRun`](Self::AbortRun) sets the run-wide abort flag; the
/// default [`ContainBranch`](Self::ContainBranch) leaves
/// [`Schedule::is_aborted`](crate::Schedule::is_aborted) false after a
/// failure, unlike a tracker that aborts on the first failed rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Stop propagation from the failing item only; independent branches
    /// still complete. The abort flag stays clear.
    #[default]
    ContainBranch,
    /// Also abort the whole run, as if [`Schedule::abort`](crate::Schedule::abort)
    /// had been called.
    AbortRun,
}

impl FailurePolicy {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContainBranch => "contain",
            Self::AbortRun => "abort",
        }
    }
}

impl fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "contain" | "contain_branch" | "contain-branch" => Ok(Self::ContainBranch),
            "abort" | "abort_run" | "abort-run" => Ok(Self::AbortRun),
            other => Err(format!("unknown failure policy '{}'", other)),
        }
    }
}

/// Configuration for an execution [`Context`](super::Context).
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Maximum number of operators applying concurrently.
    pub workers: usize,
    /// Bound used by `await_termination`.
    pub quiescence_timeout: Duration,
    /// Name given to worker threads.
    pub thread_name: String,
    /// Capacity of the structured log ring buffer.
    pub log_buffer_capacity: usize,
    /// How operator failures affect the rest of a run.
    pub failure_policy: FailurePolicy,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            quiescence_timeout: DEFAULT_QUIESCENCE_TIMEOUT,
            thread_name: "kiln-worker".to_string(),
            log_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ContextConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `KILN_WORKERS`: Number of worker threads
    /// - `KILN_QUIESCENCE_TIMEOUT_MS`: Default termination wait in milliseconds
    /// - `KILN_FAILURE_POLICY`: `contain` or `abort`
    /// - `KILN_LOG_BUFFER`: Capacity of the structured log buffer
    ///
    /// Unset or unparsable values fall back to the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let workers = lookup("KILN_WORKERS")
            .and_then(|s| s.parse::<usize>().ok())
            .filter(|&n| n > 0)
            .unwrap_or(defaults.workers);

        let quiescence_timeout = lookup("KILN_QUIESCENCE_TIMEOUT_MS")
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.quiescence_timeout);

        let failure_policy = match lookup("KILN_FAILURE_POLICY") {
            Some(s) => s.parse().unwrap_or_else(|err| {
                tracing::warn!(error = %err, "Ignoring KILN_FAILURE_POLICY");
                defaults.failure_policy
            }),
            None => defaults.failure_policy,
        };

        let log_buffer_capacity = lookup("KILN_LOG_BUFFER")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.log_buffer_capacity);

        Self {
            workers,
            quiescence_timeout,
            thread_name: defaults.thread_name,
            log_buffer_capacity,
            failure_policy,
        }
    }

    /// Set the number of worker threads.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1); // At least 1
        self
    }

    /// Set the default termination wait.
    pub fn with_quiescence_timeout(mut self, timeout: Duration) -> Self {
        self.quiescence_timeout = timeout;
        self
    }

    /// Set the worker thread name.
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the structured log buffer capacity.
    pub fn with_log_buffer_capacity(mut self, capacity: usize) -> Self {
        self.log_buffer_capacity = capacity;
        self
    }

    /// Set the failure policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ContextConfig::default();
        assert!(config.workers >= 1);
        assert_eq!(config.quiescence_timeout, Duration::from_secs(300));
        assert_eq!(config.failure_policy, FailurePolicy::ContainBranch);
        assert_eq!(config.thread_name, "kiln-worker");
    }

    #[test]
    fn reads_variables() {
        let config = ContextConfig::from_lookup(lookup(&[
            ("KILN_WORKERS", "3"),
            ("KILN_QUIESCENCE_TIMEOUT_MS", "250"),
            ("KILN_FAILURE_POLICY", "abort"),
            ("KILN_LOG_BUFFER", "64"),
        ]));

        assert_eq!(config.workers, 3);
        assert_eq!(config.quiescence_timeout, Duration::from_millis(250));
        assert_eq!(config.failure_policy, FailurePolicy::AbortRun);
        assert_eq!(config.log_buffer_capacity, 64);
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = ContextConfig::from_lookup(lookup(&[
            ("KILN_WORKERS", "0"),
            ("KILN_FAILURE_POLICY", "explode"),
        ]));
        let defaults = ContextConfig::default();

        assert_eq!(config.workers, defaults.workers);
        assert_eq!(config.failure_policy, FailurePolicy::ContainBranch);
    }

    #[test]
    fn builder_clamps_workers() {
        let config = ContextConfig::default()
            .with_workers(0)
            .with_failure_policy(FailurePolicy::AbortRun);
        assert_eq!(config.workers, 1);
        assert_eq!(config.failure_policy.to_string(), "abort");
    }
}
