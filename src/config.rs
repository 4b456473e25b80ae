//! Operator configuration read from the environment

use std::time::Duration;

use crate::{Error, Result};

/// Default metrics port
pub const DEFAULT_METRICS_PORT: u16 = 8080;
/// Default per-container execution timeout in seconds
pub const DEFAULT_EXEC_TIMEOUT_SECS: u64 = 30;
/// Default retry delay in seconds for transient failures
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 30;
/// Default number of concurrent reconciliations
pub const DEFAULT_CONCURRENCY: u16 = 4;
/// Default time in seconds in-flight passes get to wind down on shutdown
pub const DEFAULT_SHUTDOWN_GRACE_SECS: u64 = 10;

/// Runtime settings for the operator
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperatorConfig {
    /// Port for the metrics and health endpoints
    pub metrics_port: u16,
    /// Namespace to watch; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Timeout for a single container execution
    pub exec_timeout: Duration,
    /// Delay requested from the dispatcher on transient failures
    pub retry_delay: Duration,
    /// Maximum number of concurrent reconciliations
    pub concurrency: u16,
    /// How long cancelled passes may take to finish on shutdown
    pub shutdown_grace: Duration,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            metrics_port: DEFAULT_METRICS_PORT,
            watch_namespace: None,
            exec_timeout: Duration::from_secs(DEFAULT_EXEC_TIMEOUT_SECS),
            retry_delay: Duration::from_secs(DEFAULT_RETRY_DELAY_SECS),
            concurrency: DEFAULT_CONCURRENCY,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_GRACE_SECS),
        }
    }
}

impl OperatorConfig {
    /// Read configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    ///
    /// Unset or empty variables fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(port) = get("METRICS_PORT") {
            config.metrics_port = parse(&port, "METRICS_PORT")?;
        }

        config.watch_namespace = get("WATCH_NAMESPACE").map(|ns| ns.trim().to_string());

        if let Some(secs) = get("EXEC_TIMEOUT_SECS") {
            let secs: u64 = parse(&secs, "EXEC_TIMEOUT_SECS")?;
            if secs == 0 {
                return Err(Error::ConfigError(
                    "EXEC_TIMEOUT_SECS must be greater than 0".to_string(),
                ));
            }
            config.exec_timeout = Duration::from_secs(secs);
        }

        if let Some(secs) = get("RETRY_DELAY_SECS") {
            config.retry_delay = Duration::from_secs(parse(&secs, "RETRY_DELAY_SECS")?);
        }

        if let Some(n) = get("RECONCILE_CONCURRENCY") {
            let n: u16 = parse(&n, "RECONCILE_CONCURRENCY")?;
            if n == 0 {
                return Err(Error::ConfigError(
                    "RECONCILE_CONCURRENCY must be at least 1".to_string(),
                ));
            }
            config.concurrency = n;
        }

        if let Some(secs) = get("SHUTDOWN_GRACE_SECS") {
            config.shutdown_grace = Duration::from_secs(parse(&secs, "SHUTDOWN_GRACE_SECS")?);
        }

        Ok(config)
    }
}

fn parse<T: std::str::FromStr>(value: &str, key: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::ConfigError(format!("{} has invalid value '{}'", key, value)))
}
