//! Error types for the Executor Operator

use std::time::Duration;

/// Result type for the operator
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the operator
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeError(String),
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),
    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Listing pods in a namespace failed
    #[error("Cluster read error: {0}")]
    ClusterReadError(String),
    /// Writing the Executor status failed
    #[error("Status write error: {0}")]
    StatusWriteError(String),
}

impl Error {
    /// Delay before the dispatcher should retry after this error
    pub fn retry_after(&self, base: Duration) -> Duration {
        match self {
            Error::KubeError(_) | Error::ClusterReadError(_) | Error::StatusWriteError(_) => base,
            Error::ConfigError(_) | Error::ValidationError(_) => base * 10,
        }
    }
}
