//! Controller implementations for watching and reconciling resources

pub mod executor_controller;

use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::adapters::{KubeExecutorStore, KubePodLister, KubeRemoteExecutor};
use crate::config::OperatorConfig;
use crate::reconcilers::{ReconcileSettings, Reconciler};

/// Shared context for controllers
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Runs reconciliation passes
    pub reconciler: Reconciler,
    /// Cancelled when the operator shuts down; every pass gets a child token
    pub shutdown: CancellationToken,
    /// Operator settings
    pub config: OperatorConfig,
}

impl Context {
    /// Create a context wired to the Kubernetes API
    pub fn new(client: Client, config: OperatorConfig, shutdown: CancellationToken) -> Arc<Self> {
        let reconciler = Reconciler::new(
            Arc::new(KubeExecutorStore::new(client.clone())),
            Arc::new(KubePodLister::new(client.clone())),
            Arc::new(KubeRemoteExecutor::new(client.clone())),
            ReconcileSettings::from(&config),
        );
        Arc::new(Self {
            client,
            reconciler,
            shutdown,
            config,
        })
    }
}

/// Cancel in-flight passes and wait up to `grace` for `task` to finish
///
/// Passes observe the cancellation, skip their status write and return, so
/// the task can stop cleanly. A task still running after `grace` is aborted.
/// Returns the task's output when it finished in time.
pub async fn drain<T>(
    shutdown: &CancellationToken,
    task: &mut JoinHandle<T>,
    grace: Duration,
) -> Option<T> {
    shutdown.cancel();

    match tokio::time::timeout(grace, &mut *task).await {
        Ok(Ok(output)) => {
            info!("Controller drained");
            Some(output)
        }
        Ok(Err(e)) => {
            warn!("Controller task failed while draining: {}", e);
            None
        }
        Err(_) => {
            warn!("Controller did not stop within {:?}, aborting", grace);
            task.abort();
            None
        }
    }
}
