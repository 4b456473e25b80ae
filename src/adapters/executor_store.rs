//! Access to Executor resources in the Kubernetes API

use async_trait::async_trait;
use kube::api::{Patch, PatchParams};
use kube::{Api, Client};

use crate::crd::{Executor, ExecutorStatus};
use crate::{Error, Result};

/// Reads Executor declarations and writes their status
#[async_trait]
pub trait ExecutorStore: Send + Sync {
    /// Fetch a declaration; `Ok(None)` when it no longer exists
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Executor>>;

    /// Replace the status of a declaration
    async fn patch_status(&self, namespace: &str, name: &str, status: &ExecutorStatus)
        -> Result<()>;
}

/// ExecutorStore backed by the Kubernetes API server
pub struct KubeExecutorStore {
    client: Client,
}

impl KubeExecutorStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExecutorStore for KubeExecutorStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<Option<Executor>> {
        let executors: Api<Executor> = Api::namespaced(self.client.clone(), namespace);
        match executors.get(name).await {
            Ok(executor) => Ok(Some(executor)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(None),
            Err(e) => Err(Error::KubeError(format!(
                "Failed to get Executor {}/{}: {}",
                namespace, name, e
            ))),
        }
    }

    async fn patch_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ExecutorStatus,
    ) -> Result<()> {
        let executors: Api<Executor> = Api::namespaced(self.client.clone(), namespace);
        let patch = serde_json::json!({
            "status": status
        });

        executors
            .patch_status(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await
            .map_err(|e| Error::StatusWriteError(format!("Failed to update status: {}", e)))?;

        Ok(())
    }
}
