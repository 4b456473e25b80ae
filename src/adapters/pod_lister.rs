//! Discovery of live containers in a namespace

use std::fmt;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::{Api, Client};

use crate::{Error, Result};

/// One container inside one pod
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ContainerIdentity {
    pub namespace: String,
    pub pod_name: String,
    pub container_name: String,
}

impl ContainerIdentity {
    pub fn new(
        namespace: impl Into<String>,
        pod_name: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
            container_name: container_name.into(),
        }
    }
}

impl fmt::Display for ContainerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pod_name, self.container_name)
    }
}

/// Lists live containers in a namespace
#[async_trait]
pub trait ClusterStateReader: Send + Sync {
    /// Containers in discovery order
    async fn list_containers(&self, namespace: &str) -> Result<Vec<ContainerIdentity>>;
}

/// ClusterStateReader backed by the Kubernetes pod API
pub struct KubePodLister {
    client: Client,
}

impl KubePodLister {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterStateReader for KubePodLister {
    async fn list_containers(&self, namespace: &str) -> Result<Vec<ContainerIdentity>> {
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let list = pods.list(&ListParams::default()).await.map_err(|e| {
            Error::ClusterReadError(format!("Failed to list pods in {}: {}", namespace, e))
        })?;

        Ok(containers_from_pods(namespace, &list.items))
    }
}

/// Flatten running pods into container identities
///
/// Pods keep their list order and containers keep their spec order. Pods that
/// are not `Running` or are terminating are skipped, as are init containers.
pub fn containers_from_pods(namespace: &str, pods: &[Pod]) -> Vec<ContainerIdentity> {
    pods.iter()
        .filter(|pod| is_live(pod))
        .flat_map(|pod| {
            let pod_name = pod.metadata.name.clone().unwrap_or_default();
            pod.spec
                .iter()
                .flat_map(|spec| spec.containers.iter())
                .map(move |c| ContainerIdentity::new(namespace, pod_name.clone(), c.name.clone()))
        })
        .collect()
}

fn is_live(pod: &Pod) -> bool {
    if pod.metadata.name.is_none() || pod.metadata.deletion_timestamp.is_some() {
        return false;
    }
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .map(|phase| phase == "Running")
        .unwrap_or(false)
}
