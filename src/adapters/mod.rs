//! Adapters between the reconciler and the Kubernetes API

pub mod executor_store;
pub mod pod_lister;
pub mod remote_exec;

pub use executor_store::{ExecutorStore, KubeExecutorStore};
pub use pod_lister::{ClusterStateReader, ContainerIdentity, KubePodLister};
pub use remote_exec::{ExecFailure, ExecOutput, KubeRemoteExecutor, RemoteExecutor};
