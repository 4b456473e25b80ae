//! Custom Resource Definitions for the Executor Operator

mod executor;

pub use executor::*;

use kube::CustomResourceExt;

use crate::{Error, Result};

/// Generate CRD YAML manifests for all custom resources
pub fn generate_crds() -> Result<Vec<String>> {
    let crd = serde_yaml::to_string(&Executor::crd())
        .map_err(|e| Error::ConfigError(format!("Failed to render Executor CRD: {}", e)))?;
    Ok(vec![crd])
}
