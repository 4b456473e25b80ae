//! Executor Kubernetes Operator
//!
//! Runs a declared command inside every live container whose name contains a
//! declared pattern, and publishes the aggregated output on the `Executor`
//! custom resource's status.

pub mod adapters;
pub mod config;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod reconcilers;

pub use error::{Error, Result};
