//! Executor Custom Resource Definition

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Executor resource specification
///
/// Declares a command to run inside every live container whose name contains
/// `containerNamePattern`.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "exec.chocolate-chip-stack.stackathon",
    version = "v1",
    kind = "Executor",
    plural = "executors",
    singular = "executor",
    shortname = "exe",
    namespaced,
    status = "ExecutorStatus",
    printcolumn = r#"{"name": "Pattern", "type": "string", "jsonPath": ".spec.containerNamePattern"}"#,
    printcolumn = r#"{"name": "Command", "type": "string", "jsonPath": ".spec.command"}"#,
    printcolumn = r#"{"name": "Matched", "type": "integer", "jsonPath": ".status.matchedContainers"}"#,
    printcolumn = r#"{"name": "Failed", "type": "integer", "jsonPath": ".status.failedContainers"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorSpec {
    /// Substring matched against live container names.
    /// An empty pattern matches every container.
    #[serde(default, alias = "containerName")]
    pub container_name_pattern: String,

    /// Command executed in each matched container
    pub command: String,

    /// Per-container execution timeout override in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
}

/// Executor status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExecutorStatus {
    /// Aggregate report of the last completed pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_output: Option<String>,

    /// Number of containers matched in the last pass
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_containers: Option<u32>,

    /// Number of matched containers whose execution failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_containers: Option<u32>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Generation of the spec the output was computed for
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observed_generation: Option<i64>,

    /// Last update time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update_time: Option<DateTime<Utc>>,

    /// Status conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Status condition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type (Ready, ClusterStateRead)
    #[serde(rename = "type")]
    pub type_: String,

    /// Status (True, False, Unknown)
    pub status: String,

    /// Last transition time
    pub last_transition_time: DateTime<Utc>,

    /// Reason for the condition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Condition {
    /// Build a condition stamped with the given transition time
    pub fn new(
        type_: &str,
        ok: bool,
        reason: &str,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            type_: type_.to_string(),
            status: if ok { "True" } else { "False" }.to_string(),
            last_transition_time: now,
            reason: Some(reason.to_string()),
            message: Some(message.into()),
        }
    }
}
