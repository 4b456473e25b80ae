//! Tests for the Executor custom resource and its validation

use executor_operator::crd::{generate_crds, Executor, ExecutorSpec, ExecutorStatus};
use executor_operator::reconcilers::executor::{exec_timeout, validate};
use std::time::Duration;

fn executor(command: &str, timeout_seconds: Option<u64>) -> Executor {
    Executor::new(
        "test-executor",
        ExecutorSpec {
            container_name_pattern: "web".to_string(),
            command: command.to_string(),
            timeout_seconds,
        },
    )
}

#[test]
fn crd_manifest_describes_executor_kind() {
    let crds = generate_crds().unwrap();
    assert_eq!(crds.len(), 1);
    let yaml = &crds[0];
    assert!(yaml.contains("executors.exec.chocolate-chip-stack.stackathon"));
    assert!(yaml.contains("kind: Executor"));
    assert!(yaml.contains("containerNamePattern"));
    assert!(yaml.contains("observedOutput"));
}

#[test]
fn spec_uses_camel_case_fields() {
    let spec: ExecutorSpec = serde_json::from_value(serde_json::json!({
        "containerNamePattern": "web",
        "command": "echo hi",
        "timeoutSeconds": 5
    }))
    .unwrap();

    assert_eq!(spec.container_name_pattern, "web");
    assert_eq!(spec.command, "echo hi");
    assert_eq!(spec.timeout_seconds, Some(5));
}

#[test]
fn legacy_container_name_field_is_accepted() {
    let spec: ExecutorSpec = serde_json::from_value(serde_json::json!({
        "containerName": "db",
        "command": "date"
    }))
    .unwrap();

    assert_eq!(spec.container_name_pattern, "db");
    assert_eq!(spec.timeout_seconds, None);
}

#[test]
fn missing_pattern_defaults_to_match_all() {
    let spec: ExecutorSpec =
        serde_json::from_value(serde_json::json!({ "command": "date" })).unwrap();
    assert_eq!(spec.container_name_pattern, "");
}

#[test]
fn status_serializes_observed_output() {
    let status = ExecutorStatus {
        observed_output: Some("No containers matched\n".to_string()),
        matched_containers: Some(0),
        ..Default::default()
    };
    let value = serde_json::to_value(&status).unwrap();
    assert_eq!(value["observedOutput"], "No containers matched\n");
    assert_eq!(value["matchedContainers"], 0);
    assert!(value.get("conditions").is_none());
}

#[test]
fn valid_spec_passes_validation() {
    assert!(validate(&executor("echo hi", None)).is_ok());
    assert!(validate(&executor("echo hi", Some(1))).is_ok());
}

#[test]
fn blank_command_fails_validation() {
    let err = validate(&executor(" \t", None)).unwrap_err();
    assert!(err.to_string().to_lowercase().contains("command"));
}

#[test]
fn zero_timeout_fails_validation() {
    let err = validate(&executor("echo hi", Some(0))).unwrap_err();
    assert!(err.to_string().contains("timeoutSeconds"));
}

#[test]
fn timeout_override_wins_over_default() {
    let default = Duration::from_secs(30);
    assert_eq!(exec_timeout(&executor("x", None), default), default);
    assert_eq!(
        exec_timeout(&executor("x", Some(7)), default),
        Duration::from_secs(7)
    );
}
