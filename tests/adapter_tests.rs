//! Tests for the pure helpers behind the Kubernetes adapters

use std::time::Duration;

use chrono::Utc;
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, PodStatus};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{
    ObjectMeta, Status, StatusCause, StatusDetails, Time,
};
use executor_operator::adapters::pod_lister::containers_from_pods;
use executor_operator::adapters::remote_exec::{classify_status, split_command};
use executor_operator::adapters::{ContainerIdentity, ExecFailure};

// ============================================================================
// Test Helpers
// ============================================================================

fn container(name: &str) -> Container {
    Container {
        name: name.to_string(),
        ..Default::default()
    }
}

fn pod(name: &str, phase: &str, containers: &[&str]) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("default".to_string()),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: containers.iter().map(|c| container(c)).collect(),
            ..Default::default()
        }),
        status: Some(PodStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
    }
}

fn exit_status(code: &str) -> Status {
    Status {
        status: Some("Failure".to_string()),
        reason: Some("NonZeroExitCode".to_string()),
        message: Some(format!(
            "command terminated with non-zero exit code: exit status {}",
            code
        )),
        details: Some(StatusDetails {
            causes: Some(vec![StatusCause {
                reason: Some("ExitCode".to_string()),
                message: Some(code.to_string()),
                field: None,
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

// ============================================================================
// Pod Discovery Tests
// ============================================================================

#[test]
fn running_pods_flatten_in_list_then_spec_order() {
    let pods = vec![
        pod("app-0", "Running", &["web-1", "db-1"]),
        pod("app-1", "Running", &["web-2"]),
    ];

    let identities = containers_from_pods("default", &pods);
    assert_eq!(
        identities,
        vec![
            ContainerIdentity::new("default", "app-0", "web-1"),
            ContainerIdentity::new("default", "app-0", "db-1"),
            ContainerIdentity::new("default", "app-1", "web-2"),
        ]
    );
}

#[test]
fn pending_and_finished_pods_are_skipped() {
    let pods = vec![
        pod("pending", "Pending", &["web"]),
        pod("done", "Succeeded", &["web"]),
        pod("failed", "Failed", &["web"]),
        pod("live", "Running", &["web"]),
    ];

    let identities = containers_from_pods("default", &pods);
    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].pod_name, "live");
}

#[test]
fn terminating_pods_are_skipped() {
    let mut terminating = pod("old", "Running", &["web"]);
    terminating.metadata.deletion_timestamp = Some(Time(Utc::now()));

    assert!(containers_from_pods("default", &[terminating]).is_empty());
}

#[test]
fn init_containers_are_not_targets() {
    let mut p = pod("app-0", "Running", &["web"]);
    if let Some(spec) = p.spec.as_mut() {
        spec.init_containers = Some(vec![container("web-init")]);
    }

    let identities = containers_from_pods("default", &[p]);
    assert_eq!(identities.len(), 1);
    assert_eq!(identities[0].container_name, "web");
}

#[test]
fn pods_without_status_are_skipped() {
    let mut p = pod("app-0", "Running", &["web"]);
    p.status = None;
    assert!(containers_from_pods("default", &[p]).is_empty());
}

// ============================================================================
// Exec Status Classification Tests
// ============================================================================

#[test]
fn success_status_is_not_a_failure() {
    let status = Status {
        status: Some("Success".to_string()),
        ..Default::default()
    };
    assert_eq!(classify_status(&status, ""), None);
}

#[test]
fn non_zero_exit_code_is_parsed() {
    let failure = classify_status(&exit_status("3"), "bad things\n");
    assert_eq!(
        failure,
        Some(ExecFailure::NonZeroExit {
            code: Some(3),
            detail: "bad things".to_string(),
        })
    );
}

#[test]
fn exit_code_127_is_command_not_found() {
    let failure = classify_status(&exit_status("127"), "");
    assert!(matches!(failure, Some(ExecFailure::CommandNotFound(_))));
}

#[test]
fn missing_executable_message_is_command_not_found() {
    let status = Status {
        status: Some("Failure".to_string()),
        message: Some(
            "OCI runtime exec failed: exec: \"nope\": executable file not found in $PATH"
                .to_string(),
        ),
        ..Default::default()
    };
    assert!(matches!(
        classify_status(&status, ""),
        Some(ExecFailure::CommandNotFound(_))
    ));
}

#[test]
fn other_failures_are_connection_failures() {
    let status = Status {
        status: Some("Failure".to_string()),
        message: Some("container web not found in pod app-0".to_string()),
        ..Default::default()
    };
    assert_eq!(
        classify_status(&status, ""),
        Some(ExecFailure::Connection(
            "container web not found in pod app-0".to_string()
        ))
    );
}

// ============================================================================
// Command Splitting Tests
// ============================================================================

#[test]
fn command_splits_on_whitespace() {
    assert_eq!(split_command("echo  hi\tthere"), vec!["echo", "hi", "there"]);
}

#[test]
fn blank_command_has_no_argv() {
    assert!(split_command("   ").is_empty());
}

#[test]
fn failure_kinds_are_stable_labels() {
    assert_eq!(ExecFailure::DeadlineExceeded.kind(), "deadline_exceeded");
    assert_eq!(ExecFailure::Cancelled.kind(), "cancelled");
    assert_eq!(
        ExecFailure::NonZeroExit {
            code: None,
            detail: String::new()
        }
        .to_string(),
        "command exited with code unknown: "
    );
}

#[test]
fn timeouts_print_whole_seconds_or_milliseconds() {
    assert_eq!(
        ExecFailure::TimedOut(Duration::from_secs(5)).to_string(),
        "timed out after 5s"
    );
    assert_eq!(
        ExecFailure::TimedOut(Duration::from_nanos(46_152_658)).to_string(),
        "timed out after 46ms"
    );
}
