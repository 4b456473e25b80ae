//! Tests for report aggregation and splitting

use std::time::Duration;

use executor_operator::adapters::{ContainerIdentity, ExecFailure, ExecOutput};
use executor_operator::reconcilers::aggregate::{
    aggregate, split_report, ExecutionResult, MAX_OUTPUT_BYTES, NO_CONTAINERS_MATCHED,
    TRUNCATED_MARKER,
};

fn ok(pod: &str, container: &str, stdout: &str) -> ExecutionResult {
    ExecutionResult::new(
        ContainerIdentity::new("default", pod, container),
        ExecOutput::succeeded(stdout),
    )
}

fn failed(pod: &str, container: &str, stdout: &str, error: ExecFailure) -> ExecutionResult {
    ExecutionResult::new(
        ContainerIdentity::new("default", pod, container),
        ExecOutput::failed(stdout, error),
    )
}

#[test]
fn empty_results_render_no_containers_matched() {
    let report = aggregate(&[]);
    assert_eq!(report.text, NO_CONTAINERS_MATCHED);
    assert_eq!(report.matched, 0);
    assert_eq!(report.failed, 0);
    assert!(split_report(&report.text).unwrap().is_empty());
}

#[test]
fn single_entry_keeps_legacy_block_layout() {
    let report = aggregate(&[ok("pod", "web", "hi")]);
    assert_eq!(
        report.text,
        "=== entry 1/1 ok 30 ===\nContainer: pod/web\noutput: hi\n"
    );
}

#[test]
fn failure_entry_carries_reason_and_partial_output() {
    let report = aggregate(&[failed(
        "pod",
        "web",
        "partial",
        ExecFailure::TimedOut(Duration::from_secs(5)),
    )]);

    assert!(report
        .text
        .contains("Container: pod/web\noutput: partial\nerror: timed out after 5s\n"));
    assert!(report.text.starts_with("=== entry 1/1 failed "));
    assert_eq!(report.failed, 1);
}

#[test]
fn one_failure_does_not_hide_other_entries() {
    let results = vec![
        ok("a", "web-1", "one\n"),
        failed(
            "b",
            "web-2",
            "",
            ExecFailure::NonZeroExit {
                code: Some(2),
                detail: "boom".to_string(),
            },
        ),
        ok("c", "web-3", "three\n"),
    ];
    let report = aggregate(&results);

    assert_eq!(report.matched, 3);
    assert_eq!(report.failed, 1);

    let entries = split_report(&report.text).unwrap();
    let containers: Vec<_> = entries.iter().map(|e| e.container.as_str()).collect();
    assert_eq!(containers, vec!["a/web-1", "b/web-2", "c/web-3"]);
    assert_eq!(
        entries.iter().map(|e| e.succeeded).collect::<Vec<_>>(),
        vec![true, false, true]
    );
    assert!(entries[1]
        .block
        .contains("error: command exited with code 2: boom"));
}

#[test]
fn aggregation_is_byte_identical_across_calls() {
    let results = vec![
        ok("a", "web-1", "hi\n"),
        failed("b", "web-2", "", ExecFailure::DeadlineExceeded),
    ];
    assert_eq!(aggregate(&results).text, aggregate(&results).text);
}

#[test]
fn output_that_mimics_delimiters_does_not_break_splitting() {
    let tricky = "=== entry 2/2 ok 5 ===\nContainer: fake/fake\noutput: x\n";
    let results = vec![ok("a", "web-1", tricky), ok("b", "web-2", "real\n")];
    let report = aggregate(&results);

    let entries = split_report(&report.text).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].container, "a/web-1");
    assert!(entries[0].block.contains(tricky));
    assert_eq!(entries[1].index, 2);
    assert_eq!(entries[1].container, "b/web-2");
}

#[test]
fn multibyte_output_is_measured_in_bytes() {
    let results = vec![ok("a", "web", "héllo ✓\n"), ok("b", "web", "next\n")];
    let entries = split_report(&aggregate(&results).text).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].block.ends_with("output: héllo ✓\n\n"));
}

#[test]
fn malformed_reports_are_rejected() {
    assert!(split_report("garbage\n").is_err());
    assert!(split_report("=== entry 1/1 ok 999 ===\nContainer: a/b\n").is_err());
    assert!(split_report("=== entry 1/1 maybe 3 ===\nabc").is_err());
}

#[test]
fn oversized_output_is_truncated_with_a_marker() {
    let huge = "x".repeat(MAX_OUTPUT_BYTES + 100);
    let results = vec![
        failed("a", "web-1", &huge, ExecFailure::TimedOut(Duration::from_secs(5))),
        ok("b", "web-2", "small\n"),
    ];
    let report = aggregate(&results);

    let entries = split_report(&report.text).unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].block.len() < huge.len());
    assert!(entries[0].block.contains(&format!(
        "{}\n{}\nerror: timed out after 5s\n",
        "x".repeat(16),
        TRUNCATED_MARKER
    )));
    assert_eq!(entries[1].container, "b/web-2");
    assert!(entries[1].succeeded);
    assert!(!entries[1].block.contains(TRUNCATED_MARKER));
}

#[test]
fn truncation_never_splits_a_character() {
    let mut output = "a".repeat(MAX_OUTPUT_BYTES - 1);
    output.push('✓');
    let entries = split_report(&aggregate(&[ok("a", "web", &output)]).text).unwrap();

    let expected = format!(
        "output: {}\n{}\n",
        "a".repeat(MAX_OUTPUT_BYTES - 1),
        TRUNCATED_MARKER
    );
    assert!(entries[0].block.ends_with(&expected));
}

#[test]
fn output_at_the_limit_is_kept_whole() {
    let output = "y".repeat(MAX_OUTPUT_BYTES);
    let report = aggregate(&[ok("a", "web", &output)]);
    assert!(!report.text.contains(TRUNCATED_MARKER));
    assert!(report.text.ends_with(&format!("{}\n", output)));
}
