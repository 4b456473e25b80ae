//! Reconciliation logic for Executor resources

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapters::executor_store::ExecutorStore;
use crate::adapters::pod_lister::ClusterStateReader;
use crate::adapters::remote_exec::{ExecFailure, ExecOutput, RemoteExecutor};
use crate::config::OperatorConfig;
use crate::crd::{Condition, Executor, ExecutorStatus};
use crate::metrics::prometheus::{
    CONTAINER_EXECUTIONS, EXEC_DURATION, MATCHED_CONTAINERS, RECONCILIATION_ERRORS,
    STATUS_WRITE_FAILURES,
};
use crate::reconcilers::aggregate::{aggregate, ExecutionResult, Report};
use crate::reconcilers::matcher::match_containers;
use crate::{Error, Result};

/// What the dispatcher should do after a pass
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The pass completed and the status reflects it
    Done,
    /// A transient fault; try again after the given delay
    RetryAfter(Duration),
    /// Nothing to do, e.g. the Executor was deleted
    NoOp,
    /// The pass was cancelled; no status was written
    Cancelled,
}

impl Outcome {
    /// Label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Done => "done",
            Outcome::RetryAfter(_) => "retry",
            Outcome::NoOp => "noop",
            Outcome::Cancelled => "cancelled",
        }
    }
}

/// Timing knobs for a pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconcileSettings {
    /// Default per-container execution timeout
    pub exec_timeout: Duration,
    /// Base delay requested on transient failures
    pub retry_delay: Duration,
}

impl From<&OperatorConfig> for ReconcileSettings {
    fn from(config: &OperatorConfig) -> Self {
        Self {
            exec_timeout: config.exec_timeout,
            retry_delay: config.retry_delay,
        }
    }
}

/// Drives one Executor from declared intent to observed output
///
/// Holds no per-resource state, so a single instance serves concurrent passes
/// for distinct Executors.
pub struct Reconciler {
    store: Arc<dyn ExecutorStore>,
    cluster: Arc<dyn ClusterStateReader>,
    executor: Arc<dyn RemoteExecutor>,
    settings: ReconcileSettings,
}

struct Pass {
    report: Report,
    cluster_error: Option<Error>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ExecutorStore>,
        cluster: Arc<dyn ClusterStateReader>,
        executor: Arc<dyn RemoteExecutor>,
        settings: ReconcileSettings,
    ) -> Self {
        Self {
            store,
            cluster,
            executor,
            settings,
        }
    }

    /// Run one pass for the Executor `namespace/name`
    pub async fn reconcile(
        &self,
        namespace: &str,
        name: &str,
        cancel: &CancellationToken,
    ) -> Outcome {
        // Fetch the declaration; a deleted Executor is not an error
        let executor = match self.store.get(namespace, name).await {
            Ok(Some(executor)) => executor,
            Ok(None) => {
                debug!("Executor {}/{} not found, nothing to do", namespace, name);
                if MATCHED_CONTAINERS
                    .remove_label_values(&[namespace, name])
                    .is_ok()
                {
                    debug!("Dropped metrics for {}/{}", namespace, name);
                }
                return Outcome::NoOp;
            }
            Err(e) => {
                warn!("Failed to fetch Executor {}/{}: {}", namespace, name, e);
                RECONCILIATION_ERRORS.with_label_values(&["fetch"]).inc();
                return Outcome::RetryAfter(e.retry_after(self.settings.retry_delay));
            }
        };

        // Status-only changes and restarts do not re-run the command
        if is_observed(&executor) {
            debug!(
                "Executor {}/{} generation already observed, skipping",
                namespace, name
            );
            return Outcome::NoOp;
        }

        // Validate the spec
        if let Err(e) = validate(&executor) {
            warn!("Rejecting Executor {}/{}: {}", namespace, name, e);
            let status = rejected_status(&executor, &e, Utc::now());
            self.write_status(namespace, name, &status).await;
            return Outcome::Done;
        }

        // Discover, match and execute
        let Some(pass) = self.run_pass(namespace, &executor, cancel).await else {
            info!("Pass for {}/{} cancelled, discarding results", namespace, name);
            return Outcome::Cancelled;
        };

        MATCHED_CONTAINERS
            .with_label_values(&[namespace, name])
            .set(pass.report.matched as f64);

        // Update status; a failed write is logged and does not trigger a retry
        let status = build_status(&executor, &pass, Utc::now());
        self.write_status(namespace, name, &status).await;

        info!(
            "Executed in {}/{}: matched={}, failed={}",
            namespace, name, pass.report.matched, pass.report.failed
        );

        Outcome::Done
    }

    /// Discover, match and execute; `None` when cancelled
    async fn run_pass(
        &self,
        namespace: &str,
        executor: &Executor,
        cancel: &CancellationToken,
    ) -> Option<Pass> {
        let spec = &executor.spec;

        let listed = tokio::select! {
            listed = self.cluster.list_containers(namespace) => listed,
            _ = cancel.cancelled() => return None,
        };
        let (discovered, cluster_error) = match listed {
            Ok(discovered) => (discovered, None),
            Err(e) => {
                warn!("Treating {} as empty: {}", namespace, e);
                RECONCILIATION_ERRORS.with_label_values(&["cluster_read"]).inc();
                (Vec::new(), Some(e))
            }
        };

        let matched = match_containers(&discovered, &spec.container_name_pattern);
        debug!(
            "Pattern {:?} matched {} of {} containers",
            spec.container_name_pattern,
            matched.len(),
            discovered.len()
        );

        // The whole pass may take one timeout per matched container
        let timeout = exec_timeout(executor, self.settings.exec_timeout);
        let budget = timeout
            .checked_mul(u32::try_from(matched.len()).unwrap_or(u32::MAX))
            .unwrap_or(Duration::MAX);
        let deadline = Instant::now().checked_add(budget);

        let mut results = Vec::with_capacity(matched.len());
        for container in matched {
            if cancel.is_cancelled() {
                return None;
            }

            let remaining = deadline
                .map(|d| d.saturating_duration_since(Instant::now()))
                .unwrap_or(timeout);
            let output = if remaining.is_zero() {
                ExecOutput::failed("", ExecFailure::DeadlineExceeded)
            } else {
                let started = Instant::now();
                let output = self
                    .executor
                    .exec(&container, &spec.command, timeout.min(remaining), cancel)
                    .await;
                let label = output.error.as_ref().map_or("success", ExecFailure::kind);
                EXEC_DURATION
                    .with_label_values(&[label])
                    .observe(started.elapsed().as_secs_f64());
                output
            };

            if output.error == Some(ExecFailure::Cancelled) {
                return None;
            }

            let label = output.error.as_ref().map_or("success", ExecFailure::kind);
            CONTAINER_EXECUTIONS.with_label_values(&[label]).inc();
            if let Some(e) = &output.error {
                warn!("Execution in {} failed: {}", container, e);
            }

            results.push(ExecutionResult::new(container, output));
        }

        if cancel.is_cancelled() {
            return None;
        }

        Some(Pass {
            report: aggregate(&results),
            cluster_error,
        })
    }

    async fn write_status(&self, namespace: &str, name: &str, status: &ExecutorStatus) {
        match self.store.patch_status(namespace, name, status).await {
            Ok(()) => debug!("Updated status for {}/{}", namespace, name),
            Err(e) => {
                STATUS_WRITE_FAILURES.with_label_values(&["Executor"]).inc();
                error!("Unable to update status for {}/{}: {}", namespace, name, e);
            }
        }
    }
}

/// Validate an Executor spec
pub fn validate(executor: &Executor) -> Result<()> {
    if executor.spec.command.trim().is_empty() {
        return Err(Error::ValidationError("command cannot be empty".to_string()));
    }

    if executor.spec.timeout_seconds == Some(0) {
        return Err(Error::ValidationError(
            "timeoutSeconds must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Per-container timeout for this Executor
pub fn exec_timeout(executor: &Executor, default: Duration) -> Duration {
    executor
        .spec
        .timeout_seconds
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn is_observed(executor: &Executor) -> bool {
    match (
        executor.metadata.generation,
        executor.status.as_ref().and_then(|s| s.observed_generation),
    ) {
        (Some(generation), Some(observed)) => generation == observed,
        _ => false,
    }
}

/// Keep the previous transition time when a condition's status is unchanged
fn carry_transition_time(executor: &Executor, mut condition: Condition) -> Condition {
    let previous = executor
        .status
        .iter()
        .flat_map(|s| s.conditions.iter())
        .find(|c| c.type_ == condition.type_ && c.status == condition.status);
    if let Some(previous) = previous {
        condition.last_transition_time = previous.last_transition_time;
    }
    condition
}

fn build_status(executor: &Executor, pass: &Pass, now: DateTime<Utc>) -> ExecutorStatus {
    let report = &pass.report;
    let mut conditions = Vec::new();

    conditions.push(match &pass.cluster_error {
        None => Condition::new("ClusterStateRead", true, "PodsListed", "Pods listed", now),
        Some(e) => Condition::new("ClusterStateRead", false, "ListFailed", e.to_string(), now),
    });

    let (ready, reason) = if pass.cluster_error.is_some() {
        (false, "ClusterStateUnavailable")
    } else if report.failed > 0 {
        (false, "ExecutionFailed")
    } else if report.matched == 0 {
        (true, "NoContainersMatched")
    } else {
        (true, "Executed")
    };
    let message = format!(
        "{} container(s) matched, {} failed",
        report.matched, report.failed
    );
    conditions.push(Condition::new("Ready", ready, reason, message.clone(), now));

    let conditions = conditions
        .into_iter()
        .map(|c| carry_transition_time(executor, c))
        .collect();

    ExecutorStatus {
        observed_output: Some(report.text.clone()),
        matched_containers: Some(report.matched as u32),
        failed_containers: Some(report.failed as u32),
        message: Some(message),
        observed_generation: executor.metadata.generation,
        last_update_time: Some(now),
        conditions,
    }
}

fn rejected_status(executor: &Executor, err: &Error, now: DateTime<Utc>) -> ExecutorStatus {
    let ready = Condition::new("Ready", false, "InvalidSpec", err.to_string(), now);
    ExecutorStatus {
        observed_output: Some(String::new()),
        matched_containers: Some(0),
        failed_containers: Some(0),
        message: Some(err.to_string()),
        observed_generation: executor.metadata.generation,
        last_update_time: Some(now),
        conditions: vec![carry_transition_time(executor, ready)],
    }
}
