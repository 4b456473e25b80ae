//! Controller for Executor resources

use futures::StreamExt;
use kube::{
    runtime::{
        controller::{Action, Config as ControllerConfig, Controller},
        watcher::Config,
    },
    Api, ResourceExt,
};
use std::sync::Arc;
use tracing::{error, info, instrument};

use crate::controllers::Context;
use crate::crd::Executor;
use crate::metrics::prometheus::{RECONCILE_DURATION, RECONCILIATIONS};
use crate::reconcilers::Outcome;
use crate::Error;

/// Run the Executor controller
pub async fn run(ctx: Arc<Context>) {
    let client = ctx.client.clone();
    let executors: Api<Executor> = match &ctx.config.watch_namespace {
        Some(ns) => Api::namespaced(client, ns),
        None => Api::all(client),
    };

    info!(
        "Starting Executor controller (namespace: {}, concurrency: {})",
        ctx.config.watch_namespace.as_deref().unwrap_or("<all>"),
        ctx.config.concurrency
    );

    Controller::new(executors, Config::default().any_semantic())
        .with_config(ControllerConfig::default().concurrency(ctx.config.concurrency))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok(o) => info!("Reconciled {:?}", o),
                Err(e) => error!("Reconcile failed: {:?}", e),
            }
        })
        .await;

    info!("Executor controller stopped");
}

/// Reconcile an Executor
///
/// The cached object only supplies the identity; the reconciler re-reads the
/// declaration so a deletion racing the notification becomes a no-op.
#[instrument(skip(executor, ctx), fields(name = %executor.name_any(), namespace = executor.namespace().unwrap_or_default()))]
async fn reconcile(executor: Arc<Executor>, ctx: Arc<Context>) -> Result<Action, Error> {
    let start = std::time::Instant::now();
    let name = executor.name_any();
    let ns = executor
        .namespace()
        .ok_or_else(|| Error::ValidationError(format!("Executor {} has no namespace", name)))?;

    let cancel = ctx.shutdown.child_token();
    let outcome = ctx.reconciler.reconcile(&ns, &name, &cancel).await;

    let duration = start.elapsed().as_secs_f64();
    RECONCILE_DURATION
        .with_label_values(&["Executor"])
        .observe(duration);
    RECONCILIATIONS.with_label_values(&[outcome.label()]).inc();

    info!(
        "Pass for {}/{} finished in {:.2}s: {:?}",
        ns, name, duration, outcome
    );

    Ok(match outcome {
        Outcome::RetryAfter(delay) => Action::requeue(delay),
        Outcome::Done | Outcome::NoOp | Outcome::Cancelled => Action::await_change(),
    })
}

/// Error policy for the controller
fn error_policy(executor: Arc<Executor>, err: &Error, ctx: Arc<Context>) -> Action {
    error!(
        "Reconciliation error for {}/{}: {:?}",
        executor.namespace().unwrap_or_default(),
        executor.name_any(),
        err
    );

    Action::requeue(err.retry_after(ctx.config.retry_delay))
}
