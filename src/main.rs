//! Executor Operator
//!
//! Main entry point for the operator. Loads configuration, sets up the
//! Kubernetes client and runs the Executor controller next to the metrics
//! server.

use kube::Client;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use executor_operator::{
    config::OperatorConfig,
    controllers::{drain, executor_controller, Context},
    metrics,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    info!("Starting Executor Operator");

    // Load configuration from the environment
    let config = OperatorConfig::from_env()?;
    info!(
        "Loaded configuration: exec timeout {:?}, retry delay {:?}",
        config.exec_timeout, config.retry_delay
    );

    // Create Kubernetes client
    let client = Client::try_default().await?;
    info!("Connected to Kubernetes API server");

    // Create shared context; every pass gets a child of this token
    let shutdown = CancellationToken::new();
    let metrics_port = config.metrics_port;
    let grace = config.shutdown_grace;
    let context = Context::new(client, config, shutdown.clone());

    // Start metrics server
    let metrics_handle = tokio::spawn(metrics::serve(metrics_port));
    info!("Metrics server starting on port {}", metrics_port);

    // Run the executor controller
    let mut controller_handle = tokio::spawn(executor_controller::run(context));

    // Handle graceful shutdown
    let controller_running = tokio::select! {
        _ = &mut controller_handle => {
            error!("Executor controller exited unexpectedly");
            false
        }
        res = metrics_handle => {
            error!("Metrics server exited unexpectedly: {:?}", res);
            true
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal, stopping operator");
            true
        }
    };

    metrics::OPERATOR_HEALTH.set(0.0);

    // Let in-flight passes observe the cancellation before the runtime stops
    if controller_running {
        drain(&shutdown, &mut controller_handle, grace).await;
    }

    info!("Executor Operator stopped");
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("info,executor_operator=debug,kube=warn,hyper=warn")
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .init();
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received CTRL+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
