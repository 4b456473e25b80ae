//! Prometheus metric definitions and the metrics/health HTTP endpoint

use std::convert::Infallible;
use std::net::SocketAddr;

use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{
    register_counter_vec, register_gauge_vec, register_histogram_vec, CounterVec, Encoder,
    GaugeVec, HistogramVec, TextEncoder,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

lazy_static::lazy_static! {
    /// Total number of reconciliation passes by outcome
    pub static ref RECONCILIATIONS: CounterVec = register_counter_vec!(
        "executor_operator_reconciliations_total",
        "Total number of reconciliation passes",
        &["outcome"]
    ).unwrap();

    /// Total number of reconciliations that requested a retry
    pub static ref RECONCILIATION_ERRORS: CounterVec = register_counter_vec!(
        "executor_operator_reconciliation_errors_total",
        "Total number of reconciliation errors",
        &["reason"]
    ).unwrap();

    /// Reconciliation duration histogram
    pub static ref RECONCILE_DURATION: HistogramVec = register_histogram_vec!(
        "executor_operator_reconcile_duration_seconds",
        "Duration of reconciliations in seconds",
        &["kind"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    /// Container executions by result
    pub static ref CONTAINER_EXECUTIONS: CounterVec = register_counter_vec!(
        "executor_operator_container_executions_total",
        "Total number of container executions",
        &["result"]
    ).unwrap();

    /// Single container execution duration histogram
    pub static ref EXEC_DURATION: HistogramVec = register_histogram_vec!(
        "executor_operator_exec_duration_seconds",
        "Duration of single container executions in seconds",
        &["result"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]
    ).unwrap();

    /// Containers matched in the last pass per Executor
    pub static ref MATCHED_CONTAINERS: GaugeVec = register_gauge_vec!(
        "executor_operator_matched_containers",
        "Number of containers matched in the last pass",
        &["namespace", "name"]
    ).unwrap();

    /// Failed status writes
    pub static ref STATUS_WRITE_FAILURES: CounterVec = register_counter_vec!(
        "executor_operator_status_write_failures_total",
        "Total number of failed status writes",
        &["kind"]
    ).unwrap();

    /// Operator health (1 = healthy, 0 = unhealthy)
    pub static ref OPERATOR_HEALTH: prometheus::Gauge = prometheus::register_gauge!(
        "executor_operator_health",
        "Operator health status (1 = healthy, 0 = unhealthy)"
    ).unwrap();
}

/// Serve `/metrics`, `/healthz` and `/readyz` until the listener fails
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    OPERATOR_HEALTH.set(1.0);

    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            if let Err(e) = http1::Builder::new()
                .serve_connection(io, service_fn(route))
                .await
            {
                warn!("Metrics connection from {} failed: {}", peer, e);
            }
        });
    }
}

async fn route(req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match req.uri().path() {
        "/metrics" => render_metrics(),
        "/healthz" | "/health" => text(StatusCode::OK, "ok"),
        "/readyz" | "/ready" if OPERATOR_HEALTH.get() >= 1.0 => text(StatusCode::OK, "ok"),
        "/readyz" | "/ready" => text(StatusCode::SERVICE_UNAVAILABLE, "not ready"),
        _ => text(StatusCode::NOT_FOUND, "Not Found"),
    };
    Ok(response)
}

fn render_metrics() -> Response<Full<Bytes>> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        error!("Failed to encode metrics: {}", e);
        return text(StatusCode::INTERNAL_SERVER_ERROR, "Failed to encode metrics");
    }

    let mut response = Response::new(Full::new(Bytes::from(buffer)));
    if let Ok(content_type) = HeaderValue::from_str(encoder.format_type()) {
        response.headers_mut().insert(CONTENT_TYPE, content_type);
    }
    response
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
