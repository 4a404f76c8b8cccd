//! Prometheus metrics exporter
//!
//! Exposes metrics via HTTP for Prometheus scraping.

use crate::metrics::recorder::init_metrics;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::runtime::Handle;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Errors that can occur during metrics setup
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("Failed to setup metrics: {0}")]
    SetupFailed(String),
}

/// Install the Prometheus recorder and serve it on `listen_addr`.
///
/// The listener runs as a task on the current tokio runtime. Subsequent
/// calls return the existing handle.
pub fn start_metrics_server(
    listen_addr: SocketAddr,
) -> Result<&'static PrometheusHandle, MetricsError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle);
    }

    let runtime = Handle::try_current()
        .map_err(|e| MetricsError::SetupFailed(format!("no tokio runtime: {e}")))?;

    let (recorder, exporter) = PrometheusBuilder::new()
        .with_http_listener(listen_addr)
        .build()
        .map_err(|e| MetricsError::SetupFailed(e.to_string()))?;

    let handle = recorder.handle();
    metrics::set_global_recorder(recorder)
        .map_err(|e| MetricsError::SetupFailed(e.to_string()))?;
    init_metrics();

    runtime.spawn(async move {
        if let Err(e) = exporter.await {
            tracing::error!("Metrics exporter stopped: {:?}", e);
        }
    });

    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle))
}

/// Render metrics as a string, if the exporter is running
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

/// Create an axum route for serving metrics
///
/// Mounted at `/metrics` on the submission server.
pub fn metrics_route<S>() -> axum::routing::MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    use axum::response::IntoResponse;

    axum::routing::get(|| async {
        match render_metrics() {
            Some(metrics) => (
                [(
                    axum::http::header::CONTENT_TYPE,
                    "text/plain; version=0.0.4; charset=utf-8",
                )],
                metrics,
            )
                .into_response(),
            None => (
                axum::http::StatusCode::SERVICE_UNAVAILABLE,
                "Metrics not initialized",
            )
                .into_response(),
        }
    })
}
