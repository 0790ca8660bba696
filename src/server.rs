//! HTTP server and scrape entry point.
//!
//! # Endpoints
//!
//! - `GET /` - HTML landing page with links to metrics and health
//! - `GET /metrics` - runs one collection cycle against the current
//!   snapshots, then renders the registry in Prometheus text format
//! - `GET /health` - 200 once a descriptor tree has loaded, 503 before
//!
//! Collection happens per scrape, not on a timer: every `/metrics` request
//! re-invokes the declared actions (deduplicated within the cycle) so the
//! exposed values are as fresh as the gateway allows.

use crate::collector::GatewayCollector;
use crate::config::Config;
use crate::metrics::{self, ExporterMetrics};
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::Registry;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
struct AppState {
    registry: Arc<Registry>,
    collector: Arc<GatewayCollector>,
}

pub async fn start(config: Config) -> anyhow::Result<()> {
    let registry = Arc::new(Registry::new());
    let counters = ExporterMetrics::new(&registry)?;

    let declarations = metrics::load_declarations(config.metrics.metrics_file.as_deref())?;
    let gateway_metrics = metrics::register_metrics(declarations, &registry);
    info!("{} gateway metrics declared", gateway_metrics.len());

    let collector = Arc::new(GatewayCollector::new(
        config.gateway.clone(),
        gateway_metrics,
        counters,
    ));
    collector.spawn_loaders();

    let state = AppState {
        registry,
        collector,
    };

    let app = Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    let addr = format!("{}:{}", config.server.addr, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Metrics server listening on {}", addr);
    info!("Metrics available at http://{}/metrics", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn root_handler() -> impl IntoResponse {
    axum::response::Html(
        r#"<html>
<head><title>FRITZ!Box Exporter</title></head>
<body>
<h1>FRITZ!Box UPnP Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
<p><a href="/health">Health</a></p>
</body>
</html>"#,
    )
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    state.collector.collect().await;

    match metrics::render(&state.registry) {
        Ok(body) => body.into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error rendering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    if state.collector.ready().await {
        (axum::http::StatusCode::OK, "OK")
    } else {
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "gateway descriptors not loaded yet",
        )
    }
}
