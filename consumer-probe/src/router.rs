use std::sync::Arc;
use std::time::Instant;

use axum::extract::{MatchedPath, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{body::Body, Json, Router};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::evaluator::Evaluator;

#[derive(Clone)]
pub struct AppState {
    pub evaluator: Arc<Evaluator>,
    pub config: Config,
}

async fn index() -> &'static str {
    "consumer-probe"
}

/// Pure liveness: the process can answer HTTP. Never evaluates.
async fn health() -> impl IntoResponse {
    Json(json!({"ok": true}))
}

/// The endpoint the container runtime polls. Evaluation failure of any
/// kind is a 500; inability to verify health is never implicit health.
async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let result = state.evaluator.evaluate().await;
    let status = match result.healthy {
        true => StatusCode::OK,
        false => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({"healthy": result.healthy, "reasons": result.reasons})),
    )
}

/// Debug view: always 200, full verdict plus the active settings.
async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let result = state.evaluator.evaluate().await;
    Json(json!({"result": result, "config": state.config}))
}

pub fn setup_metrics_recorder() -> PrometheusHandle {
    const BUCKETS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(BUCKETS)
        .unwrap()
        .install_recorder()
        .unwrap()
}

/// Middleware to record some common HTTP metrics
pub async fn track_metrics(req: Request<Body>, next: Next) -> impl IntoResponse {
    let start = Instant::now();

    let path = if let Some(matched_path) = req.extensions().get::<MatchedPath>() {
        matched_path.as_str().to_owned()
    } else {
        req.uri().path().to_owned()
    };

    let method = req.method().clone();
    let response = next.run(req).await;

    let latency = start.elapsed().as_secs_f64();
    let labels = [
        ("method", method.to_string()),
        ("path", path),
        ("status", response.status().as_u16().to_string()),
    ];

    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_requests_duration_seconds", &labels).record(latency);

    response
}

pub fn router(evaluator: Arc<Evaluator>, config: Config, metrics: bool) -> Router {
    let state = AppState { evaluator, config };

    let router = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/status", get(status))
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(track_metrics))
        .with_state(state);

    // The prometheus recorder is process-global, so don't install it when
    // the router is built as a library (tests etc).
    if metrics {
        let handle = setup_metrics_recorder();
        crate::metrics::register_metrics();
        router.route("/metrics", get(move || std::future::ready(handle.render())))
    } else {
        router
    }
}
