use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::AppState;
use crate::metrics;

/// Health check endpoint - returns server status
pub async fn health_handler(State(state): State<AppState>) -> Response {
    let engine = match state.engine.stats().await {
        Ok(stats) => stats,
        Err(e) => {
            warn!("Health check could not reach the pairing engine: {}", e);
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unavailable",
                    "engine": e.to_string(),
                })),
            )
                .into_response();
        }
    };
    let metrics = state.metrics.snapshot(engine);

    let status = if metrics.errors.websocket == 0 && metrics.errors.engine == 0 {
        "healthy"
    } else {
        "degraded"
    };

    Json(metrics::HealthStatus {
        status: status.to_string(),
        connections: metrics.connections.active,
        waiting: metrics.engine.waiting,
        active_pairs: metrics.engine.active_pairs,
        uptime_secs: metrics.uptime_secs,
    })
    .into_response()
}

/// Metrics endpoint - returns server counters and engine stats
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.engine.stats().await {
        Ok(stats) => Json(state.metrics.snapshot(stats)).into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}
