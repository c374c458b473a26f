use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::handlers::AppState;

/// Liveness probe.
///
/// Reports process uptime only; this service owns no durable resources, so
/// there is nothing else to check.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up")
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "up",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
