//! Liveness and dependency check.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use tracing::warn;

use crate::AppState;
use crate::models::HealthResponse;

/// `GET /health`: 200 when the credential store answers, 503 otherwise.
pub async fn health_handler(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match state.sessions.credentials().ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("health check: credential store unreachable: {e}");
            false
        }
    };
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthResponse {
            status: if database { "ok" } else { "degraded" }.into(),
            version: petjo_core::version().into(),
            database,
            revocation_backend: state.sessions.revocation().backend().into(),
        }),
    )
}
