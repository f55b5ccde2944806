//! Health check endpoint for monitoring and readiness probes

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::routes::ApiState;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when the database is unreachable
    #[schema(example = "ok")]
    pub status: String,
    pub secret_types: usize,
}

/// Health check endpoint
///
/// Returns 200 when the database answers, 503 otherwise. Unauthenticated.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse)
    )
)]
pub async fn health_handler(State(state): State<ApiState>) -> (StatusCode, Json<HealthResponse>) {
    let secret_types = state.engine.registry().types().len();
    match sqlx::query("SELECT 1").execute(state.engine.repository().pool()).await {
        Ok(_) => (StatusCode::OK, Json(HealthResponse { status: "ok".to_string(), secret_types })),
        Err(err) => {
            tracing::warn!(error = %err, "health check database probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse { status: "degraded".to_string(), secret_types }),
            )
        }
    }
}
