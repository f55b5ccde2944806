use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::api::error::ErrorBody;
use crate::api::handlers::health::HealthResponse;
use crate::api::handlers::pagination::PageMeta;
use crate::api::handlers::secrets::SecretResponse;
use crate::domain::SecretState;
use crate::secrets::SecretDisplay;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::handlers::health::health_handler,
        crate::api::handlers::secrets::list_secrets_handler,
        crate::api::handlers::secrets::get_secret_handler,
        crate::api::handlers::secrets::delete_secret_handler,
        crate::api::handlers::secrets::restore_secret_handler
    ),
    components(schemas(HealthResponse, SecretResponse, SecretDisplay, SecretState, PageMeta, ErrorBody)),
    tags(
        (name = "secrets", description = "The authenticated owner's secret records"),
        (name = "health", description = "Liveness and readiness")
    )
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Serves the generated document at `/api-docs/openapi.json`.
pub fn docs_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_secret_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/secrets"));
        assert!(doc.paths.paths.contains_key("/secrets/{uuid}"));
        assert!(doc.paths.paths.contains_key("/secrets/{uuid}/restore"));
    }
}
