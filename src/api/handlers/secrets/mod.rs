//! Owner-scoped secret endpoints.
//!
//! Every route acts on the authenticated owner's own secrets. Stored values
//! never leave the server except through `display.actual` on visible types.

pub mod types;

pub use types::{ListSecretsQuery, SecretPath, SecretResponse};

use axum::{
    extract::{Path, Query, State},
    Json,
};
use tracing::instrument;

use crate::api::{
    error::{ApiError, ErrorBody},
    handlers::pagination::PaginatedResponse,
    routes::ApiState,
};
use crate::auth::AuthenticatedOwner;
use crate::domain::Secret;

fn to_responses(state: &ApiState, secrets: &[Secret]) -> Result<Vec<SecretResponse>, ApiError> {
    secrets
        .iter()
        .map(|secret| SecretResponse::from_secret(&state.engine, secret).map_err(ApiError::from))
        .collect()
}

#[utoipa::path(
    get,
    path = "/secrets",
    params(ListSecretsQuery),
    responses(
        (status = 200, description = "The caller's secrets", body = PaginatedResponse<SecretResponse>),
        (status = 401, description = "No resolvable caller", body = ErrorBody),
        (status = 422, description = "Invalid filter or sort", body = ErrorBody)
    ),
    tag = "secrets"
)]
#[instrument(skip(state, query), fields(owner = %owner.0))]
pub async fn list_secrets_handler(
    State(state): State<ApiState>,
    owner: AuthenticatedOwner,
    Query(query): Query<ListSecretsQuery>,
) -> Result<Json<PaginatedResponse<SecretResponse>>, ApiError> {
    let mut filter = query.to_filter()?;

    if query.full_data {
        let (secrets, _) = state.engine.list_secrets(&owner.0, &filter).await?;
        return Ok(Json(PaginatedResponse::full(to_responses(&state, &secrets)?)));
    }

    let (page, per_page) =
        query.page_query().clamp(state.server.default_page_size, state.server.max_page_size);
    filter.page = Some((page, per_page));
    let (secrets, total) = state.engine.list_secrets(&owner.0, &filter).await?;

    Ok(Json(PaginatedResponse::paged(to_responses(&state, &secrets)?, total, page, per_page)))
}

#[utoipa::path(
    get,
    path = "/secrets/{uuid}",
    params(SecretPath),
    responses(
        (status = 200, description = "Secret", body = SecretResponse),
        (status = 403, description = "Secret belongs to another owner", body = ErrorBody),
        (status = 404, description = "Secret not found", body = ErrorBody)
    ),
    tag = "secrets"
)]
#[instrument(skip(state), fields(owner = %owner.0, uuid = %path.uuid))]
pub async fn get_secret_handler(
    State(state): State<ApiState>,
    owner: AuthenticatedOwner,
    Path(path): Path<SecretPath>,
) -> Result<Json<SecretResponse>, ApiError> {
    let secret = state.engine.show_secret(&owner.0, &path.parse()?).await?;
    Ok(Json(SecretResponse::from_secret(&state.engine, &secret)?))
}

#[utoipa::path(
    delete,
    path = "/secrets/{uuid}",
    params(SecretPath),
    responses(
        (status = 200, description = "Secret moved to trash", body = SecretResponse),
        (status = 403, description = "Secret belongs to another owner", body = ErrorBody),
        (status = 404, description = "Secret not found", body = ErrorBody)
    ),
    tag = "secrets"
)]
#[instrument(skip(state), fields(owner = %owner.0, uuid = %path.uuid))]
pub async fn delete_secret_handler(
    State(state): State<ApiState>,
    owner: AuthenticatedOwner,
    Path(path): Path<SecretPath>,
) -> Result<Json<SecretResponse>, ApiError> {
    let secret = state.engine.soft_delete_secret(&owner.0, &path.parse()?).await?;
    Ok(Json(SecretResponse::from_secret(&state.engine, &secret)?))
}

#[utoipa::path(
    post,
    path = "/secrets/{uuid}/restore",
    params(SecretPath),
    responses(
        (status = 200, description = "Secret restored", body = SecretResponse),
        (status = 403, description = "Secret belongs to another owner", body = ErrorBody),
        (status = 404, description = "Secret not found", body = ErrorBody)
    ),
    tag = "secrets"
)]
#[instrument(skip(state), fields(owner = %owner.0, uuid = %path.uuid))]
pub async fn restore_secret_handler(
    State(state): State<ApiState>,
    owner: AuthenticatedOwner,
    Path(path): Path<SecretPath>,
) -> Result<Json<SecretResponse>, ApiError> {
    let secret = state.engine.restore_secret(&owner.0, &path.parse()?).await?;
    Ok(Json(SecretResponse::from_secret(&state.engine, &secret)?))
}
