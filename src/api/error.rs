use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::errors::{FieldErrors, VigilError};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Conflict(String),
    NotFound(String),
    Unauthorized(String),
    Forbidden(String),
    Unprocessable { message: String, fields: Option<FieldErrors> },
    PayloadTooLarge(String),
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::Unprocessable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn unauthorized<S: Into<String>>(msg: S) -> Self {
        ApiError::Unauthorized(msg.into())
    }

    pub fn forbidden<S: Into<String>>(msg: S) -> Self {
        ApiError::Forbidden(msg.into())
    }

    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        ApiError::BadRequest(msg.into())
    }
}

/// JSON error envelope returned by every endpoint and guard.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldErrors>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let error_kind = match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Conflict(_) => "conflict",
            ApiError::NotFound(_) => "not_found",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::Unprocessable { .. } => "validation_failed",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::Internal(_) => "internal_error",
        };

        let (message, fields) = match self {
            ApiError::Unprocessable { message, fields } => (message, fields),
            ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::NotFound(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::PayloadTooLarge(msg)
            | ApiError::Internal(msg) => (msg, None),
        };

        (status, Json(ErrorBody { error: error_kind, message, fields })).into_response()
    }
}

impl From<VigilError> for ApiError {
    fn from(err: VigilError) -> Self {
        match err {
            VigilError::Unauthenticated { message }
            | VigilError::NoActiveSecret { message, .. }
            | VigilError::InvalidSecret { message, .. } => ApiError::Unauthorized(message),
            VigilError::SecretAlreadyExists { message, .. } => ApiError::Conflict(message),
            VigilError::Forbidden { message } => ApiError::Forbidden(message),
            VigilError::ValidationFailed { fields } => {
                let message = fields
                    .values()
                    .flatten()
                    .next()
                    .cloned()
                    .unwrap_or_else(|| "The given data was invalid.".to_string());
                ApiError::Unprocessable { message, fields: Some(fields) }
            }
            VigilError::InvalidInput { message } => ApiError::Unprocessable { message, fields: None },
            VigilError::NotFound { resource_type, id } => {
                ApiError::NotFound(format!("{} '{}' not found", resource_type, id))
            }
            VigilError::Serialization { context, .. } => ApiError::BadRequest(context),
            VigilError::Database { source, context } => {
                tracing::error!(error = %source, %context, "database error while serving request");
                ApiError::Internal(context)
            }
            other => {
                tracing::error!(error = %other, "internal error while serving request");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SecretTypePolicy;

    #[test]
    fn test_engine_errors_map_to_statuses() {
        let pin = SecretTypePolicy::named("pin", 1, "PIN");
        assert_eq!(ApiError::from(VigilError::invalid_secret(&pin)).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(VigilError::no_active_secret(&[&pin])).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(VigilError::secret_already_exists(&pin)).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(VigilError::validation_field("pin", "The PIN field is required.")).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ApiError::from(VigilError::forbidden("no")).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::from(VigilError::not_found("secret", "x")).status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_message_is_first_field_error() {
        match ApiError::from(VigilError::validation_field("pin", "The PIN field is required.")) {
            ApiError::Unprocessable { message, fields } => {
                assert_eq!(message, "The PIN field is required.");
                assert!(fields.unwrap().contains_key("pin"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
