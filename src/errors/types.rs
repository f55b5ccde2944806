//! # Error Types
//!
//! Error taxonomy for the secret lifecycle engine using `thiserror`.

use std::collections::BTreeMap;

use crate::domain::SecretTypePolicy;

/// Custom result type for Vigil operations
pub type Result<T> = std::result::Result<T, VigilError>;

/// Field name to human readable messages, ordered for stable output
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Main error type for the secret lifecycle engine
#[derive(thiserror::Error, Debug)]
pub enum VigilError {
    /// Configuration errors (startup validation, unreadable files)
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Database and storage errors
    #[error("Database error: {context}")]
    Database {
        #[source]
        source: sqlx::Error,
        context: String,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {context}")]
    Serialization {
        #[source]
        source: serde_json::Error,
        context: String,
    },

    /// No resolvable caller
    #[error("{message}")]
    Unauthenticated { message: String },

    /// Caller has none of the requested active secret types
    #[error("{message}")]
    NoActiveSecret { types: Vec<String>, message: String },

    /// Supplied value did not match the stored secret
    #[error("{message}")]
    InvalidSecret { type_key: String, message: String },

    /// New value collides with the owner's recent history
    #[error("{message}")]
    SecretAlreadyExists { type_key: String, message: String },

    /// Rule violations or missing fields, keyed by field name
    #[error("Validation failed: {}", summarize_fields(.fields))]
    ValidationFailed { fields: FieldErrors },

    /// Input that cannot be normalised to a value or list of values
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Caller is authenticated but does not own the resource
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    /// Resource not found errors
    #[error("Resource not found: {resource_type} with ID '{id}'")]
    NotFound { resource_type: String, id: String },

    /// Hash computation or verification failures
    #[error("Hashing error: {message}")]
    Hashing { message: String },

    /// Internal server errors
    #[error("Internal server error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

fn summarize_fields(fields: &FieldErrors) -> String {
    fields
        .iter()
        .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Joins display names the way the notification copy expects:
/// `a`, `a, and b`, `a, b, and c`.
pub(crate) fn join_display_names(names: &[&str]) -> String {
    match names {
        [] => String::new(),
        [only] => (*only).to_string(),
        [init @ .., last] => format!("{}, and {}", init.join(", "), last),
    }
}

fn upper_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

impl VigilError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), source: None }
    }

    /// Create a configuration error with source
    pub fn config_with_source<S: Into<String>>(
        message: S,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        Self::Config { message: message.into(), source: Some(source) }
    }

    /// Wrap a sqlx error with a context string
    pub fn database<S: Into<String>>(source: sqlx::Error, context: S) -> Self {
        Self::Database { source, context: context.into() }
    }

    pub fn unauthenticated() -> Self {
        Self::Unauthenticated { message: "Unauthenticated.".to_string() }
    }

    /// Raised when the owner holds no active secret of any of the given types.
    pub fn no_active_secret(policies: &[&SecretTypePolicy]) -> Self {
        let names: Vec<&str> = policies.iter().map(|p| p.display_name.as_str()).collect();
        Self::NoActiveSecret {
            types: policies.iter().map(|p| p.key.clone()).collect(),
            message: format!("User has no active {}.", join_display_names(&names)),
        }
    }

    pub fn invalid_secret(policy: &SecretTypePolicy) -> Self {
        Self::InvalidSecret {
            type_key: policy.key.clone(),
            message: format!("{} provided is incorrect.", upper_first(&policy.display_name)),
        }
    }

    pub fn secret_already_exists(policy: &SecretTypePolicy) -> Self {
        let history = policy
            .max_history_count
            .map(|count| count.to_string())
            .unwrap_or_else(|| "all".to_string());
        Self::SecretAlreadyExists {
            type_key: policy.key.clone(),
            message: format!(
                "The new {} must not be the same as the {} previous ones.",
                policy.display_name, history
            ),
        }
    }

    /// Single-field validation failure
    pub fn validation_field<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        let mut fields = FieldErrors::new();
        fields.insert(field.into(), vec![message.into()]);
        Self::ValidationFailed { fields }
    }

    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput { message: message.into() }
    }

    pub fn forbidden<S: Into<String>>(message: S) -> Self {
        Self::Forbidden { message: message.into() }
    }

    /// Create a not found error
    pub fn not_found<R: Into<String>, I: Into<String>>(resource_type: R, id: I) -> Self {
        Self::NotFound { resource_type: resource_type.into(), id: id.into() }
    }

    pub fn hashing<S: Into<String>>(message: S) -> Self {
        Self::Hashing { message: message.into() }
    }

    /// Create an internal server error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into(), source: None }
    }

    /// Get the HTTP status code that should be returned for this error
    pub fn status_code(&self) -> u16 {
        match self {
            VigilError::Unauthenticated { .. }
            | VigilError::NoActiveSecret { .. }
            | VigilError::InvalidSecret { .. } => 401,
            VigilError::Forbidden { .. } => 403,
            VigilError::NotFound { .. } => 404,
            VigilError::SecretAlreadyExists { .. } => 409,
            VigilError::ValidationFailed { .. } | VigilError::InvalidInput { .. } => 422,
            VigilError::Serialization { .. } => 400,
            VigilError::Config { .. }
            | VigilError::Database { .. }
            | VigilError::Hashing { .. }
            | VigilError::Internal { .. } => 500,
        }
    }

    /// Check if this error should be retried by background jobs
    pub fn is_retryable(&self) -> bool {
        match self {
            VigilError::Database { source, .. } => !matches!(
                source,
                sqlx::Error::RowNotFound
                    | sqlx::Error::ColumnNotFound(_)
                    | sqlx::Error::TypeNotFound { .. }
            ),
            _ => false,
        }
    }

    /// Whether this is the "owner has no active secret" condition
    pub fn is_no_active_secret(&self) -> bool {
        matches!(self, VigilError::NoActiveSecret { .. })
    }
}

// Error conversions for common external error types
impl From<sqlx::Error> for VigilError {
    fn from(error: sqlx::Error) -> Self {
        Self::Database { source: error, context: "Database operation failed".to_string() }
    }
}

impl From<serde_json::Error> for VigilError {
    fn from(error: serde_json::Error) -> Self {
        Self::Serialization { source: error, context: "JSON serialization failed".to_string() }
    }
}

impl From<config::ConfigError> for VigilError {
    fn from(error: config::ConfigError) -> Self {
        Self::config_with_source("Configuration loading failed", Box::new(error))
    }
}

impl From<validator::ValidationErrors> for VigilError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let messages = field_errors
                    .iter()
                    .map(|e| {
                        e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string())
                    })
                    .collect();
                (field.to_string(), messages)
            })
            .collect();

        Self::ValidationFailed { fields }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SecretTypePolicy;

    fn policy(key: &str, display: &str) -> SecretTypePolicy {
        SecretTypePolicy::named(key, 0, display)
    }

    #[test]
    fn test_no_active_secret_message_joins_names() {
        let password = policy("password", "password");
        let pin = policy("pin", "PIN");
        let otp = policy("otp", "one-time code");

        let single = VigilError::no_active_secret(&[&password]);
        assert_eq!(single.to_string(), "User has no active password.");

        let pair = VigilError::no_active_secret(&[&password, &pin]);
        assert_eq!(pair.to_string(), "User has no active password, and PIN.");

        let triple = VigilError::no_active_secret(&[&password, &pin, &otp]);
        assert_eq!(triple.to_string(), "User has no active password, PIN, and one-time code.");
        if let VigilError::NoActiveSecret { types, .. } = triple {
            assert_eq!(types, vec!["password", "pin", "otp"]);
        }
    }

    #[test]
    fn test_invalid_secret_capitalizes_display_name() {
        let error = VigilError::invalid_secret(&policy("password", "password"));
        assert_eq!(error.to_string(), "Password provided is incorrect.");
        assert_eq!(error.status_code(), 401);
    }

    #[test]
    fn test_secret_already_exists_mentions_history() {
        let mut password = policy("password", "password");
        password.max_history_count = Some(4);
        let error = VigilError::secret_already_exists(&password);
        assert_eq!(
            error.to_string(),
            "The new password must not be the same as the 4 previous ones."
        );
        assert_eq!(error.status_code(), 409);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(VigilError::unauthenticated().status_code(), 401);
        assert_eq!(VigilError::validation_field("pin", "required").status_code(), 422);
        assert_eq!(VigilError::invalid_input("bad").status_code(), 422);
        assert_eq!(VigilError::forbidden("nope").status_code(), 403);
        assert_eq!(VigilError::not_found("secret_type", "x").status_code(), 404);
        assert_eq!(VigilError::internal("boom").status_code(), 500);
    }

    #[test]
    fn test_retryable_errors() {
        assert!(VigilError::database(sqlx::Error::PoolTimedOut, "acquire").is_retryable());
        assert!(!VigilError::database(sqlx::Error::RowNotFound, "lookup").is_retryable());
        assert!(!VigilError::validation_field("pin", "required").is_retryable());
        assert!(!VigilError::not_found("secret_type", "x").is_retryable());
    }

    #[test]
    fn test_validation_display_lists_fields() {
        let mut fields = FieldErrors::new();
        fields.insert("password".into(), vec!["too short".into(), "needs digits".into()]);
        fields.insert("pin".into(), vec!["required".into()]);
        let error = VigilError::ValidationFailed { fields };
        assert_eq!(
            error.to_string(),
            "Validation failed: password: too short, needs digits; pin: required"
        );
    }
}
