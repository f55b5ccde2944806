//! Request and response types for the secrets API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::api::handlers::pagination::PageQuery;
use crate::domain::{Secret, SecretState, SecretUuid};
use crate::errors::{Result, VigilError};
use crate::secrets::{SecretDisplay, SecretEngine, SecretListFilter, TrashedFilter};
use crate::storage::SecretOrder;

/// Query parameters for listing the caller's secrets
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ListSecretsQuery {
    /// Case-insensitive substring of the description
    pub description: Option<String>,
    /// Secret type key
    #[serde(rename = "type")]
    pub type_key: Option<String>,
    /// Only hidden (`true`) or only visible (`false`) types
    pub hidden: Option<bool>,
    /// `with` includes soft-deleted secrets, `only` returns nothing else
    pub trashed: Option<String>,
    /// Column to sort on, `-` prefix for descending (default `-id`)
    pub sort: Option<String>,
    /// Return every match without paging
    #[serde(default)]
    pub full_data: bool,
    /// Page number (default: 1)
    pub page: Option<i64>,
    /// Items per page (default: server `default_page_size`)
    pub per_page: Option<i64>,
}

impl ListSecretsQuery {
    pub fn page_query(&self) -> PageQuery {
        PageQuery { page: self.page, per_page: self.per_page }
    }

    pub fn to_filter(&self) -> Result<SecretListFilter> {
        let trashed = match self.trashed.as_deref() {
            None | Some("") => TrashedFilter::Without,
            Some("with") => TrashedFilter::With,
            Some("only") => TrashedFilter::Only,
            Some(_) => return Err(VigilError::validation_field("trashed", "The selected trashed is invalid.")),
        };
        let order = match self.sort.as_deref() {
            None | Some("") => SecretOrder::default(),
            Some(sort) => sort.parse()?,
        };

        Ok(SecretListFilter {
            description: self.description.clone(),
            type_key: self.type_key.clone(),
            hidden: self.hidden,
            trashed,
            order,
            page: None,
        })
    }
}

/// Path parameter naming one secret
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct SecretPath {
    pub uuid: String,
}

impl SecretPath {
    /// Malformed ids cannot exist, so they read as not found.
    pub fn parse(&self) -> Result<SecretUuid> {
        SecretUuid::parse(&self.uuid).map_err(|_| VigilError::not_found("secret", self.uuid.as_str()))
    }
}

/// Secret as returned over HTTP. The stored value only appears as `display`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SecretResponse {
    pub uuid: SecretUuid,
    #[serde(rename = "type")]
    pub type_key: String,
    pub description: Option<String>,
    pub usage_left: Option<u8>,
    pub state: SecretState,
    pub display: SecretDisplay,
    pub expires_at: Option<DateTime<Utc>>,
    pub disabled_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SecretResponse {
    pub fn from_secret(engine: &SecretEngine, secret: &Secret) -> Result<Self> {
        Ok(Self {
            uuid: secret.uuid.clone(),
            type_key: engine.type_key(secret)?.to_string(),
            description: secret.description.clone(),
            usage_left: secret.usage_left,
            state: secret.state_at(Utc::now()),
            display: engine.display(secret)?,
            expires_at: secret.expires_at,
            disabled_at: secret.disabled_at,
            deleted_at: secret.deleted_at,
            created_at: secret.created_at,
            updated_at: secret.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_to_filter() {
        let query = ListSecretsQuery {
            trashed: Some("only".into()),
            sort: Some("-expires_at".into()),
            ..Default::default()
        };
        let filter = query.to_filter().unwrap();
        assert_eq!(filter.trashed, TrashedFilter::Only);
        assert_eq!(filter.order.to_string(), "-expires_at");

        let bad = ListSecretsQuery { trashed: Some("never".into()), ..Default::default() };
        assert!(matches!(bad.to_filter(), Err(VigilError::ValidationFailed { .. })));

        let bad_sort = ListSecretsQuery { sort: Some("value".into()), ..Default::default() };
        assert!(bad_sort.to_filter().is_err());
    }

    #[test]
    fn test_malformed_uuid_is_not_found() {
        let path = SecretPath { uuid: "nope".into() };
        assert!(matches!(path.parse(), Err(VigilError::NotFound { .. })));
    }
}
