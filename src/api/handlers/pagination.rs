//! Shared pagination types for list endpoints.
//!
//! Pages are 1-based. `per_page` falls back to the server's configured
//! default and is capped at its maximum.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Page selection query parameters.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PageQuery {
    /// Page number (default: 1)
    pub page: Option<i64>,
    /// Items per page (default: server `default_page_size`)
    pub per_page: Option<i64>,
}

impl PageQuery {
    /// Resolve to `(page, per_page)` within `[1, max_per_page]`.
    pub fn clamp(&self, default_per_page: i64, max_per_page: i64) -> (i64, i64) {
        let per_page = self.per_page.unwrap_or(default_per_page).clamp(1, max_per_page.max(1));
        (self.page.unwrap_or(1).max(1), per_page)
    }
}

/// Paging details of a list response.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PageMeta {
    pub current_page: i64,
    pub per_page: i64,
    pub last_page: i64,
}

impl PageMeta {
    pub fn new(current_page: i64, per_page: i64, total: i64) -> Self {
        let last_page = if total <= 0 { 1 } else { (total + per_page - 1) / per_page };
        Self { current_page, per_page, last_page }
    }
}

/// List response wrapper; `meta` is absent when everything was returned at once.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

impl<T> PaginatedResponse<T> {
    pub fn paged(data: Vec<T>, total: i64, page: i64, per_page: i64) -> Self {
        Self { data, total, meta: Some(PageMeta::new(page, per_page, total)) }
    }

    pub fn full(data: Vec<T>) -> Self {
        let total = data.len() as i64;
        Self { data, total, meta: None }
    }
}
