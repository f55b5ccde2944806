//! Secret repository
//!
//! Owner-scoped queries over the `secrets` table. Reads go through a
//! [`SecretQuery`], which starts from the "active only" filter and widens it per
//! state flag. Writes are single-statement and atomic per record.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqliteConnection, Transaction};
use tracing::instrument;

use crate::domain::{NewSecret, OwnerRef, Secret, SecretUuid};
use crate::errors::{Result, VigilError};
use crate::storage::DbPool;

const SECRET_COLUMNS: &str = "id, uuid, owner_type, owner_id, type, value, description, hashed, \
     usage_left, expires_at, disabled_at, deleted_at, created_at, updated_at";

/// Internal database row structure for secrets.
#[derive(Debug, Clone, FromRow)]
struct SecretRow {
    pub id: i64,
    pub uuid: String,
    pub owner_type: String,
    pub owner_id: String,
    #[sqlx(rename = "type")]
    pub type_code: i64,
    pub value: String,
    pub description: Option<String>,
    pub hashed: bool,
    pub usage_left: Option<i64>,
    pub expires_at: Option<DateTime<Utc>>,
    pub disabled_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SecretRow {
    fn into_secret(self) -> Result<Secret> {
        let type_code = u8::try_from(self.type_code).map_err(|_| {
            VigilError::internal(format!(
                "Secret {} has out-of-range type code {}",
                self.id, self.type_code
            ))
        })?;
        let usage_left = self
            .usage_left
            .map(|left| {
                u8::try_from(left).map_err(|_| {
                    VigilError::internal(format!(
                        "Secret {} has out-of-range usage counter {}",
                        self.id, left
                    ))
                })
            })
            .transpose()?;

        Ok(Secret {
            id: self.id,
            uuid: SecretUuid::from_string(self.uuid),
            owner_type: self.owner_type,
            owner_id: self.owner_id,
            type_code,
            value: self.value,
            description: self.description,
            hashed: self.hashed,
            usage_left,
            expires_at: self.expires_at,
            disabled_at: self.disabled_at,
            deleted_at: self.deleted_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Sortable columns exposed to listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Id,
    CreatedAt,
    UpdatedAt,
    DeletedAt,
    ExpiresAt,
    DisabledAt,
}

impl SortColumn {
    fn as_sql(&self) -> &'static str {
        match self {
            SortColumn::Id => "id",
            SortColumn::CreatedAt => "created_at",
            SortColumn::UpdatedAt => "updated_at",
            SortColumn::DeletedAt => "deleted_at",
            SortColumn::ExpiresAt => "expires_at",
            SortColumn::DisabledAt => "disabled_at",
        }
    }
}

/// Ordering for secret queries; newest id first by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecretOrder {
    pub column: SortColumn,
    pub descending: bool,
}

impl SecretOrder {
    pub fn latest() -> Self {
        Self { column: SortColumn::Id, descending: true }
    }

    pub fn oldest() -> Self {
        Self { column: SortColumn::Id, descending: false }
    }
}

impl Default for SecretOrder {
    fn default() -> Self {
        Self::latest()
    }
}

impl FromStr for SecretOrder {
    type Err = VigilError;

    /// Parses `column` or `-column` (descending).
    fn from_str(raw: &str) -> Result<Self> {
        let (descending, name) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };
        let column = match name {
            "id" => SortColumn::Id,
            "created_at" => SortColumn::CreatedAt,
            "updated_at" => SortColumn::UpdatedAt,
            "deleted_at" => SortColumn::DeletedAt,
            "expires_at" => SortColumn::ExpiresAt,
            "disabled_at" => SortColumn::DisabledAt,
            other => {
                return Err(VigilError::validation_field(
                    "sort",
                    format!("Sorting by '{}' is not allowed.", other),
                ))
            }
        };
        Ok(Self { column, descending })
    }
}

impl fmt::Display for SecretOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            f.write_str("-")?;
        }
        f.write_str(self.column.as_sql())
    }
}

/// Filter over secret records.
///
/// The default filter matches active secrets only: not trashed, not expired
/// at `now`, not disabled and with usage left.
#[derive(Debug, Clone)]
pub struct SecretQuery {
    now: DateTime<Utc>,
    owner: Option<(String, String)>,
    type_codes: Vec<u8>,
    with_expired: bool,
    with_disabled: bool,
    with_used: bool,
    with_trashed: bool,
    only_trashed: bool,
    excluding: Vec<i64>,
    values: Vec<String>,
    description_like: Option<String>,
    expires_before: Option<DateTime<Utc>>,
    after_id: Option<i64>,
    uuid: Option<SecretUuid>,
    order: SecretOrder,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Default for SecretQuery {
    fn default() -> Self {
        Self::active()
    }
}

impl SecretQuery {
    pub fn active() -> Self {
        Self {
            now: Utc::now(),
            owner: None,
            type_codes: Vec::new(),
            with_expired: false,
            with_disabled: false,
            with_used: false,
            with_trashed: false,
            only_trashed: false,
            excluding: Vec::new(),
            values: Vec::new(),
            description_like: None,
            expires_before: None,
            after_id: None,
            uuid: None,
            order: SecretOrder::latest(),
            limit: None,
            offset: None,
        }
    }

    /// Secrets that are not active (any widened state) are matched too.
    pub fn all() -> Self {
        Self::active().with_stale().with_trashed()
    }

    /// Evaluate expiry against a fixed instant instead of the construction time.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn for_owner(mut self, owner_type: &str, owner_id: &str) -> Self {
        self.owner = Some((owner_type.to_string(), owner_id.to_string()));
        self
    }

    pub fn of_type(mut self, code: u8) -> Self {
        self.type_codes = vec![code];
        self
    }

    pub fn of_types<I: IntoIterator<Item = u8>>(mut self, codes: I) -> Self {
        self.type_codes = codes.into_iter().collect();
        self
    }

    pub fn with_expired(mut self) -> Self {
        self.with_expired = true;
        self
    }

    pub fn with_disabled(mut self) -> Self {
        self.with_disabled = true;
        self
    }

    pub fn with_used(mut self) -> Self {
        self.with_used = true;
        self
    }

    pub fn with_trashed(mut self) -> Self {
        self.with_trashed = true;
        self
    }

    /// Widen to expired, disabled and used-up records (soft-deleted stay excluded).
    pub fn with_stale(self) -> Self {
        self.with_expired().with_disabled().with_used()
    }

    pub fn only_trashed(mut self) -> Self {
        self.only_trashed = true;
        self
    }

    pub fn excluding(mut self, ids: &[i64]) -> Self {
        self.excluding.extend_from_slice(ids);
        self
    }

    pub fn value_in<I: IntoIterator<Item = String>>(mut self, values: I) -> Self {
        self.values = values.into_iter().collect();
        self
    }

    pub fn description_like(mut self, needle: &str) -> Self {
        self.description_like = Some(needle.to_string());
        self
    }

    pub fn expires_before(mut self, instant: DateTime<Utc>) -> Self {
        self.expires_before = Some(instant);
        self
    }

    /// Keyset pagination for batch scans ordered by ascending id.
    pub fn after_id(mut self, id: i64) -> Self {
        self.after_id = Some(id);
        self
    }

    pub fn uuid(mut self, uuid: &SecretUuid) -> Self {
        self.uuid = Some(uuid.clone());
        self
    }

    pub fn order(mut self, order: SecretOrder) -> Self {
        self.order = order;
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    fn push_filters<'q>(&'q self, qb: &mut QueryBuilder<'q, Sqlite>) {
        qb.push(" WHERE 1 = 1");

        if let Some((owner_type, owner_id)) = &self.owner {
            qb.push(" AND owner_type = ").push_bind(owner_type.as_str());
            qb.push(" AND owner_id = ").push_bind(owner_id.as_str());
        }

        if !self.type_codes.is_empty() {
            qb.push(" AND type IN (");
            let mut separated = qb.separated(", ");
            for code in &self.type_codes {
                separated.push_bind(i64::from(*code));
            }
            separated.push_unseparated(")");
        }

        if self.only_trashed {
            qb.push(" AND deleted_at IS NOT NULL");
        } else if !self.with_trashed {
            qb.push(" AND deleted_at IS NULL");
        }

        if !self.with_expired {
            qb.push(" AND (expires_at IS NULL OR expires_at > ").push_bind(self.now).push(")");
        }

        if !self.with_disabled {
            qb.push(" AND disabled_at IS NULL");
        }

        if !self.with_used {
            qb.push(" AND (usage_left IS NULL OR usage_left > 0)");
        }

        if !self.excluding.is_empty() {
            qb.push(" AND id NOT IN (");
            let mut separated = qb.separated(", ");
            for id in &self.excluding {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
        }

        if !self.values.is_empty() {
            qb.push(" AND value IN (");
            let mut separated = qb.separated(", ");
            for value in &self.values {
                separated.push_bind(value.as_str());
            }
            separated.push_unseparated(")");
        }

        if let Some(needle) = &self.description_like {
            qb.push(" AND description LIKE ")
                .push_bind(format!("%{}%", escape_like(needle)))
                .push(" ESCAPE '\\'");
        }

        if let Some(instant) = self.expires_before {
            qb.push(" AND expires_at IS NOT NULL AND expires_at <= ").push_bind(instant);
        }

        if let Some(id) = self.after_id {
            qb.push(" AND id > ").push_bind(id);
        }

        if let Some(uuid) = &self.uuid {
            qb.push(" AND uuid = ").push_bind(uuid.as_str());
        }
    }

    fn push_order_and_window<'q>(&'q self, qb: &mut QueryBuilder<'q, Sqlite>) {
        let direction = if self.order.descending { "DESC" } else { "ASC" };
        qb.push(format!(" ORDER BY {} {}", self.order.column.as_sql(), direction));
        if self.order.column != SortColumn::Id {
            qb.push(format!(", id {}", direction));
        }

        match (self.limit, self.offset) {
            (Some(limit), offset) => {
                qb.push(" LIMIT ").push_bind(limit);
                if let Some(offset) = offset {
                    qb.push(" OFFSET ").push_bind(offset);
                }
            }
            // SQLite requires a LIMIT before OFFSET; -1 means unbounded.
            (None, Some(offset)) => {
                qb.push(" LIMIT -1 OFFSET ").push_bind(offset);
            }
            (None, None) => {}
        }
    }
}

/// Make `%` and `_` in user text match literally under `ESCAPE '\'`.
fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Repository for secret persistence.
#[derive(Debug, Clone)]
pub struct SecretRepository {
    pool: DbPool,
}

impl SecretRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Start a transaction shared by an owner save and its pending secrets.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        self.pool.begin().await.map_err(|e| VigilError::database(e, "Failed to begin transaction"))
    }

    #[instrument(skip(self, query), name = "db_find_secrets")]
    pub async fn find(&self, query: &SecretQuery) -> Result<Vec<Secret>> {
        let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM secrets", SECRET_COLUMNS));
        query.push_filters(&mut qb);
        query.push_order_and_window(&mut qb);

        let rows = qb.build_query_as::<SecretRow>().fetch_all(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to query secrets");
            VigilError::database(e, "Failed to query secrets")
        })?;

        rows.into_iter().map(SecretRow::into_secret).collect()
    }

    pub async fn find_one(&self, query: &SecretQuery) -> Result<Option<Secret>> {
        let query = query.clone().limit(1);
        Ok(self.find(&query).await?.into_iter().next())
    }

    #[instrument(skip(self, query), name = "db_find_secret_ids")]
    pub async fn find_ids(&self, query: &SecretQuery) -> Result<Vec<i64>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM secrets");
        query.push_filters(&mut qb);
        query.push_order_and_window(&mut qb);

        qb.build_query_scalar::<i64>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VigilError::database(e, "Failed to query secret ids"))
    }

    #[instrument(skip(self, query), name = "db_count_secrets")]
    pub async fn count(&self, query: &SecretQuery) -> Result<i64> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM secrets");
        query.push_filters(&mut qb);

        qb.build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(|e| VigilError::database(e, "Failed to count secrets"))
    }

    pub async fn exists(&self, query: &SecretQuery) -> Result<bool> {
        Ok(!self.find_ids(&query.clone().limit(1)).await?.is_empty())
    }

    #[instrument(skip(self), fields(uuid = %uuid), name = "db_get_secret_by_uuid")]
    pub async fn find_by_uuid(&self, uuid: &SecretUuid, with_trashed: bool) -> Result<Option<Secret>> {
        let mut query = SecretQuery::active().with_stale().uuid(uuid);
        if with_trashed {
            query = query.with_trashed();
        }
        self.find_one(&query).await
    }

    /// Insert one record on the given connection and return it as stored.
    #[instrument(skip(conn, new), fields(owner_type = %new.owner_type, owner_id = %new.owner_id, type_code = new.type_code), name = "db_insert_secret")]
    pub async fn insert_with(conn: &mut SqliteConnection, new: &NewSecret) -> Result<Secret> {
        let row = sqlx::query_as::<Sqlite, SecretRow>(&format!(
            "INSERT INTO secrets (uuid, owner_type, owner_id, type, value, description, hashed, usage_left, expires_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) RETURNING {}",
            SECRET_COLUMNS
        ))
        .bind(new.uuid.as_str())
        .bind(&new.owner_type)
        .bind(&new.owner_id)
        .bind(i64::from(new.type_code))
        .bind(&new.value)
        .bind(&new.description)
        .bind(new.hashed)
        .bind(new.usage_left.map(i64::from))
        .bind(new.expires_at)
        .bind(new.created_at)
        .bind(new.created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, owner_type = %new.owner_type, owner_id = %new.owner_id, "Failed to insert secret");
            VigilError::database(
                e,
                format!("Failed to insert secret for {}#{}", new.owner_type, new.owner_id),
            )
        })?;

        row.into_secret()
    }

    pub async fn insert(&self, new: &NewSecret) -> Result<Secret> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| VigilError::database(e, "Failed to acquire connection"))?;
        Self::insert_with(&mut conn, new).await
    }

    /// Soft-delete; returns whether a live record was trashed.
    #[instrument(skip(self), name = "db_soft_delete_secret")]
    pub async fn soft_delete(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE secrets SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| VigilError::database(e, format!("Failed to delete secret {}", id)))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), name = "db_restore_secret")]
    pub async fn restore(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE secrets SET deleted_at = NULL, updated_at = ? WHERE id = ? AND deleted_at IS NOT NULL",
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| VigilError::database(e, format!("Failed to restore secret {}", id)))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self), name = "db_disable_secret")]
    pub async fn disable(&self, id: i64, now: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE secrets SET disabled_at = ?, updated_at = ? WHERE id = ? AND disabled_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| VigilError::database(e, format!("Failed to disable secret {}", id)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Hard-delete the given records.
    #[instrument(skip(self, ids), fields(count = ids.len()), name = "db_force_delete_secrets")]
    pub async fn force_delete(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let mut qb = QueryBuilder::<Sqlite>::new("DELETE FROM secrets WHERE id IN (");
        let mut separated = qb.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let result = qb
            .build()
            .execute(&self.pool)
            .await
            .map_err(|e| VigilError::database(e, "Failed to purge secrets"))?;

        Ok(result.rows_affected())
    }

    /// Decrement a bounded usage counter, disabling the record when it reaches zero.
    ///
    /// Returns the updated record, or `None` when the record is unbounded or
    /// already exhausted.
    #[instrument(skip(self), name = "db_decrement_secret_usage")]
    pub async fn decrement_usage(&self, id: i64, now: DateTime<Utc>) -> Result<Option<Secret>> {
        let row = sqlx::query_as::<Sqlite, SecretRow>(&format!(
            "UPDATE secrets SET usage_left = usage_left - 1, \
             disabled_at = CASE WHEN usage_left - 1 <= 0 THEN ? ELSE disabled_at END, \
             updated_at = ? \
             WHERE id = ? AND usage_left IS NOT NULL AND usage_left > 0 RETURNING {}",
            SECRET_COLUMNS
        ))
        .bind(now)
        .bind(now)
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| VigilError::database(e, format!("Failed to decrement usage of secret {}", id)))?;

        row.map(SecretRow::into_secret).transpose()
    }

    /// Owners holding an active secret of `type_code` whose stored value equals `value`.
    #[instrument(skip(self, value), name = "db_find_owners_by_credential")]
    pub async fn find_owners_by_credential(&self, type_code: u8, value: &str) -> Result<Vec<OwnerRef>> {
        let query = SecretQuery::active().of_type(type_code).value_in([value.to_string()]);
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT DISTINCT owner_type, owner_id FROM secrets");
        query.push_filters(&mut qb);

        let rows = qb
            .build_query_as::<(String, String)>()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| VigilError::database(e, "Failed to look up credential owners"))?;

        Ok(rows.into_iter().map(|(owner_type, owner_id)| OwnerRef::new(owner_type, owner_id)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::storage::create_pool;
    use chrono::Duration;

    async fn repository() -> SecretRepository {
        SecretRepository::new(create_pool(&DatabaseConfig::in_memory()).await.unwrap())
    }

    fn new_secret(owner_id: &str, type_code: u8, value: &str) -> NewSecret {
        NewSecret {
            uuid: SecretUuid::new(),
            owner_type: "users".into(),
            owner_id: owner_id.into(),
            type_code,
            value: value.into(),
            description: None,
            hashed: false,
            usage_left: None,
            expires_at: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_order_parsing() {
        let order: SecretOrder = "-created_at".parse().unwrap();
        assert_eq!(order, SecretOrder { column: SortColumn::CreatedAt, descending: true });
        assert_eq!(order.to_string(), "-created_at");
        assert_eq!("expires_at".parse::<SecretOrder>().unwrap().descending, false);
        assert!("value".parse::<SecretOrder>().is_err());
    }

    #[tokio::test]
    async fn test_active_filter_excludes_stale_states() {
        let repo = repository().await;
        let now = Utc::now();

        let active = repo.insert(&new_secret("1", 0, "a")).await.unwrap();

        let mut expired = new_secret("1", 0, "b");
        expired.expires_at = Some(now - Duration::days(1));
        let expired = repo.insert(&expired).await.unwrap();

        let disabled = repo.insert(&new_secret("1", 0, "c")).await.unwrap();
        assert!(repo.disable(disabled.id, now).await.unwrap());

        let trashed = repo.insert(&new_secret("1", 0, "d")).await.unwrap();
        assert!(repo.soft_delete(trashed.id, now).await.unwrap());

        let query = SecretQuery::active().for_owner("users", "1").of_type(0);
        let ids = repo.find_ids(&query).await.unwrap();
        assert_eq!(ids, vec![active.id]);

        let stale = repo.find_ids(&query.clone().with_stale()).await.unwrap();
        assert_eq!(stale, vec![disabled.id, expired.id, active.id]);

        let all = repo.count(&SecretQuery::all().for_owner("users", "1")).await.unwrap();
        assert_eq!(all, 4);

        let trashed_only = SecretQuery::all().only_trashed().for_owner("users", "1");
        assert_eq!(repo.find_ids(&trashed_only).await.unwrap(), vec![trashed.id]);
    }

    #[tokio::test]
    async fn test_decrement_usage_disables_at_zero() {
        let repo = repository().await;
        let mut new = new_secret("1", 0, "otp");
        new.usage_left = Some(2);
        let secret = repo.insert(&new).await.unwrap();

        let once = repo.decrement_usage(secret.id, Utc::now()).await.unwrap().unwrap();
        assert_eq!(once.usage_left, Some(1));
        assert!(once.disabled_at.is_none());

        let twice = repo.decrement_usage(secret.id, Utc::now()).await.unwrap().unwrap();
        assert_eq!(twice.usage_left, Some(0));
        assert!(twice.disabled_at.is_some());

        assert!(repo.decrement_usage(secret.id, Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_and_force_delete() {
        let repo = repository().await;
        let secret = repo.insert(&new_secret("7", 1, "x")).await.unwrap();

        assert!(repo.soft_delete(secret.id, Utc::now()).await.unwrap());
        assert!(!repo.soft_delete(secret.id, Utc::now()).await.unwrap());
        assert!(repo.find_by_uuid(&secret.uuid, false).await.unwrap().is_none());
        assert!(repo.find_by_uuid(&secret.uuid, true).await.unwrap().is_some());

        assert!(repo.restore(secret.id, Utc::now()).await.unwrap());
        assert!(repo.find_by_uuid(&secret.uuid, false).await.unwrap().is_some());

        assert_eq!(repo.force_delete(&[secret.id]).await.unwrap(), 1);
        assert_eq!(repo.force_delete(&[]).await.unwrap(), 0);
        assert!(repo.find_by_uuid(&secret.uuid, true).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offset_without_limit() {
        let repo = repository().await;
        let mut ids = Vec::new();
        for value in ["a", "b", "c"] {
            ids.push(repo.insert(&new_secret("1", 0, value)).await.unwrap().id);
        }

        let skipped = repo
            .find_ids(&SecretQuery::active().for_owner("users", "1").offset(1))
            .await
            .unwrap();
        assert_eq!(skipped, vec![ids[1], ids[0]]);
    }

    #[tokio::test]
    async fn test_find_owners_by_credential() {
        let repo = repository().await;
        repo.insert(&new_secret("1", 5, "alice@example.com")).await.unwrap();
        repo.insert(&new_secret("2", 5, "bob@example.com")).await.unwrap();

        let owners = repo.find_owners_by_credential(5, "alice@example.com").await.unwrap();
        assert_eq!(owners, vec![OwnerRef::new("users", "1")]);
        assert!(repo.find_owners_by_credential(5, "nobody").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_description_filter_matches_wildcards_literally() {
        let repo = repository().await;
        for description in ["100% remote", "1000 remote", "home_office", "homeXoffice"] {
            let mut secret = new_secret("1", 0, description);
            secret.description = Some(description.to_string());
            repo.insert(&secret).await.unwrap();
        }

        let count = |needle: &str| {
            let query = SecretQuery::all().for_owner("users", "1").description_like(needle);
            let repo = repo.clone();
            async move { repo.count(&query).await.unwrap() }
        };
        assert_eq!(count("0%").await, 1);
        assert_eq!(count("home_").await, 1);
        assert_eq!(count("remote").await, 2);
    }
}
