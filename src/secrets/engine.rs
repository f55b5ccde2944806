//! # Secret Engine
//!
//! Central service tying the type registry, the secret repository and the
//! tagged cache together. It owns every lifecycle rule: what counts as an
//! active secret, how long lookups are cached, uniqueness against history,
//! the two-phase add/flush write path, usage decrements and stale purges.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, instrument, Instrument};
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::domain::{
    NewSecret, OwnerRef, PendingSecrets, Secret, SecretDraft, SecretTypePolicy, SecretUuid,
};
use crate::errors::{FieldErrors, Result, VigilError};
use crate::jobs::{JobScheduler, PurgeStaleSecretsJob};
use crate::observability::MetricsRecorder;
use crate::secret_span;
use crate::secrets::cache::{remember, Loaded, TaggedCache};
use crate::secrets::hashing::{hash_value, verify_value};
use crate::secrets::input::SecretInput;
use crate::secrets::registry::PolicyRegistry;
use crate::secrets::rules::check_required;
use crate::storage::{SecretOrder, SecretQuery, SecretRepository};

/// Engine-wide settings derived from configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    /// Delay before a scheduled stale purge runs; `None` disables purging
    pub purge_stale_after: Option<Duration>,
    /// Cache lifetime for lookups whose records never expire; `None` skips caching them
    pub ttl_without_expiry: Option<Duration>,
}

impl EngineSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            purge_stale_after: config.purge_stale_after()?,
            ttl_without_expiry: config.cache.ttl_without_expiry(),
        })
    }
}

/// Redacted representation of a stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct SecretDisplay {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub masked: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

/// Whether soft-deleted records take part in a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrashedFilter {
    #[default]
    Without,
    With,
    Only,
}

/// Owner-scoped listing filter.
#[derive(Debug, Clone, Default)]
pub struct SecretListFilter {
    pub description: Option<String>,
    pub type_key: Option<String>,
    pub hidden: Option<bool>,
    pub trashed: TrashedFilter,
    pub order: SecretOrder,
    /// `(page, per_page)`, 1-based; `None` returns everything
    pub page: Option<(i64, i64)>,
}

fn rule_message(error: validator::ValidationError) -> String {
    error.message.map(|m| m.into_owned()).unwrap_or_else(|| error.code.into_owned())
}

pub struct SecretEngine {
    registry: Arc<PolicyRegistry>,
    repository: SecretRepository,
    cache: Arc<dyn TaggedCache<Vec<Secret>>>,
    scheduler: Option<JobScheduler>,
    settings: EngineSettings,
    metrics: MetricsRecorder,
}

impl SecretEngine {
    pub fn new(
        registry: Arc<PolicyRegistry>,
        repository: SecretRepository,
        cache: Arc<dyn TaggedCache<Vec<Secret>>>,
        settings: EngineSettings,
    ) -> Self {
        Self { registry, repository, cache, scheduler: None, settings, metrics: MetricsRecorder::new() }
    }

    /// Attach the scheduler used for deferred purges.
    pub fn with_scheduler(mut self, scheduler: JobScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    pub fn repository(&self) -> &SecretRepository {
        &self.repository
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Type key of a stored record.
    pub fn type_key(&self, secret: &Secret) -> Result<&str> {
        Ok(self.registry.by_code(secret.type_code)?.key.as_str())
    }

    fn active_query(policy: &SecretTypePolicy, owner_type: &str, owner_id: &str) -> SecretQuery {
        SecretQuery::active().for_owner(owner_type, owner_id).of_type(policy.code)
    }

    /// Cache lifetime for a loaded set: until the earliest expiry, or the
    /// configured fallback when nothing expires.
    fn ttl_for(&self, secrets: &[Secret], now: DateTime<Utc>) -> Option<Duration> {
        match secrets.iter().filter_map(|s| s.expires_at).min() {
            Some(earliest) => (earliest - now).to_std().ok(),
            None => self.settings.ttl_without_expiry,
        }
    }

    async fn load_active(
        &self,
        policy: &SecretTypePolicy,
        owner_type: &str,
        owner_id: &str,
        strict: bool,
    ) -> Result<Loaded<Vec<Secret>>> {
        let now = Utc::now();
        let mut query = Self::active_query(policy, owner_type, owner_id).at(now);
        query = match (policy.returns_many(), policy.max_active_count) {
            (true, Some(max)) => query.limit(i64::from(max)),
            (true, None) => query,
            (false, _) => query.limit(1),
        };

        let secrets = self.repository.find(&query).await?;
        if secrets.is_empty() {
            if strict {
                return Err(VigilError::no_active_secret(&[policy]));
            }
            return Ok(Loaded::uncached(secrets));
        }

        let ttl = self.ttl_for(&secrets, now);
        Ok(Loaded { value: secrets, ttl })
    }

    /// Active secrets of one type for `owner`, newest first, bounded by `max_active_count`.
    ///
    /// With `strict`, an empty result raises `NoActiveSecret`. With
    /// `rehydrate`, the cached entry is discarded and reloaded.
    #[instrument(skip(self, owner), fields(owner = %owner), name = "engine_get_active_secrets")]
    pub async fn get_active_secrets(
        &self,
        owner: &OwnerRef,
        accessor: &str,
        strict: bool,
        rehydrate: bool,
    ) -> Result<Vec<Secret>> {
        let policy = self.registry.by_accessor(accessor)?;
        let (tags, owner_id) = match (owner.cache_tags(), owner.id()) {
            (Some(tags), Some(owner_id)) => (tags, owner_id),
            _ if strict => return Err(VigilError::no_active_secret(&[policy])),
            _ => return Ok(Vec::new()),
        };

        remember(self.cache.as_ref(), &tags, &policy.key, rehydrate, || {
            self.load_active(policy, &owner.owner_type, owner_id, strict)
        })
        .await
    }

    /// The newest active secret of one type for `owner`.
    pub async fn get_active_secret(
        &self,
        owner: &OwnerRef,
        accessor: &str,
        strict: bool,
        rehydrate: bool,
    ) -> Result<Option<Secret>> {
        Ok(self.get_active_secrets(owner, accessor, strict, rehydrate).await?.into_iter().next())
    }

    /// Stored values (raw or hashed) of the owner's active secrets.
    pub async fn active_values(&self, owner: &OwnerRef, accessor: &str) -> Result<Vec<String>> {
        Ok(self
            .get_active_secrets(owner, accessor, false, false)
            .await?
            .into_iter()
            .map(|secret| secret.value)
            .collect())
    }

    /// Query over one owner's secrets of a type; active only until widened by the caller.
    pub fn scope_of_type(&self, owner: &OwnerRef, type_key: &str) -> Result<SecretQuery> {
        let policy = self.registry.by_key(type_key)?;
        Ok(Self::active_query(policy, &owner.owner_type, owner.require_id()?))
    }

    /// Uncached lookup of the owner's active secrets of a type.
    pub async fn secrets_of_type(&self, owner: &OwnerRef, type_key: &str) -> Result<Vec<Secret>> {
        if !owner.is_persisted() {
            return Ok(Vec::new());
        }
        let query = self.scope_of_type(owner, type_key)?;
        self.repository.find(&query).await
    }

    /// Newest secret of a type in any state except trashed, bypassing the cache.
    pub async fn latest_secret(&self, owner: &OwnerRef, accessor: &str) -> Result<Option<Secret>> {
        let policy = self.registry.by_accessor(accessor)?;
        let Some(owner_id) = owner.id() else {
            return Ok(None);
        };
        let query = Self::active_query(policy, &owner.owner_type, owner_id).with_stale();
        self.repository.find_one(&query).await
    }

    /// Value of [`Self::latest_secret`], as an owner attribute read would see it.
    pub async fn latest_secret_value(&self, owner: &OwnerRef, accessor: &str) -> Result<Option<String>> {
        Ok(self.latest_secret(owner, accessor).await?.map(|secret| secret.value))
    }

    /// Evict the cached lookup for `owner` and `type_key`.
    pub async fn forget_secret(&self, owner: &OwnerRef, type_key: &str) -> bool {
        match owner.cache_tags() {
            Some(tags) => self.cache.forget(&tags, type_key).await,
            None => false,
        }
    }

    /// Evict every cached lookup for `owner`.
    pub async fn forget_all(&self, owner: &OwnerRef) -> usize {
        match owner.cache_tags() {
            Some(tags) => self.cache.flush(&tags).await,
            None => 0,
        }
    }

    /// Reload the cached lookup after a record of `type_code` changed.
    async fn rehydrate(&self, owner: &OwnerRef, type_code: u8) -> Result<()> {
        let policy = self.registry.by_code(type_code)?;
        self.get_active_secrets(owner, &policy.accessor_name, false, true).await?;
        Ok(())
    }

    /// Apply the type's rules to every value in `input`.
    ///
    /// No-op when validation is disabled or the type has no rules. Batch
    /// entries report under `accessor.N`.
    pub fn validate_secret(&self, accessor: &str, input: &SecretInput) -> Result<()> {
        let policy = self.registry.by_accessor(accessor)?;
        if !self.registry.validation_enabled() || policy.rules.is_empty() {
            return Ok(());
        }

        let batch = matches!(input, SecretInput::Batch(_));
        let label = policy.display_name.as_str();
        let mut fields = FieldErrors::new();

        for (index, entry) in input.entries()?.iter().enumerate() {
            let field = if batch { format!("{}.{}", accessor, index) } else { accessor.to_string() };

            let messages: Vec<String> = match check_required(label, &entry.value) {
                Err(required) => vec![rule_message(required)],
                Ok(()) => policy
                    .rules
                    .iter()
                    .filter_map(|rule| rule.validate(label, &entry.value).err())
                    .map(rule_message)
                    .collect(),
            };

            if !messages.is_empty() {
                fields.insert(field, messages);
            }
        }

        if fields.is_empty() {
            Ok(())
        } else {
            Err(VigilError::ValidationFailed { fields })
        }
    }

    /// Compare a candidate against one stored record.
    pub fn check_value(&self, secret: &Secret, candidate: &str) -> bool {
        if secret.hashed {
            verify_value(&secret.value, candidate)
        } else {
            secret.value == candidate
        }
    }

    /// First record in `secrets` matched by any value in `input`.
    pub fn check_secret<'a>(&self, input: &SecretInput, secrets: &'a [Secret]) -> Result<Option<&'a Secret>> {
        let candidates = input.values()?;
        Ok(secrets
            .iter()
            .find(|secret| candidates.iter().any(|candidate| self.check_value(secret, candidate))))
    }

    /// Whether `value` may be stored for `owner` without repeating recent history.
    ///
    /// Globally unique types compare against every owner's records. Otherwise
    /// the newest `max(max_history_count, max_active_count)` records count,
    /// active ones first, backfilled from stale ones.
    #[instrument(skip(self, value, owner), name = "engine_is_secret_unique")]
    pub async fn is_secret_unique(&self, accessor: &str, value: &str, owner: Option<&OwnerRef>) -> Result<bool> {
        let policy = self.registry.by_accessor(accessor)?;

        if policy.unique_for_all && !policy.hashed {
            let query = SecretQuery::all().of_type(policy.code).value_in([value.to_string()]);
            return Ok(!self.repository.exists(&query).await?);
        }

        let Some((owner_type, owner_id)) = owner.and_then(|o| Some((o.owner_type.as_str(), o.id()?))) else {
            return Ok(true);
        };

        let history = match policy.retention_window() {
            Some(0) => return Ok(true),
            Some(window) => {
                let window = i64::from(window);
                let active_query = Self::active_query(policy, owner_type, owner_id).limit(window);
                let mut secrets = self.repository.find(&active_query).await?;

                let remaining = window - secrets.len() as i64;
                if remaining > 0 {
                    let ids: Vec<i64> = secrets.iter().map(|s| s.id).collect();
                    let stale_query = SecretQuery::all()
                        .for_owner(owner_type, owner_id)
                        .of_type(policy.code)
                        .excluding(&ids)
                        .limit(remaining);
                    secrets.extend(self.repository.find(&stale_query).await?);
                }
                secrets
            }
            None => {
                let query = SecretQuery::all().for_owner(owner_type, owner_id).of_type(policy.code);
                self.repository.find(&query).await?
            }
        };

        Ok(!history.iter().any(|secret| self.check_value(secret, value)))
    }

    /// Hash (when required) and attach drafts to `pending`. Returns the stored forms.
    pub fn add_new_secret(
        &self,
        pending: &mut PendingSecrets,
        accessor: &str,
        input: &SecretInput,
    ) -> Result<Vec<String>> {
        let policy = self.registry.by_accessor(accessor)?;
        let mut stored = Vec::new();

        for entry in input.entries()? {
            let value = if policy.hashed { hash_value(&entry.value)? } else { entry.value.clone() };
            let draft = SecretDraft {
                uuid: SecretUuid::new(),
                type_code: policy.code,
                value: value.clone(),
                description: entry.description,
                hashed: policy.hashed,
                usage_left: policy.max_usage_count,
            };
            pending.upsert(&entry.value, draft);
            stored.push(value);
        }

        Ok(stored)
    }

    /// Validate, check uniqueness, then stage the value(s) on `pending`.
    pub async fn set_secret(
        &self,
        pending: &mut PendingSecrets,
        accessor: &str,
        input: &SecretInput,
    ) -> Result<Vec<String>> {
        let policy = self.registry.by_accessor(accessor)?;
        let span = secret_span!("set_secret", pending.owner(), policy.key);

        async {
            self.validate_secret(accessor, input)?;

            for value in input.values()? {
                if !self.is_secret_unique(accessor, &value, Some(pending.owner())).await? {
                    return Err(VigilError::secret_already_exists(policy));
                }
            }

            self.add_new_secret(pending, accessor, input)
        }
        .instrument(span)
        .await
    }

    /// Persist `pending` in its own transaction and refresh the owner's cache.
    #[instrument(skip(self, pending), fields(owner = %pending.owner(), drafts = pending.len()), name = "engine_flush")]
    pub async fn flush(&self, pending: &mut PendingSecrets) -> Result<Vec<Secret>> {
        let mut tx = self.repository.begin().await?;
        let secrets = self.flush_in(&mut tx, pending).await?;
        tx.commit()
            .await
            .map_err(|e| VigilError::database(e, "Failed to commit pending secrets"))?;
        pending.take();

        self.invalidate_flushed(pending.owner(), &secrets).await;
        Ok(secrets)
    }

    /// Persist `pending` on a caller-owned connection, typically the owner's
    /// save transaction. Drafts stay queued until the caller commits; then
    /// clear them with [`PendingSecrets::take`] and call [`Self::invalidate_flushed`].
    pub async fn flush_in(&self, conn: &mut SqliteConnection, pending: &PendingSecrets) -> Result<Vec<Secret>> {
        let owner_type = pending.owner().owner_type.clone();
        let owner_id = pending.owner().require_id()?.to_string();
        let now = Utc::now();

        let mut secrets = Vec::with_capacity(pending.len());
        for draft in pending.drafts() {
            let policy = self.registry.by_code(draft.type_code)?;
            let new = NewSecret {
                uuid: draft.uuid.clone(),
                owner_type: owner_type.clone(),
                owner_id: owner_id.clone(),
                type_code: draft.type_code,
                value: draft.value.clone(),
                description: draft.description.clone(),
                hashed: draft.hashed,
                usage_left: draft.usage_left,
                expires_at: policy.expires_at_from(now),
                created_at: now,
            };
            secrets.push(SecretRepository::insert_with(conn, &new).await?);
        }

        let mut per_type: BTreeMap<u8, usize> = BTreeMap::new();
        for secret in &secrets {
            *per_type.entry(secret.type_code).or_default() += 1;
        }
        for (code, count) in per_type {
            self.metrics.record_secrets_created(&self.registry.by_code(code)?.key, count);
        }

        Ok(secrets)
    }

    /// Drop cached lookups for every type touched by a flush.
    pub async fn invalidate_flushed(&self, owner: &OwnerRef, secrets: &[Secret]) {
        let codes: BTreeSet<u8> = secrets.iter().map(|s| s.type_code).collect();
        for code in codes {
            if let Ok(policy) = self.registry.by_code(code) {
                self.forget_secret(owner, &policy.key).await;
            }
        }
    }

    /// Consume one use of a bounded secret; exhausting it disables the record.
    #[instrument(skip(self, secret), fields(secret_id = secret.id), name = "engine_decrement_usage")]
    pub async fn decrement_usage(&self, secret: &Secret) -> Result<Option<Secret>> {
        if secret.usage_left.is_none() {
            return Ok(None);
        }

        let updated = self.repository.decrement_usage(secret.id, Utc::now()).await?;
        if let Some(updated) = &updated {
            let policy = self.registry.by_code(updated.type_code)?;
            let exhausted = updated.usage_left == Some(0);
            self.metrics.record_usage_decrement(&policy.key, exhausted);
            if exhausted {
                info!(secret_id = updated.id, secret_type = %policy.key, "Secret usage exhausted, disabled");
            }
        }
        self.rehydrate(&secret.owner(), secret.type_code).await?;

        Ok(updated)
    }

    /// Disable a secret explicitly.
    pub async fn disable_secret(&self, secret: &Secret) -> Result<bool> {
        let disabled = self.repository.disable(secret.id, Utc::now()).await?;
        self.rehydrate(&secret.owner(), secret.type_code).await?;
        Ok(disabled)
    }

    async fn find_owned(&self, owner: &OwnerRef, uuid: &SecretUuid, with_trashed: bool) -> Result<Secret> {
        let secret = self
            .repository
            .find_by_uuid(uuid, with_trashed)
            .await?
            .ok_or_else(|| VigilError::not_found("secret", uuid.as_str()))?;

        if !owner.is_same(&secret.owner_type, &secret.owner_id) {
            return Err(VigilError::forbidden("This action is unauthorized."));
        }
        Ok(secret)
    }

    pub async fn show_secret(&self, owner: &OwnerRef, uuid: &SecretUuid) -> Result<Secret> {
        self.find_owned(owner, uuid, false).await
    }

    #[instrument(skip(self, owner), fields(owner = %owner, uuid = %uuid), name = "engine_soft_delete_secret")]
    pub async fn soft_delete_secret(&self, owner: &OwnerRef, uuid: &SecretUuid) -> Result<Secret> {
        let secret = self.find_owned(owner, uuid, false).await?;
        self.repository.soft_delete(secret.id, Utc::now()).await?;
        self.rehydrate(owner, secret.type_code).await?;

        self.find_owned(owner, uuid, true).await
    }

    #[instrument(skip(self, owner), fields(owner = %owner, uuid = %uuid), name = "engine_restore_secret")]
    pub async fn restore_secret(&self, owner: &OwnerRef, uuid: &SecretUuid) -> Result<Secret> {
        let secret = self.find_owned(owner, uuid, true).await?;
        if secret.deleted_at.is_some() {
            self.repository.restore(secret.id, Utc::now()).await?;
            self.rehydrate(owner, secret.type_code).await?;
        }

        self.find_owned(owner, uuid, false).await
    }

    /// One page of the owner's secrets plus the unpaginated total.
    pub async fn list_secrets(&self, owner: &OwnerRef, filter: &SecretListFilter) -> Result<(Vec<Secret>, i64)> {
        let owner_id = owner.require_id()?;
        let mut query = SecretQuery::active().with_stale().for_owner(&owner.owner_type, owner_id);

        let mut codes: Option<Vec<u8>> = None;
        if let Some(type_key) = &filter.type_key {
            let policy = self
                .registry
                .by_key(type_key)
                .map_err(|_| VigilError::validation_field("type", "The selected type is invalid."))?;
            codes = Some(vec![policy.code]);
        }
        if let Some(hidden) = filter.hidden {
            let matching: Vec<u8> = self
                .registry
                .types()
                .iter()
                .filter(|p| p.hidden == hidden)
                .map(|p| p.code)
                .filter(|code| codes.as_ref().map_or(true, |c| c.contains(code)))
                .collect();
            codes = Some(matching);
        }
        if let Some(codes) = codes {
            if codes.is_empty() {
                return Ok((Vec::new(), 0));
            }
            query = query.of_types(codes);
        }

        query = match filter.trashed {
            TrashedFilter::Without => query,
            TrashedFilter::With => query.with_trashed(),
            TrashedFilter::Only => query.only_trashed(),
        };
        if let Some(description) = filter.description.as_deref().filter(|d| !d.is_empty()) {
            query = query.description_like(description);
        }

        let total = self.repository.count(&query).await?;

        query = query.order(filter.order);
        if let Some((page, per_page)) = filter.page {
            query = query.limit(per_page).offset((page.max(1) - 1).saturating_mul(per_page));
        }

        Ok((self.repository.find(&query).await?, total))
    }

    /// Masked and, for visible types, actual forms of a stored value.
    pub fn display(&self, secret: &Secret) -> Result<SecretDisplay> {
        let policy = self.registry.by_code(secret.type_code)?;
        Ok(SecretDisplay {
            masked: policy.mask(&secret.value),
            actual: (!policy.hidden).then(|| secret.value.clone()),
        })
    }

    /// Active values of every `append` type, keyed by accessor name. Bounded
    /// types yield a list; single-slot types a string or null.
    pub async fn appended_attributes(&self, owner: &OwnerRef) -> Result<BTreeMap<String, serde_json::Value>> {
        let mut attributes = BTreeMap::new();
        for policy in self.registry.types().iter().filter(|p| p.append) {
            let values = self.active_values(owner, &policy.accessor_name).await?;
            let value = if policy.returns_many() {
                serde_json::Value::from(values)
            } else {
                values.into_iter().next().map_or(serde_json::Value::Null, serde_json::Value::from)
            };
            attributes.insert(policy.accessor_name.clone(), value);
        }
        Ok(attributes)
    }

    /// Schedule a stale purge for `owner` after the configured grace period.
    ///
    /// Returns `false` when purging is disabled, no scheduler is attached, or
    /// a purge for this owner is already pending.
    pub fn purge_user_stale_secrets(self: &Arc<Self>, owner: &OwnerRef) -> bool {
        let (Some(delay), Some(scheduler)) = (self.settings.purge_stale_after, &self.scheduler) else {
            return false;
        };
        if !owner.is_persisted() {
            return false;
        }

        let job = PurgeStaleSecretsJob::new(Arc::clone(self), owner.clone());
        scheduler.schedule(Arc::new(job), delay)
    }

    /// Hard-delete records beyond each type's retention window.
    ///
    /// Per type, the newest `max(max_history_count, max_active_count)` active
    /// records are kept, the window is topped up with the newest stale ones,
    /// and everything older (trashed included) is removed.
    #[instrument(skip(self, owner), fields(owner = %owner), name = "engine_purge_stale_secrets")]
    pub async fn purge_stale_secrets(&self, owner: &OwnerRef) -> Result<u64> {
        let owner_id = owner.require_id()?;
        let mut purged = 0;

        for policy in self.registry.types() {
            // Unbounded and zero windows both leave the type alone.
            let Some(window) = policy.retention_window().filter(|window| *window > 0) else {
                continue;
            };
            let window = i64::from(window);

            let kept = self
                .repository
                .find_ids(&Self::active_query(policy, &owner.owner_type, owner_id).limit(window))
                .await?;
            let backfill = window - kept.len() as i64;

            let mut stale = SecretQuery::all()
                .for_owner(&owner.owner_type, owner_id)
                .of_type(policy.code)
                .excluding(&kept);
            if backfill > 0 {
                stale = stale.offset(backfill);
            }

            let doomed = self.repository.find_ids(&stale).await?;
            if doomed.is_empty() {
                continue;
            }

            let deleted = self.repository.force_delete(&doomed).await?;
            self.metrics.record_secrets_purged(&policy.key, deleted);
            self.forget_secret(owner, &policy.key).await;
            info!(owner = %owner, secret_type = %policy.key, deleted, "Purged stale secrets");
            purged += deleted;
        }

        Ok(purged)
    }

    /// Active secrets of a type expiring at or before `now + broadcast_expiring_before`,
    /// scanned by ascending id from `after_id`.
    pub async fn expiring_secrets(
        &self,
        type_key: &str,
        now: DateTime<Utc>,
        after_id: Option<i64>,
        chunk: i64,
    ) -> Result<Vec<Secret>> {
        let policy = self.registry.by_key(type_key)?;
        let Some(horizon) = policy.broadcast_horizon(now) else {
            return Ok(Vec::new());
        };

        let mut query = SecretQuery::active()
            .at(now)
            .of_type(policy.code)
            .expires_before(horizon)
            .order(SecretOrder::oldest())
            .limit(chunk);
        if let Some(after_id) = after_id {
            query = query.after_id(after_id);
        }
        self.repository.find(&query).await
    }
}
