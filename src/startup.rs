//! Application wiring
//!
//! Builds the shared services (pool, registry, cache, engine, scheduler and
//! verifier) once from an [`AppConfig`] and hands out routers, guards and the
//! owner resolver chain built on top of them.

use std::sync::Arc;

use axum::Router;
use tracing::info;

use crate::api::{build_router, ApiState};
use crate::auth::{
    ActiveSecretsGate, ChainedOwnerResolver, CredentialOwnerResolver, CredentialProvider,
    ExtensionOwnerResolver, ResolverState, SecretGuard, TrustedHeaderOwnerResolver,
};
use crate::config::AppConfig;
use crate::domain::Secret;
use crate::errors::Result;
use crate::jobs::{ExpiringNotifier, JobScheduler, LoggingNotifier};
use crate::secrets::{
    EngineSettings, ExprMode, MemoryTaggedCache, PolicyRegistry, SecretEngine, SecretVerifier,
    UsageLocks,
};
use crate::storage::{create_pool, DbPool, SecretRepository};

/// Shared services of a running process.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub pool: DbPool,
    pub engine: Arc<SecretEngine>,
    pub scheduler: JobScheduler,
    pub verifier: SecretVerifier,
    pub notifier: Arc<dyn ExpiringNotifier>,
}

impl AppContext {
    /// Connect to the configured database and build every service on top of it.
    pub async fn build(config: AppConfig) -> Result<Self> {
        let pool = create_pool(&config.database).await?;
        Self::with_pool(config, pool)
    }

    /// Build the services over an existing pool.
    pub fn with_pool(config: AppConfig, pool: DbPool) -> Result<Self> {
        let registry = Arc::new(PolicyRegistry::from_config(&config)?);
        let settings = EngineSettings::from_config(&config)?;
        let cache = Arc::new(MemoryTaggedCache::<Vec<Secret>>::new(config.cache.max_entries));
        let scheduler = JobScheduler::default();

        let engine = Arc::new(
            SecretEngine::new(registry, SecretRepository::new(pool.clone()), cache, settings)
                .with_scheduler(scheduler.clone()),
        );
        let verifier = SecretVerifier::new(Arc::clone(&engine), UsageLocks::new());

        info!(
            types = engine.registry().types().len(),
            credential_types = engine.registry().credential_types().count(),
            purge_stale_after = ?engine.settings().purge_stale_after,
            "Secret engine ready"
        );

        Ok(Self {
            config: Arc::new(config),
            pool,
            engine,
            scheduler,
            verifier,
            notifier: Arc::new(LoggingNotifier),
        })
    }

    /// Replace the expiry notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn ExpiringNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Owner resolution chain: an owner set by an outer layer, then the
    /// trusted header when configured, then credential headers.
    pub fn resolver(&self) -> ResolverState {
        let mut chain = ChainedOwnerResolver::new().with(Arc::new(ExtensionOwnerResolver));

        if let Some(header) = &self.config.server.trusted_owner_header {
            chain = chain.with(Arc::new(TrustedHeaderOwnerResolver::new(
                header.as_str(),
                self.config.server.owner_type.as_str(),
            )));
        }

        let provider = CredentialProvider::new(Arc::clone(&self.engine));
        if provider.is_available() {
            let headers: Vec<(String, u8)> = self
                .engine
                .registry()
                .credential_types()
                .map(|policy| (policy.accessor_name.clone(), policy.code))
                .collect();
            chain = chain.with(Arc::new(CredentialOwnerResolver::new(provider, &headers)));
        }

        Arc::new(chain)
    }

    /// The global active-secret gate, unless no gate types are configured.
    pub fn gate(&self) -> Result<Option<ActiveSecretsGate>> {
        if self.config.global_middleware.types.is_empty() {
            return Ok(None);
        }
        ActiveSecretsGate::new(Arc::clone(&self.engine), &self.config.global_middleware).map(Some)
    }

    /// Route guard requiring every type in `terms`.
    pub fn guard_all<S: AsRef<str>>(&self, terms: &[S]) -> Result<SecretGuard> {
        SecretGuard::new(self.verifier.clone(), ExprMode::All, terms, self.config.server.max_body_size)
    }

    /// Route guard requiring any one supplied type in `terms`.
    pub fn guard_any<S: AsRef<str>>(&self, terms: &[S]) -> Result<SecretGuard> {
        SecretGuard::new(self.verifier.clone(), ExprMode::Any, terms, self.config.server.max_body_size)
    }

    pub fn api_state(&self) -> ApiState {
        ApiState { engine: Arc::clone(&self.engine), server: Arc::new(self.config.server.clone()) }
    }

    /// The full HTTP surface with owner resolution and the global gate applied.
    pub fn router(&self) -> Result<Router> {
        Ok(build_router(self.api_state(), self.resolver(), self.gate()?))
    }
}
