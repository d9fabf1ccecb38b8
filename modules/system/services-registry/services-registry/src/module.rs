use std::sync::Arc;

use anyhow::Context;
use services_registry_sdk::ServicesRegistryApi;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ServicesRegistryConfig;
use crate::domain::cache::{DisabledTypeCache, TtlTypeCache, TypeCache};
use crate::domain::reaper::DeadServiceReaper;
use crate::domain::service::{Service, ServiceConfig};
use crate::domain::signature::RecordSigner;
use crate::infra::storage::{OrmIdentityStore, OrmServicesRepository, OrmWorkerDirectory, db};
use crate::local_client::ServicesRegistryLocalClient;

/// The domain service wired to the `SeaORM` storage adapters.
pub type ConcreteService = Service<OrmServicesRepository, OrmWorkerDirectory, OrmIdentityStore>;

/// The reaper over [`ConcreteService`].
pub type ConcreteReaper =
    DeadServiceReaper<OrmServicesRepository, OrmWorkerDirectory, OrmIdentityStore>;

/// Composition root: storage, signer, cache and service built from config.
pub struct ServicesRegistryModule {
    config: ServicesRegistryConfig,
    service: Arc<ConcreteService>,
    client: Arc<dyn ServicesRegistryApi>,
}

impl ServicesRegistryModule {
    /// Connect, migrate if configured and build the service.
    ///
    /// # Errors
    /// Returns an error if the signing key is missing or invalid, the reaper
    /// settings are out of range, or the database cannot be opened or
    /// migrated.
    pub async fn init(config: ServicesRegistryConfig) -> anyhow::Result<Self> {
        info!("Initializing services registry module");

        config
            .reaper
            .validate()
            .context("invalid reaper configuration")?;

        let key = config
            .signing
            .key
            .as_ref()
            .context("signing.key is required")?;
        let signer = RecordSigner::from_hex(key, &config.signing.previous_keys)
            .context("invalid signing configuration")?;
        debug!(?signer, "Record signer ready");

        let db = db::connect(&config.database)
            .await
            .context("failed to open services registry database")?;

        let cache: Arc<dyn TypeCache> = if config.cache.enabled {
            Arc::new(TtlTypeCache::new(config.cache.ttl()))
        } else {
            Arc::new(DisabledTypeCache)
        };

        let service_config = ServiceConfig {
            report_corruption_as_not_found: config.integrity.report_corruption_as_not_found,
            populate_cache_on_miss: config.cache.populate_on_miss,
        };

        let service = Arc::new(Service::new(
            db,
            Arc::new(OrmServicesRepository::new()),
            Arc::new(OrmWorkerDirectory::new()),
            Arc::new(OrmIdentityStore::new()),
            Arc::new(signer),
            cache,
            service_config,
        ));

        let client: Arc<dyn ServicesRegistryApi> =
            Arc::new(ServicesRegistryLocalClient::new(Arc::clone(&service)));

        info!(
            cache_enabled = config.cache.enabled,
            reaper_enabled = config.reaper.enabled,
            "Services registry module initialized"
        );
        Ok(Self {
            config,
            service,
            client,
        })
    }

    #[must_use]
    pub fn config(&self) -> &ServicesRegistryConfig {
        &self.config
    }

    /// The concrete service, needed for claims and transactional variants.
    #[must_use]
    pub fn service(&self) -> Arc<ConcreteService> {
        Arc::clone(&self.service)
    }

    #[must_use]
    pub fn client(&self) -> Arc<dyn ServicesRegistryApi> {
        Arc::clone(&self.client)
    }

    /// A reaper using the configured thresholds, whether or not it is enabled.
    #[must_use]
    pub fn reaper(&self) -> ConcreteReaper {
        DeadServiceReaper::new(
            (*self.service).clone(),
            self.config.reaper.dead_after(),
            self.config.reaper.interval(),
        )
    }

    /// Spawn the reaper loop when `reaper.enabled` is set.
    #[must_use]
    pub fn spawn_reaper(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        if !self.config.reaper.enabled {
            debug!("Dead service reaper disabled");
            return None;
        }
        let reaper = self.reaper();
        Some(tokio::spawn(async move { reaper.run(&cancel).await }))
    }
}
