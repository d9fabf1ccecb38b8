#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use sea_orm::DatabaseConnection;
use secrecy::SecretString;
use services_registry::config::{DatabaseConfig, ServicesRegistryConfig};
use services_registry::domain::cache::{DisabledTypeCache, TtlTypeCache, TypeCache};
use services_registry::domain::ports::WorkerDirectory;
use services_registry::domain::service::{Service, ServiceConfig};
use services_registry::domain::signature::RecordSigner;
use services_registry::infra::storage::{
    OrmIdentityStore, OrmServicesRepository, OrmWorkerDirectory, db,
};

pub type TestService<W = OrmWorkerDirectory> = Service<OrmServicesRepository, W, OrmIdentityStore>;

/// 32-byte key, hex encoded, every byte set to `byte`.
pub fn key_hex(byte: u8) -> String {
    format!("{byte:02x}").repeat(32)
}

pub fn signer(primary: u8, previous: &[u8]) -> Arc<RecordSigner> {
    let previous: Vec<SecretString> = previous
        .iter()
        .map(|b| SecretString::from(key_hex(*b)))
        .collect();
    Arc::new(RecordSigner::from_hex(&SecretString::from(key_hex(primary)), &previous).unwrap())
}

pub fn test_config() -> ServicesRegistryConfig {
    let mut config = ServicesRegistryConfig::default();
    config.signing.key = Some(SecretString::from(key_hex(1)));
    config
}

/// Fresh in-memory database with the schema applied.
pub async fn connect() -> DatabaseConnection {
    db::connect(&DatabaseConfig::default()).await.unwrap()
}

pub fn service_on(db: &DatabaseConnection, signer: Arc<RecordSigner>) -> TestService {
    service_with(
        db,
        signer,
        OrmWorkerDirectory::new(),
        Arc::new(DisabledTypeCache),
        ServiceConfig::default(),
    )
}

pub fn cached_service_on(
    db: &DatabaseConnection,
    signer: Arc<RecordSigner>,
    ttl: Duration,
) -> (TestService, Arc<TtlTypeCache>) {
    let cache = Arc::new(TtlTypeCache::new(ttl));
    let service = service_with(
        db,
        signer,
        OrmWorkerDirectory::new(),
        cache.clone(),
        ServiceConfig {
            populate_cache_on_miss: true,
            ..ServiceConfig::default()
        },
    );
    (service, cache)
}

pub fn service_with<W: WorkerDirectory>(
    db: &DatabaseConnection,
    signer: Arc<RecordSigner>,
    workers: W,
    cache: Arc<dyn TypeCache>,
    config: ServiceConfig,
) -> TestService<W> {
    Service::new(
        db.clone(),
        Arc::new(OrmServicesRepository::new()),
        Arc::new(workers),
        Arc::new(OrmIdentityStore::new()),
        signer,
        cache,
        config,
    )
}
