//! `ServicesRegistryApi` trait definition.
//!
//! Every read returns only records whose signature verified. Claims are not
//! part of this trait: they need the caller's open transaction and are
//! exposed by the registry's domain service directly.

use std::time::Duration;

use async_trait::async_trait;

use crate::errors::ServicesRegistryError;
use crate::models::{ConsumerId, NewServiceRecord, ServiceRecord};

/// Public API trait for the services registry.
///
/// # Errors
///
/// Single-record reads return `NotFound` for a missing (and, by default,
/// for a corrupted) record. Writes return `ConstraintViolation` when a name
/// is already taken. `delete_service` returns `DependencyFailure` when a
/// cascade step fails. Anything else surfaces as `Internal`.
#[async_trait]
pub trait ServicesRegistryApi: Send + Sync {
    /// All trusted services.
    async fn list_services(&self) -> Result<Vec<ServiceRecord>, ServicesRegistryError>;

    /// Trusted services of the given type. May be served from a cache and
    /// therefore be stale.
    async fn list_services_by_type(
        &self,
        service_type: &str,
    ) -> Result<Vec<ServiceRecord>, ServicesRegistryError>;

    async fn get_service(&self, id: i64) -> Result<ServiceRecord, ServicesRegistryError>;

    async fn get_service_by_name(&self, name: &str)
    -> Result<ServiceRecord, ServicesRegistryError>;

    async fn get_service_by_name_and_type(
        &self,
        name: &str,
        service_type: &str,
    ) -> Result<ServiceRecord, ServicesRegistryError>;

    async fn get_service_by_consumer(
        &self,
        consumer_id: &ConsumerId,
    ) -> Result<ServiceRecord, ServicesRegistryError>;

    /// Services whose last heartbeat is older than `now - threshold`.
    async fn find_dead_services(
        &self,
        threshold: Duration,
    ) -> Result<Vec<ServiceRecord>, ServicesRegistryError>;

    /// Register a new service; the returned record carries the assigned id
    /// and signature.
    async fn insert_service(
        &self,
        service: NewServiceRecord,
    ) -> Result<ServiceRecord, ServicesRegistryError>;

    /// Replace the whole stored state of a service and re-sign it.
    async fn update_service(
        &self,
        service: ServiceRecord,
    ) -> Result<ServiceRecord, ServicesRegistryError>;

    /// Refresh the heartbeat of a service to the current time.
    async fn heartbeat(&self, id: i64) -> Result<ServiceRecord, ServicesRegistryError>;

    /// Delete a service together with its workers and consumer identity.
    async fn delete_service(&self, service: &ServiceRecord) -> Result<(), ServicesRegistryError>;
}
