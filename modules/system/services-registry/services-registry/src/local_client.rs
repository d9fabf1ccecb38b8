//! In-process implementation of `ServicesRegistryApi`.
//!
//! Delegates to the domain service and converts errors to SDK error types.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use services_registry_sdk::{
    ConsumerId, NewServiceRecord, ServiceRecord, ServicesRegistryApi, ServicesRegistryError,
};

use crate::module::ConcreteService;

pub struct ServicesRegistryLocalClient {
    service: Arc<ConcreteService>,
}

impl ServicesRegistryLocalClient {
    #[must_use]
    pub fn new(service: Arc<ConcreteService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ServicesRegistryApi for ServicesRegistryLocalClient {
    async fn list_services(&self) -> Result<Vec<ServiceRecord>, ServicesRegistryError> {
        self.service.list_all().await.map_err(Into::into)
    }

    async fn list_services_by_type(
        &self,
        service_type: &str,
    ) -> Result<Vec<ServiceRecord>, ServicesRegistryError> {
        self.service
            .list_by_type(service_type)
            .await
            .map_err(Into::into)
    }

    async fn get_service(&self, id: i64) -> Result<ServiceRecord, ServicesRegistryError> {
        self.service.get_by_id(id).await.map_err(Into::into)
    }

    async fn get_service_by_name(
        &self,
        name: &str,
    ) -> Result<ServiceRecord, ServicesRegistryError> {
        self.service.get_by_name(name).await.map_err(Into::into)
    }

    async fn get_service_by_name_and_type(
        &self,
        name: &str,
        service_type: &str,
    ) -> Result<ServiceRecord, ServicesRegistryError> {
        self.service
            .get_by_name_and_type(name, service_type)
            .await
            .map_err(Into::into)
    }

    async fn get_service_by_consumer(
        &self,
        consumer_id: &ConsumerId,
    ) -> Result<ServiceRecord, ServicesRegistryError> {
        self.service
            .get_by_consumer_id(consumer_id)
            .await
            .map_err(Into::into)
    }

    async fn find_dead_services(
        &self,
        threshold: Duration,
    ) -> Result<Vec<ServiceRecord>, ServicesRegistryError> {
        self.service.find_dead(threshold).await.map_err(Into::into)
    }

    async fn insert_service(
        &self,
        service: NewServiceRecord,
    ) -> Result<ServiceRecord, ServicesRegistryError> {
        self.service.insert(service).await.map_err(Into::into)
    }

    async fn update_service(
        &self,
        service: ServiceRecord,
    ) -> Result<ServiceRecord, ServicesRegistryError> {
        self.service.update(service).await.map_err(Into::into)
    }

    async fn heartbeat(&self, id: i64) -> Result<ServiceRecord, ServicesRegistryError> {
        self.service.heartbeat(id).await.map_err(Into::into)
    }

    async fn delete_service(&self, service: &ServiceRecord) -> Result<(), ServicesRegistryError> {
        self.service.delete(service).await.map_err(Into::into)
    }
}
