//! Services Registry
//!
//! Signed, heartbeat-based registry of running services with non-blocking
//! claims. The public API is defined in `services-registry-sdk` and
//! re-exported here.

pub use services_registry_sdk::{
    ClaimOutcome, ConsumerId, NewServiceRecord, ServiceRecord, ServicesRegistryApi,
    ServicesRegistryError,
};

pub mod module;
pub use module::{ConcreteReaper, ConcreteService, ServicesRegistryModule};

pub mod local_client;

pub mod config;
pub use config::ServicesRegistryConfig;

#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod infra;
