#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]

pub mod api;
pub mod errors;
pub mod models;

pub use api::ServicesRegistryApi;
pub use errors::ServicesRegistryError;
pub use models::{
    ClaimOutcome, ConsumerId, NewServiceRecord, ServiceRecord, heartbeat_now, service_types,
};
