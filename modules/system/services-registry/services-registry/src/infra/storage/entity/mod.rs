pub mod auth_consumer;
pub mod service;
pub mod worker;

pub use service::{ActiveModel, Column, Entity, Model};
