pub mod cache;
pub mod canonical;
pub mod error;
pub mod model;
pub mod ports;
pub mod reaper;
pub mod repo;
pub mod service;
pub mod signature;

#[cfg(test)]
mod service_test;
